use std::path::PathBuf;
use std::time::Duration;

/// Failures a gate run can hit, in the order the phases can produce them.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error("Required tool '{tool}' is not available: {reason}")]
    DependencyMissing { tool: String, reason: String },
    #[error("Missing environment files: {}", display_paths(.0))]
    ConfigMissing(Vec<PathBuf>),
    #[error("Failed to start test environment: {0}")]
    EnvironmentStartFailure(String),
    #[error("Service '{service}' was not ready within {waited:?}")]
    ReadinessTimeout { service: String, waited: Duration },
    #[error("Tests for '{module}' exceeded the {timeout:?} timeout")]
    TestExecutionTimeout { module: String, timeout: Duration },
    #[error("Tests for '{module}' failed (exit code: {})", display_code(.exit_code))]
    TestFailure {
        module: String,
        exit_code: Option<i32>,
    },
    #[error("Failed to clean up test environment: {0}")]
    CleanupFailure(String),
}

impl GateError {
    /// Whether the environment may hold resources when this error surfaces.
    #[must_use]
    pub fn requires_cleanup(&self) -> bool {
        matches!(
            self,
            Self::EnvironmentStartFailure(_) | Self::ReadinessTimeout { .. }
        )
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn display_code(code: &Option<i32>) -> String {
    code.map_or_else(|| "terminated by signal".to_string(), |c| c.to_string())
}
