use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::errors::GateError;
use crate::services::process::{ProcessCommand, ProcessRunner};

const VERSION_PROBE_TIMEOUT_SECS: u64 = 30;

/// Confirms every external tool the run needs can be executed.
pub struct DependencyChecker {
    runner: Arc<dyn ProcessRunner>,
    tools: Vec<String>,
}

impl DependencyChecker {
    pub fn new(runner: Arc<dyn ProcessRunner>, tools: Vec<String>) -> Self {
        Self { runner, tools }
    }

    /// Run `<tool> --version` for each tool, stopping at the first failure.
    pub async fn check(&self) -> Result<(), GateError> {
        info!("Checking dependencies...");

        for tool in &self.tools {
            let command = ProcessCommand::new(
                tool.clone(),
                Duration::from_secs(VERSION_PROBE_TIMEOUT_SECS),
            )
            .arg("--version");

            let reason = match self.runner.run(&command).await {
                Ok(output) if output.success() => {
                    info!("[OK] {}: {}", tool, output.stdout.trim());
                    continue;
                }
                Ok(output) => format!(
                    "`{}` exited with {:?}: {}",
                    command.display(),
                    output.exit_code,
                    output.stderr.trim()
                ),
                Err(e) => e.to_string(),
            };

            error!("[ERROR] {tool} is not installed or not running: {reason}");
            return Err(GateError::DependencyMissing {
                tool: tool.clone(),
                reason,
            });
        }

        Ok(())
    }
}
