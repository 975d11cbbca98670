use std::time::Duration;

/// Per-invocation switches, parsed once from the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunConfig {
    pub verbose: bool,
    pub no_cleanup: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestResult {
    pub module_name: String,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    /// Why the module failed: non-zero exit, timeout or spawn error.
    pub failure: Option<String>,
    pub duration: Duration,
}

impl TestResult {
    #[must_use]
    pub fn passed(&self) -> bool {
        self.success
    }
}

/// Everything the reporter needs once the environment is gone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub results: Vec<TestResult>,
    /// `true` when teardown succeeded or was suppressed with `--no-cleanup`.
    pub cleanup_succeeded: bool,
}
