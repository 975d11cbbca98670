use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

use crate::errors::GateError;
use crate::models::{ModuleSpec, RunConfig, TestResult};
use crate::services::process::{ProcessCommand, ProcessError, ProcessOutput, ProcessRunner};

/// How much output a failed module shows right away in non-verbose mode.
pub const FAILURE_TAIL_LINES: usize = 20;

/// Runs each module's test command against the live stack, one at a time.
pub struct TestExecutor {
    runner: Arc<dyn ProcessRunner>,
    run_config: RunConfig,
}

impl TestExecutor {
    pub fn new(runner: Arc<dyn ProcessRunner>, run_config: RunConfig) -> Self {
        Self { runner, run_config }
    }

    /// One result per module, in order. A failing, hanging or unlaunchable
    /// module never keeps the rest from running.
    pub async fn run_all(&self, modules: &[ModuleSpec]) -> Vec<TestResult> {
        info!("Running integration tests...");

        let mut results = Vec::with_capacity(modules.len());
        for module in modules {
            info!("Running tests for {}...", module.name);
            results.push(self.run_module(module).await);
        }
        results
    }

    pub async fn run_module(&self, module: &ModuleSpec) -> TestResult {
        let started = Instant::now();

        let Some(command) = ProcessCommand::from_argv(&module.test_command, module.timeout) else {
            error!("[ERROR] {} has no test command", module.name);
            return failed(module, started, ProcessOutput::default(), "empty test command".to_string());
        };
        let command = command
            .current_dir(module.working_dir.clone())
            .envs(&module.env_overrides);

        match self.runner.run(&command).await {
            Ok(output) if output.success() => {
                info!("[SUCCESS] Tests for {} passed", module.name);
                TestResult {
                    module_name: module.name.clone(),
                    success: true,
                    stdout: output.stdout,
                    stderr: output.stderr,
                    failure: None,
                    duration: started.elapsed(),
                }
            }
            Ok(output) => {
                let err = GateError::TestFailure {
                    module: module.name.clone(),
                    exit_code: output.exit_code,
                };
                error!("[ERROR] {err}");
                self.surface_output(&output);
                failed(module, started, output, err.to_string())
            }
            Err(ProcessError::Timeout { output, .. }) => {
                let err = GateError::TestExecutionTimeout {
                    module: module.name.clone(),
                    timeout: module.timeout,
                };
                error!("[ERROR] {err}");
                self.surface_output(&output);
                failed(module, started, output, err.to_string())
            }
            Err(e) => {
                error!("[ERROR] Failed to launch tests for {}: {e}", module.name);
                failed(module, started, ProcessOutput::default(), e.to_string())
            }
        }
    }

    /// Verbose runs get the whole output at debug level; otherwise only the
    /// tail, so the cause is visible before the final report. Returns the
    /// excerpt logged at error level.
    fn surface_output(&self, output: &ProcessOutput) -> Vec<String> {
        let combined = output.combined();
        if self.run_config.verbose {
            debug!("Test output:\n{combined}");
            return Vec::new();
        }

        let excerpt: Vec<String> = tail_lines(&combined, FAILURE_TAIL_LINES)
            .into_iter()
            .map(str::to_owned)
            .collect();
        error!("Last lines of output:");
        for line in &excerpt {
            error!("  {line}");
        }
        excerpt
    }
}

fn failed(module: &ModuleSpec, started: Instant, output: ProcessOutput, failure: String) -> TestResult {
    TestResult {
        module_name: module.name.clone(),
        success: false,
        stdout: output.stdout,
        stderr: output.stderr,
        failure: Some(failure),
        duration: started.elapsed(),
    }
}

/// The non-blank lines among the last `n` lines of `text`.
pub fn tail_lines(text: &str, n: usize) -> Vec<&str> {
    let lines: Vec<&str> = text.split('\n').collect();
    let start = lines.len().saturating_sub(n);
    lines[start..]
        .iter()
        .copied()
        .filter(|line| !line.trim().is_empty())
        .collect()
}
