use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::config::EnvironmentConfig;
use crate::errors::GateError;
use crate::models::RunConfig;
use crate::services::process::{OutputMode, ProcessCommand, ProcessRunner};

/// Something that can explain why the environment misbehaves.
#[async_trait]
pub trait Diagnostics: Send + Sync {
    /// Surface the environment's own logs. Never fails the caller.
    async fn dump_logs(&self);
}

/// Drives the disposable stack through the environment tool's
/// `up`/`down`/`logs` subcommands.
pub struct EnvironmentController {
    runner: Arc<dyn ProcessRunner>,
    program: String,
    prefix_args: Vec<String>,
    compose_file: String,
    project_root: PathBuf,
    timeout: Duration,
    run_config: RunConfig,
}

impl EnvironmentController {
    pub fn new(
        runner: Arc<dyn ProcessRunner>,
        config: &EnvironmentConfig,
        run_config: RunConfig,
    ) -> Self {
        let (program, prefix_args) = match config.compose_command.split_first() {
            Some((program, rest)) => (program.clone(), rest.to_vec()),
            None => ("docker-compose".to_string(), Vec::new()),
        };

        Self {
            runner,
            program,
            prefix_args,
            compose_file: config.compose_file.clone(),
            project_root: config.project_root.clone(),
            timeout: Duration::from_secs(config.command_timeout_secs),
            run_config,
        }
    }

    fn compose(&self, args: &[&str], output: OutputMode) -> ProcessCommand {
        ProcessCommand::new(self.program.clone(), self.timeout)
            .args(self.prefix_args.iter().cloned())
            .args(["-f", self.compose_file.as_str()])
            .args(args.iter().copied())
            .current_dir(self.project_root.clone())
            .output(output)
    }

    /// Verbose runs stream the tool's output straight to the terminal.
    fn output_mode(&self) -> OutputMode {
        if self.run_config.verbose {
            OutputMode::Stream
        } else {
            OutputMode::Capture
        }
    }

    async fn invoke(&self, args: &[&str]) -> Result<(), String> {
        let command = self.compose(args, self.output_mode());
        let output = self
            .runner
            .run(&command)
            .await
            .map_err(|e| e.to_string())?;

        if output.success() {
            return Ok(());
        }

        let mut cause = format!(
            "`{}` exited with {}",
            command.display(),
            output
                .exit_code
                .map_or_else(|| "a signal".to_string(), |c| c.to_string())
        );
        let stderr = output.stderr.trim();
        if !stderr.is_empty() {
            cause.push_str(": ");
            cause.push_str(stderr);
        }
        Err(cause)
    }

    /// Tear down whatever a previous run left behind, then bring up a fresh stack.
    ///
    /// If the pre-teardown fails the stack is in an unknown state, so `up` is
    /// never attempted.
    pub async fn start(&self) -> Result<(), GateError> {
        info!("Starting test environment...");

        info!("Removing stale containers...");
        if let Err(cause) = self.invoke(&["down", "-v", "--remove-orphans"]).await {
            let err = GateError::EnvironmentStartFailure(cause);
            error!("[ERROR] {err}");
            return Err(err);
        }

        info!("Starting services...");
        if let Err(cause) = self.invoke(&["up", "-d"]).await {
            let err = GateError::EnvironmentStartFailure(cause);
            error!("[ERROR] {err}");
            return Err(err);
        }

        Ok(())
    }

    /// Tear the stack down. Returns `false` instead of erroring, since this
    /// runs on paths that are already reporting another failure.
    pub async fn stop(&self) -> bool {
        info!("Cleaning up test environment...");

        match self.invoke(&["down", "-v"]).await {
            Ok(()) => {
                info!("[OK] Test environment cleaned up");
                true
            }
            Err(cause) => {
                error!("[ERROR] {}", GateError::CleanupFailure(cause));
                false
            }
        }
    }
}

#[async_trait]
impl Diagnostics for EnvironmentController {
    async fn dump_logs(&self) {
        warn!("Collecting container logs for diagnosis...");

        let command = self.compose(&["logs"], OutputMode::Capture);
        match self.runner.run(&command).await {
            Ok(output) => {
                warn!("Container logs:\n{}", output.stdout);
                if !output.stderr.trim().is_empty() {
                    error!("Errors while collecting logs:\n{}", output.stderr);
                }
            }
            Err(e) => error!("Failed to collect container logs: {e}"),
        }
    }
}
