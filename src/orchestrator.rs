use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, info_span, Instrument};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::errors::GateError;
use crate::models::{ModuleSpec, RunConfig, RunOutcome, ServiceSpec};
use crate::services::dependencies::DependencyChecker;
use crate::services::environment::EnvironmentController;
use crate::services::executor::TestExecutor;
use crate::services::preconditions::PreconditionValidator;
use crate::services::process::ProcessRunner;
use crate::services::readiness::ReadinessProber;
use crate::services::reporter::Reporter;

/// Phases of a run, in order. A run only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RunState {
    Init,
    DepsOk,
    ConfigOk,
    EnvUp,
    ServicesReady,
    TestsDone,
    CleanedUp,
    Done,
}

/// Where a run stopped and what it produced.
#[derive(Debug)]
pub struct RunReport {
    /// Last state reached.
    pub state: RunState,
    /// `Err` when the run aborted before tests could run.
    pub result: Result<RunOutcome, GateError>,
}

impl RunReport {
    /// Process exit status: 0 only when every module passed and cleanup
    /// succeeded or was suppressed.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match &self.result {
            Ok(outcome) => Reporter::summarize(outcome).exit_code(),
            Err(_) => 1,
        }
    }
}

pub struct Orchestrator {
    run_config: RunConfig,
    dependencies: DependencyChecker,
    preconditions: PreconditionValidator,
    environment: EnvironmentController,
    prober: ReadinessProber,
    executor: TestExecutor,
    services: Vec<ServiceSpec>,
    modules: Vec<ModuleSpec>,
}

impl Orchestrator {
    /// Wire every component from configuration. All subprocesses, probes
    /// included, go through `runner`.
    pub fn from_config(
        config: &AppConfig,
        run_config: RunConfig,
        runner: Arc<dyn ProcessRunner>,
    ) -> anyhow::Result<Self> {
        let probe_timeout = Duration::from_secs(config.readiness.probe_timeout_secs);
        let services = config
            .readiness
            .services
            .iter()
            .map(|service| ServiceSpec::from_config(service, runner.clone(), probe_timeout))
            .collect::<anyhow::Result<Vec<_>>>()?;
        let modules = config
            .modules
            .iter()
            .map(|module| ModuleSpec::from_config(module, config))
            .collect();
        let required_files = config
            .preconditions
            .required_files
            .iter()
            .map(|path| config.resolve(path))
            .collect();

        Ok(Self {
            run_config,
            dependencies: DependencyChecker::new(runner.clone(), config.required_tools()),
            preconditions: PreconditionValidator::new(required_files),
            environment: EnvironmentController::new(runner.clone(), &config.environment, run_config),
            prober: ReadinessProber::from_config(&config.readiness),
            executor: TestExecutor::new(runner, run_config),
            services,
            modules,
        })
    }

    /// Replace the configured services, e.g. with in-process checks.
    #[must_use]
    pub fn with_services(mut self, services: Vec<ServiceSpec>) -> Self {
        self.services = services;
        self
    }

    #[must_use]
    pub fn with_modules(mut self, modules: Vec<ModuleSpec>) -> Self {
        self.modules = modules;
        self
    }

    pub async fn run(&self) -> RunReport {
        let span = info_span!("gate_run", run_id = %Uuid::new_v4());
        self.run_phases().instrument(span).await
    }

    /// Run and print the report; returns the process exit code.
    pub async fn execute(&self) -> i32 {
        let report = self.run().await;
        match &report.result {
            Ok(outcome) => Reporter::report(outcome).exit_code(),
            Err(e) => {
                error!("Integration run aborted: {e}");
                println!("\nINTEGRATION TESTS COMPLETED WITH ERRORS");
                report.exit_code()
            }
        }
    }

    async fn run_phases(&self) -> RunReport {
        let mut state = RunState::Init;

        // Nothing has been started yet, so these abort without cleanup.
        if let Err(e) = self.dependencies.check().await {
            return RunReport { state, result: Err(e) };
        }
        advance(&mut state, RunState::DepsOk);

        if let Err(e) = self.preconditions.validate() {
            return RunReport { state, result: Err(e) };
        }
        advance(&mut state, RunState::ConfigOk);

        // From here on the stack may hold resources.
        if let Err(e) = self.environment.start().await {
            self.cleanup().await;
            return RunReport { state, result: Err(e) };
        }
        advance(&mut state, RunState::EnvUp);

        if let Err(e) = self.prober.wait_all(&self.services, &self.environment).await {
            self.cleanup().await;
            return RunReport { state, result: Err(e) };
        }
        advance(&mut state, RunState::ServicesReady);

        let results = self.executor.run_all(&self.modules).await;
        advance(&mut state, RunState::TestsDone);

        let cleanup_succeeded = self.cleanup().await;
        advance(&mut state, RunState::CleanedUp);
        advance(&mut state, RunState::Done);

        RunReport {
            state,
            result: Ok(RunOutcome {
                results,
                cleanup_succeeded,
            }),
        }
    }

    async fn cleanup(&self) -> bool {
        if self.run_config.no_cleanup {
            info!("Skipping cleanup (--no-cleanup)");
            return true;
        }
        self.environment.stop().await
    }
}

fn advance(state: &mut RunState, next: RunState) {
    debug!(from = ?state, to = ?next, "Run state transition");
    *state = next;
}
