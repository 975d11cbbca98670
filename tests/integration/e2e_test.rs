// @critical: full runs against real subprocesses
use super::test_utils::{FakeProject, PRESENT_TOOL};
use compose_gate::errors::GateError;
use compose_gate::models::RunConfig;
use compose_gate::orchestrator::{Orchestrator, RunState};
use compose_gate::services::process::TokioProcessRunner;
use compose_gate::services::reporter::Reporter;
use std::sync::Arc;

fn orchestrator(project: &FakeProject, modules: &[(&str, &str)], run_config: RunConfig) -> Orchestrator {
    let config = project.config(modules, Vec::new());
    Orchestrator::from_config(&config, run_config, Arc::new(TokioProcessRunner))
        .expect("Failed to build orchestrator")
}

#[tokio::test]
async fn test_all_modules_pass() {
    let project = FakeProject::new();
    let gate = orchestrator(
        &project,
        &[
            ("alpha", "exit 0"),
            ("job-bot", "test \"$API_BASE_URL\" = http://localhost:8001"),
        ],
        RunConfig::default(),
    );

    let report = gate.run().await;

    assert_eq!(report.state, RunState::Done);
    assert_eq!(report.exit_code(), 0);
    let outcome = report.result.as_ref().expect("run should complete");
    assert!(outcome.cleanup_succeeded);
    assert_eq!(Reporter::summarize(outcome).total_passed, 2);
    assert_eq!(
        project.compose_calls(),
        vec!["down -v --remove-orphans", "up -d", "down -v"]
    );
}

#[tokio::test]
async fn test_alpha_passes_beta_fails() {
    let project = FakeProject::new();
    let gate = orchestrator(
        &project,
        &[
            ("alpha", "echo '3 passed'"),
            ("beta", "echo 'FAILED test_api.py::test_create_job'; exit 1"),
        ],
        RunConfig::default(),
    );

    let report = gate.run().await;
    let outcome = report.result.as_ref().expect("run should complete");
    let summary = Reporter::summarize(outcome);

    assert_eq!(summary.total_passed, 1);
    assert_eq!(summary.total_failed, 1);
    assert!(!summary.success());
    assert_eq!(report.exit_code(), 1);

    let beta = &outcome.results[1];
    assert_eq!(beta.module_name, "beta");
    assert!(beta.stdout.contains("test_create_job"));

    let text = Reporter::render(outcome, &summary);
    assert!(text.contains("alpha: PASSED"));
    assert!(text.contains("beta: FAILED"));
}

#[tokio::test]
async fn test_module_runs_in_its_own_directory() {
    let project = FakeProject::new();
    let dir = project.add_module("job-bot");
    std::fs::write(dir.join("conftest.py"), "").unwrap();

    let report = orchestrator(
        &project,
        &[("job-bot", "test -f conftest.py")],
        RunConfig::default(),
    )
    .run()
    .await;

    assert_eq!(report.exit_code(), 0);
}

#[tokio::test]
async fn test_environment_start_failure_cleans_up() {
    let project = FakeProject::new();
    project.fail_environment_start();

    let report = orchestrator(&project, &[("alpha", "exit 0")], RunConfig::default())
        .run()
        .await;

    assert!(report.result.is_err());
    assert_eq!(report.exit_code(), 1);
    assert_eq!(
        project.compose_calls(),
        vec!["down -v --remove-orphans", "up -d", "down -v"]
    );
}

#[tokio::test]
async fn test_no_cleanup_leaves_stack_running() {
    let project = FakeProject::new();
    let run_config = RunConfig {
        verbose: false,
        no_cleanup: true,
    };

    let report = orchestrator(&project, &[("alpha", "exit 0")], run_config)
        .run()
        .await;

    assert_eq!(report.exit_code(), 0);
    assert_eq!(
        project.compose_calls(),
        vec!["down -v --remove-orphans", "up -d"]
    );
}

#[tokio::test]
async fn test_missing_env_file_never_touches_environment() {
    let project = FakeProject::new();
    std::fs::remove_file(project.path().join(".env.dev")).unwrap();

    let report = orchestrator(&project, &[("alpha", "exit 0")], RunConfig::default())
        .run()
        .await;

    assert_eq!(report.state, RunState::DepsOk);
    assert!(project.compose_calls().is_empty());
}

#[tokio::test]
async fn test_missing_tool_stops_before_anything_starts() {
    let project = FakeProject::new();
    let mut config = project.config(&[("alpha", "exit 0")], Vec::new());
    config.dependencies.tools = Some(vec![
        PRESENT_TOOL.to_string(),
        "no-such-compose-tool-42".to_string(),
    ]);

    let report = Orchestrator::from_config(&config, RunConfig::default(), Arc::new(TokioProcessRunner))
        .expect("Failed to build orchestrator")
        .run()
        .await;

    assert_eq!(report.state, RunState::Init);
    assert!(matches!(
        report.result,
        Err(GateError::DependencyMissing { ref tool, .. }) if tool == "no-such-compose-tool-42"
    ));
    assert!(project.compose_calls().is_empty());
}
