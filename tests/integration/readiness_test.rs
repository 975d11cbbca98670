// @critical: readiness gating with real probes
use super::test_utils::FakeProject;
use compose_gate::config::{ProbeConfig, ServiceConfig};
use compose_gate::errors::GateError;
use compose_gate::models::RunConfig;
use compose_gate::orchestrator::{Orchestrator, RunState};
use compose_gate::services::process::TokioProcessRunner;
use std::sync::Arc;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

fn http_service(name: &str, url: String) -> ServiceConfig {
    ServiceConfig {
        name: name.to_string(),
        probe: ProbeConfig::Http { url },
    }
}

#[tokio::test]
async fn test_http_and_command_probes_gate_the_tests() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/docs"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let project = FakeProject::new();
    let services = vec![
        ServiceConfig {
            name: "test_db".to_string(),
            probe: ProbeConfig::Command {
                command: vec!["sh".to_string(), "-c".to_string(), "exit 0".to_string()],
            },
        },
        http_service("test_api", format!("{}/api/v1/docs", server.uri())),
    ];
    let config = project.config(&[("alpha", "exit 0")], services);

    let report = Orchestrator::from_config(&config, RunConfig::default(), Arc::new(TokioProcessRunner))
        .unwrap()
        .run()
        .await;

    assert_eq!(report.state, RunState::Done);
    assert_eq!(report.exit_code(), 0);
}

#[tokio::test]
async fn test_unready_api_dumps_logs_and_skips_tests() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/docs"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let project = FakeProject::new();
    let marker = project.path().join("tests-ran");
    let script = format!("touch {}", marker.display());
    let mut config = project.config(
        &[("alpha", script.as_str())],
        vec![http_service("test_api", format!("{}/api/v1/docs", server.uri()))],
    );
    config.readiness.deadline_secs = 2;

    let report = Orchestrator::from_config(&config, RunConfig::default(), Arc::new(TokioProcessRunner))
        .unwrap()
        .run()
        .await;

    assert!(matches!(
        report.result,
        Err(GateError::ReadinessTimeout { ref service, .. }) if service == "test_api"
    ));
    assert!(!marker.exists(), "tests must not run against an unready stack");
    assert_eq!(
        project.compose_calls(),
        vec!["down -v --remove-orphans", "up -d", "logs", "down -v"]
    );
}
