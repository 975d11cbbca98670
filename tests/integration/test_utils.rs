// Shared fixtures: a throwaway project root with a fake environment tool.
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use compose_gate::config::{
    AppConfig, DependencyConfig, EnvironmentConfig, LogConfig, ModuleConfig, PreconditionConfig,
    ReadinessConfig, ServiceConfig,
};

/// Stands in for `docker-compose`: records its arguments and fails `up`
/// when a `fail-up` marker exists next to it.
const FAKE_COMPOSE: &str = r#"#!/bin/sh
dir=$(dirname "$0")
echo "$*" >> "$dir/compose.log"
case "$*" in
  *"up -d"*)
    if [ -f "$dir/fail-up" ]; then
      echo "cannot start service test_api" >&2
      exit 1
    fi
    ;;
  *logs*)
    echo "test_db | database system is ready"
    ;;
esac
exit 0
"#;

/// A program that answers `--version` with exit 0 on any host. `sh` does
/// not: dash rejects the flag.
pub const PRESENT_TOOL: &str = env!("CARGO_BIN_EXE_compose-gate");

pub struct FakeProject {
    pub root: tempfile::TempDir,
}

impl FakeProject {
    pub fn new() -> Self {
        let root = tempfile::tempdir().expect("Failed to create project root");
        std::fs::write(root.path().join(".env.dev"), "POSTGRES_USER=test_user\n").unwrap();
        std::fs::write(root.path().join(".env.hh.dev"), "HH_TOKEN=test\n").unwrap();
        std::fs::write(root.path().join("fake-compose.sh"), FAKE_COMPOSE).unwrap();
        Self { root }
    }

    pub fn path(&self) -> &Path {
        self.root.path()
    }

    pub fn compose_script(&self) -> PathBuf {
        self.path().join("fake-compose.sh")
    }

    /// Create a module directory; its tests run `script` under `sh -c`.
    pub fn add_module(&self, name: &str) -> PathBuf {
        let dir = self.path().join(name);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    pub fn fail_environment_start(&self) {
        std::fs::write(self.path().join("fail-up"), "").unwrap();
    }

    /// Every environment-tool invocation so far, one per line, minus `-f <file>`.
    pub fn compose_calls(&self) -> Vec<String> {
        std::fs::read_to_string(self.path().join("compose.log"))
            .unwrap_or_default()
            .lines()
            .map(|line| line.replace("-f docker-compose.test.yml ", ""))
            .collect()
    }

    pub fn config(&self, modules: &[(&str, &str)], services: Vec<ServiceConfig>) -> AppConfig {
        AppConfig {
            log: LogConfig {
                level: "error".to_string(), // Quiet during tests
                format: "pretty".to_string(),
            },
            environment: EnvironmentConfig {
                project_root: self.path().to_path_buf(),
                compose_command: vec![
                    "sh".to_string(),
                    self.compose_script().display().to_string(),
                ],
                compose_file: "docker-compose.test.yml".to_string(),
                command_timeout_secs: 30,
            },
            dependencies: DependencyConfig {
                tools: Some(vec![PRESENT_TOOL.to_string()]),
            },
            preconditions: PreconditionConfig {
                required_files: vec![PathBuf::from(".env.dev"), PathBuf::from(".env.hh.dev")],
            },
            readiness: ReadinessConfig {
                deadline_secs: 5,
                interval_secs: 1,
                probe_timeout_secs: 2,
                services,
            },
            modules: modules
                .iter()
                .map(|(name, script)| {
                    self.add_module(name);
                    ModuleConfig {
                        name: (*name).to_string(),
                        path: PathBuf::from(*name),
                        command: vec!["sh".to_string(), "-c".to_string(), (*script).to_string()],
                        env: HashMap::from([(
                            "API_BASE_URL".to_string(),
                            "http://localhost:8001".to_string(),
                        )]),
                        timeout_secs: 30,
                    }
                })
                .collect(),
        }
    }

    /// Write a TOML config for the binary and return its path.
    pub fn write_toml(&self, body: &str) -> PathBuf {
        let head = format!(
            r#"
[log]
level = "error"

[environment]
project_root = "{root}"
compose_command = ["sh", "{script}"]
command_timeout_secs = 30

[dependencies]
tools = ["{tool}"]

[readiness]
deadline_secs = 5
interval_secs = 1
services = []
"#,
            root = self.path().display(),
            script = self.compose_script().display(),
            tool = PRESENT_TOOL
        );
        let path = self.path().join("compose-gate.toml");
        std::fs::write(&path, format!("{head}\n{body}")).unwrap();
        path
    }
}
