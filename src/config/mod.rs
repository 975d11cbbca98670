use config::{Config, ConfigError};
use serde::{Deserialize, Deserializer};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use validator::Validate;

pub const DEFAULT_CONFIG_FILE: &str = "compose-gate.toml";

const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 300;
const DEFAULT_READINESS_DEADLINE_SECS: u64 = 180;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 5;
const DEFAULT_MODULE_TIMEOUT_SECS: u64 = 600;

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct LogConfig {
    #[validate(length(min = 1))]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_format() -> String {
    "pretty".to_string()
}

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct EnvironmentConfig {
    pub project_root: PathBuf,
    /// Environment tool argv prefix, e.g. `["docker-compose"]` or `["docker", "compose"]`.
    #[validate(length(min = 1))]
    #[serde(default = "default_compose_command")]
    pub compose_command: Vec<String>,
    #[validate(length(min = 1))]
    pub compose_file: String,
    #[validate(range(min = 1))]
    pub command_timeout_secs: u64,
}

fn default_compose_command() -> Vec<String> {
    vec!["docker-compose".to_string()]
}

#[derive(Debug, Deserialize, Clone, Default, Validate)]
pub struct DependencyConfig {
    /// Unset means: derive from the environment tool, see
    /// [`AppConfig::required_tools`].
    #[serde(default)]
    pub tools: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct PreconditionConfig {
    /// Relative paths resolve against `environment.project_root`.
    #[serde(default = "default_required_files")]
    pub required_files: Vec<PathBuf>,
}

fn default_required_files() -> Vec<PathBuf> {
    vec![PathBuf::from(".env.dev"), PathBuf::from(".env.hh.dev")]
}

/// How a service proves it can accept real work.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProbeConfig {
    /// Ready when the command exits 0.
    Command { command: Vec<String> },
    /// Ready when a GET returns 200.
    Http { url: String },
}

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct ServiceConfig {
    #[validate(length(min = 1))]
    pub name: String,
    #[serde(flatten)]
    pub probe: ProbeConfig,
}

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct ReadinessConfig {
    #[validate(range(min = 1))]
    pub deadline_secs: u64,
    #[validate(range(min = 1))]
    pub interval_secs: u64,
    #[validate(range(min = 1))]
    pub probe_timeout_secs: u64,
    /// Probed in order; list dependencies before their dependents.
    #[validate(nested)]
    #[serde(default = "default_services")]
    pub services: Vec<ServiceConfig>,
}

fn default_services() -> Vec<ServiceConfig> {
    vec![
        ServiceConfig {
            name: "test_db".to_string(),
            probe: ProbeConfig::Command {
                command: [
                    "docker",
                    "exec",
                    "job_platform_test_db",
                    "pg_isready",
                    "-U",
                    "test_user",
                    "-d",
                    "job_platform_test",
                ]
                .iter()
                .map(ToString::to_string)
                .collect(),
            },
        },
        ServiceConfig {
            name: "test_api".to_string(),
            probe: ProbeConfig::Http {
                url: "http://localhost:8001/api/v1/docs".to_string(),
            },
        },
    ]
}

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct ModuleConfig {
    #[validate(length(min = 1))]
    pub name: String,
    /// Relative paths resolve against `environment.project_root`.
    pub path: PathBuf,
    #[validate(length(min = 1))]
    pub command: Vec<String>,
    /// Written as `["KEY=VALUE", ...]` so variable names keep their case.
    #[serde(default, deserialize_with = "deserialize_env_pairs")]
    pub env: HashMap<String, String>,
    #[validate(range(min = 1))]
    #[serde(default = "default_module_timeout")]
    pub timeout_secs: u64,
}

fn deserialize_env_pairs<'de, D>(deserializer: D) -> Result<HashMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    Vec::<String>::deserialize(deserializer)?
        .into_iter()
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
            _ => Err(serde::de::Error::custom(format!(
                "expected KEY=VALUE, got '{pair}'"
            ))),
        })
        .collect()
}

fn default_module_timeout() -> u64 {
    DEFAULT_MODULE_TIMEOUT_SECS
}

fn default_modules() -> Vec<ModuleConfig> {
    vec![ModuleConfig {
        name: "job-bot".to_string(),
        path: PathBuf::from("job-bot"),
        command: ["python", "-m", "pytest", "tests/integration/", "-v", "--tb=short"]
            .iter()
            .map(ToString::to_string)
            .collect(),
        env: HashMap::from([(
            "API_BASE_URL".to_string(),
            "http://localhost:8001".to_string(),
        )]),
        timeout_secs: DEFAULT_MODULE_TIMEOUT_SECS,
    }]
}

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct AppConfig {
    #[validate(nested)]
    pub log: LogConfig,
    #[validate(nested)]
    pub environment: EnvironmentConfig,
    #[validate(nested)]
    #[serde(default)]
    pub dependencies: DependencyConfig,
    #[validate(nested)]
    pub preconditions: PreconditionConfig,
    #[validate(nested)]
    pub readiness: ReadinessConfig,
    #[validate(nested)]
    #[serde(default = "default_modules")]
    pub modules: Vec<ModuleConfig>,
}

impl AppConfig {
    /// Load defaults, then `path` (or [`DEFAULT_CONFIG_FILE`]) if it exists,
    /// then `GATE_*` environment variables (`GATE_READINESS__DEADLINE_SECS=60`).
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let file = path.map_or_else(
            || PathBuf::from(DEFAULT_CONFIG_FILE),
            Path::to_path_buf,
        );
        // An explicitly requested file must exist.
        let required = path.is_some();

        let s = Config::builder()
            .set_default("log.level", "info")?
            .set_default("log.format", "pretty")?
            .set_default("environment.project_root", ".")?
            .set_default("environment.compose_file", "docker-compose.test.yml")?
            .set_default(
                "environment.command_timeout_secs",
                DEFAULT_COMMAND_TIMEOUT_SECS,
            )?
            .set_default(
                "preconditions.required_files",
                vec![".env.dev", ".env.hh.dev"],
            )?
            .set_default("readiness.deadline_secs", DEFAULT_READINESS_DEADLINE_SECS)?
            .set_default("readiness.interval_secs", DEFAULT_POLL_INTERVAL_SECS)?
            .set_default("readiness.probe_timeout_secs", DEFAULT_PROBE_TIMEOUT_SECS)?
            .add_source(
                config::File::from(file)
                    .format(config::FileFormat::Toml)
                    .required(required),
            )
            .add_source(
                config::Environment::with_prefix("GATE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: AppConfig = s.try_deserialize()?;
        config.check()?;
        Ok(config)
    }

    fn check(&self) -> Result<(), ConfigError> {
        if let Err(e) = self.validate() {
            return Err(ConfigError::Message(format!("Validation error: {e}")));
        }

        let mut seen = HashSet::new();
        for module in &self.modules {
            if !seen.insert(module.name.as_str()) {
                return Err(ConfigError::Message(format!(
                    "Duplicate module name '{}': every module needs its own result",
                    module.name
                )));
            }
        }

        let mut seen = HashSet::new();
        for service in &self.readiness.services {
            if !seen.insert(service.name.as_str()) {
                return Err(ConfigError::Message(format!(
                    "Duplicate service name '{}'",
                    service.name
                )));
            }
            if matches!(&service.probe, ProbeConfig::Command { command } if command.is_empty()) {
                return Err(ConfigError::Message(format!(
                    "Service '{}' has an empty probe command",
                    service.name
                )));
            }
        }

        Ok(())
    }

    /// Tools that must answer `--version`: the configured list, or docker,
    /// the program behind `compose_command` and python.
    #[must_use]
    pub fn required_tools(&self) -> Vec<String> {
        if let Some(tools) = &self.dependencies.tools {
            return tools.clone();
        }

        let mut tools = vec!["docker".to_string()];
        if let Some(program) = self.environment.compose_command.first() {
            if !tools.contains(program) {
                tools.push(program.clone());
            }
        }
        tools.push("python".to_string());
        tools
    }

    /// Resolve `path` against the project root unless it is already absolute.
    #[must_use]
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.environment.project_root.join(path)
        }
    }
}
