use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{AppConfig, ModuleConfig, ProbeConfig, ServiceConfig};
use crate::services::probes::{CommandCheck, FnCheck, HttpCheck, ReadinessCheck};
use crate::services::process::{ProcessCommand, ProcessRunner};

/// A named service and the check that says whether it can take work.
#[derive(Clone)]
pub struct ServiceSpec {
    pub name: String,
    pub check: Arc<dyn ReadinessCheck>,
}

impl ServiceSpec {
    pub fn new(name: impl Into<String>, check: Arc<dyn ReadinessCheck>) -> Self {
        Self {
            name: name.into(),
            check,
        }
    }

    /// Service whose readiness is a plain in-process predicate.
    pub fn from_fn<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        Self::new(name, Arc::new(FnCheck::new(f)))
    }

    /// Build the configured probe. Command probes share `runner`.
    pub fn from_config(
        service: &ServiceConfig,
        runner: Arc<dyn ProcessRunner>,
        probe_timeout: Duration,
    ) -> anyhow::Result<Self> {
        let check: Arc<dyn ReadinessCheck> = match &service.probe {
            ProbeConfig::Command { command } => {
                let command = ProcessCommand::from_argv(command, probe_timeout).ok_or_else(
                    || anyhow::anyhow!("Service '{}' has an empty probe command", service.name),
                )?;
                Arc::new(CommandCheck::new(runner, command))
            }
            ProbeConfig::Http { url } => Arc::new(HttpCheck::new(url.clone(), probe_timeout)?),
        };
        Ok(Self::new(service.name.clone(), check))
    }
}

impl fmt::Debug for ServiceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceSpec")
            .field("name", &self.name)
            .field("check", &self.check.describe())
            .finish()
    }
}

/// One independently versioned test target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSpec {
    pub name: String,
    pub working_dir: PathBuf,
    pub test_command: Vec<String>,
    pub env_overrides: HashMap<String, String>,
    pub timeout: Duration,
}

impl ModuleSpec {
    pub fn from_config(module: &ModuleConfig, config: &AppConfig) -> Self {
        Self {
            name: module.name.clone(),
            working_dir: config.resolve(&module.path),
            test_command: module.command.clone(),
            env_overrides: module.env.clone(),
            timeout: Duration::from_secs(module.timeout_secs),
        }
    }
}
