use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;

use crate::services::process::{ProcessCommand, ProcessError, ProcessRunner};

/// Answers "can this service accept real work yet?".
///
/// An `Err` means the check itself could not complete; the prober treats it
/// the same as `Ok(false)` and tries again on the next interval.
#[async_trait]
pub trait ReadinessCheck: Send + Sync {
    async fn is_ready(&self) -> anyhow::Result<bool>;

    /// Short human-readable description for logs.
    fn describe(&self) -> String;
}

/// Wraps a synchronous predicate.
pub struct FnCheck<F> {
    f: F,
}

impl<F> FnCheck<F>
where
    F: Fn() -> bool + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F> ReadinessCheck for FnCheck<F>
where
    F: Fn() -> bool + Send + Sync,
{
    async fn is_ready(&self) -> anyhow::Result<bool> {
        Ok((self.f)())
    }

    fn describe(&self) -> String {
        "in-process check".to_string()
    }
}

/// Ready when a health command (e.g. `pg_isready`) exits 0.
pub struct CommandCheck {
    runner: Arc<dyn ProcessRunner>,
    command: ProcessCommand,
}

impl CommandCheck {
    pub fn new(runner: Arc<dyn ProcessRunner>, command: ProcessCommand) -> Self {
        Self { runner, command }
    }
}

#[async_trait]
impl ReadinessCheck for CommandCheck {
    async fn is_ready(&self) -> anyhow::Result<bool> {
        match self.runner.run(&self.command).await {
            Ok(output) => Ok(output.success()),
            // A probe that hangs is a service that is not ready yet.
            Err(ProcessError::Timeout { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn describe(&self) -> String {
        format!("command `{}`", self.command.display())
    }
}

/// Ready when `GET url` answers 200.
pub struct HttpCheck {
    client: Client,
    url: String,
}

impl HttpCheck {
    pub fn new(url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl ReadinessCheck for HttpCheck {
    async fn is_ready(&self) -> anyhow::Result<bool> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .with_context(|| format!("GET {} failed", self.url))?;
        Ok(response.status() == StatusCode::OK)
    }

    fn describe(&self) -> String {
        format!("GET {}", self.url)
    }
}
