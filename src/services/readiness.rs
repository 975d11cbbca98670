use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info};

use crate::config::ReadinessConfig;
use crate::errors::GateError;
use crate::models::ServiceSpec;
use crate::services::environment::Diagnostics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOutcome {
    pub ready: bool,
    pub attempts: u32,
}

/// Call `probe` every `interval` until it returns `Ok(true)` or `deadline`
/// passes. Probe errors count as "not ready yet". Never sleeps past the
/// deadline.
pub async fn poll_until<F, Fut>(mut probe: F, interval: Duration, deadline: Instant) -> PollOutcome
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<bool>>,
{
    let mut attempts = 0;

    while Instant::now() < deadline {
        attempts += 1;
        match probe().await {
            Ok(true) => {
                return PollOutcome {
                    ready: true,
                    attempts,
                }
            }
            Ok(false) => {}
            Err(e) => debug!(attempt = attempts, "Readiness check failed: {e:#}"),
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        tokio::time::sleep(interval.min(remaining)).await;
    }

    PollOutcome {
        ready: false,
        attempts,
    }
}

/// Waits for services in dependency order under one shared deadline.
#[derive(Debug, Clone, Copy)]
pub struct ReadinessProber {
    deadline: Duration,
    interval: Duration,
}

impl ReadinessProber {
    pub fn new(deadline: Duration, interval: Duration) -> Self {
        Self { deadline, interval }
    }

    pub fn from_config(config: &ReadinessConfig) -> Self {
        Self::new(
            Duration::from_secs(config.deadline_secs),
            Duration::from_secs(config.interval_secs),
        )
    }

    /// The deadline is measured from the start of the whole phase, not per
    /// service. The first service that misses it stops the phase: later
    /// services are not probed and `diagnostics` dumps the environment logs.
    pub async fn wait_all(
        &self,
        services: &[ServiceSpec],
        diagnostics: &dyn Diagnostics,
    ) -> Result<(), GateError> {
        info!(
            "Waiting for {} service(s) (timeout: {}s)...",
            services.len(),
            self.deadline.as_secs()
        );
        let deadline = Instant::now() + self.deadline;

        for service in services {
            info!("  Waiting for {} ({})...", service.name, service.check.describe());

            let outcome = poll_until(|| service.check.is_ready(), self.interval, deadline).await;
            if !outcome.ready {
                error!(
                    "[ERROR] {} not ready within {} seconds ({} attempts)",
                    service.name,
                    self.deadline.as_secs(),
                    outcome.attempts
                );
                diagnostics.dump_logs().await;
                return Err(GateError::ReadinessTimeout {
                    service: service.name.clone(),
                    waited: self.deadline,
                });
            }

            info!(
                "  [OK] {} ready (attempt {})",
                service.name, outcome.attempts
            );
        }

        info!("[OK] All services ready");
        Ok(())
    }
}
