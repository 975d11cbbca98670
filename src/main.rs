use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use compose_gate::config::AppConfig;
use compose_gate::models::RunConfig;
use compose_gate::orchestrator::Orchestrator;
use compose_gate::services::process::TokioProcessRunner;

/// Stand up the disposable test stack, run every module's integration
/// tests against it and tear it down again.
#[derive(Debug, Parser)]
#[command(name = "compose-gate", version, about)]
struct Cli {
    /// Leave the containers running after the tests
    #[arg(long)]
    no_cleanup: bool,

    /// Detailed output, including the environment tool's own output
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file [default: compose-gate.toml when present]
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,
}

impl Cli {
    fn run_config(&self) -> RunConfig {
        RunConfig {
            verbose: self.verbose,
            no_cleanup: self.no_cleanup,
        }
    }
}

fn setup_logging(config: &AppConfig, verbose: bool) {
    let level = if verbose { "debug" } else { config.log.level.as_str() };
    let filter = EnvFilter::try_new(format!("{level},hyper=warn,hyper_util=warn,reqwest=warn"))
        .unwrap_or_else(|_| EnvFilter::new(&config.log.level));

    // Logs go to stderr so the final report on stdout stays clean.
    match config.log.format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(false)
                        .with_current_span(true)
                        .with_span_list(true)
                        .with_writer(std::io::stderr),
                )
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_target(false)
                        .with_writer(std::io::stderr),
                )
                .init();
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref()).map_err(|e| {
        anyhow::anyhow!("Failed to load configuration: {e}. Please check your config file and GATE_* environment variables.")
    })?;

    setup_logging(&config, cli.verbose);

    info!("Starting compose-gate v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Config loaded: project_root={}, compose_file={}, services={}, modules={}",
        config.environment.project_root.display(),
        config.environment.compose_file,
        config.readiness.services.len(),
        config.modules.len()
    );

    println!("Running integration tests");
    println!("{}", "=".repeat(60));

    let orchestrator =
        Orchestrator::from_config(&config, cli.run_config(), Arc::new(TokioProcessRunner))?;
    let code = orchestrator.execute().await;

    std::process::exit(code);
}
