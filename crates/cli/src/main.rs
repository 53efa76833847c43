use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use calsweep_core::{
    load_config, validate_config, CalibrationEngine, ExternalEngine, LoadAwareScheduler,
    NoopPermissionBracket, PermissionBracket, PipelineRunner, UnixPermissionBracket,
};

/// One pass of the calibration and compression pipeline over a data tree.
#[derive(Debug, Parser)]
#[command(name = "calsweep", version)]
struct Cli {
    /// Path to the configuration file (default: $CALSWEEP_CONFIG or
    /// config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Dispatch calibration and compression through the load-aware
    /// scheduler
    #[arg(long)]
    parallel: bool,

    /// Skip the permission bracket around the pass
    #[arg(long)]
    no_permissions: bool,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    // Determine config path
    let config_path = cli
        .config
        .or_else(|| std::env::var("CALSWEEP_CONFIG").map(PathBuf::from).ok())
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let mut config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    // Command switches override the file
    if cli.parallel {
        config.orchestrator.parallel = true;
    }
    if cli.no_permissions {
        config.permissions.enabled = false;
    }

    info!("Configuration loaded successfully");
    info!("Base directory: {:?}", config.orchestrator.base_dir);
    info!("Parallel scheduling: {}", config.orchestrator.parallel);
    info!("Permission bracket: {}", config.permissions.enabled);

    // Create the engine and make sure it is reachable before any work
    let engine = Arc::new(ExternalEngine::new(config.engine.clone()));
    engine
        .validate()
        .await
        .context("Calibration engine validation failed")?;

    // Create the permission bracket
    let permissions: Arc<dyn PermissionBracket> = if config.permissions.enabled {
        Arc::new(UnixPermissionBracket::new(
            config.permissions.to_permission_config(),
        ))
    } else {
        Arc::new(NoopPermissionBracket)
    };

    // Interrupts stop cleanly between windows rather than mid-engine-run
    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; finishing the current window before stopping");
            signal_cancel.cancel();
        }
    });

    let scheduler =
        LoadAwareScheduler::new(config.scheduler.clone()).with_cancellation(cancel.clone());
    let runner = PipelineRunner::new(
        config.orchestrator.clone(),
        engine,
        scheduler,
        permissions,
    )
    .with_cancellation(cancel);

    // Per-file failures are tolerated and reported; only configuration
    // failures exit non-zero.
    let report = runner.run().await.context("Pipeline pass failed")?;
    info!("Pass summary: {}", report.summary());
    if let Ok(json) = serde_json::to_string_pretty(&report) {
        tracing::debug!("Full report: {json}");
    }
    if !report.window_failures.is_empty() {
        warn!(
            "{} calibration window(s) failed: {:?}",
            report.window_failures.len(),
            report.window_failures
        );
    }

    Ok(())
}
