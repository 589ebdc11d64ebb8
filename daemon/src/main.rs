//! Keeper daemon — entry point for running the liveness and rewards engine.
//!
//! Storage, cache and notification backends here are the in-memory ones
//! from `keeper-nullables`, seeded from the config's `seed_keepers`. A
//! production deployment links real implementations of the `keeper-store`
//! traits in their place, plus a transport that feeds check-ins to
//! `keeper_node::CheckInService`; neither is part of this binary.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use tokio::net::TcpListener;

use keeper_node::{
    init_logging, spawn_metrics_server, EngineConfig, EngineMetrics, InactivityDetector,
    KeeperRegistry, LogFormat, OfflineAlerter, RewardsEngine, ShutdownController,
};
use keeper_nullables::{NullKeeperRepository, NullNotifier, NullUptimeCache};
use keeper_types::{KeeperRecord, SystemClock};

#[derive(Parser)]
#[command(name = "keeperd", about = "Keeper liveness and rewards daemon")]
struct Cli {
    /// Path to a TOML configuration file. Defaults are used when omitted.
    #[arg(long, env = "KEEPER_CONFIG")]
    config: Option<PathBuf>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    /// Overrides the config file's `log_level`.
    #[arg(long, env = "KEEPER_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json". Overrides the config file's `log_format`.
    #[arg(long, env = "KEEPER_LOG_FORMAT")]
    log_format: Option<String>,

    /// Subcommand.
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Run the engine until SIGINT/SIGTERM.
    Run,
    /// Print the effective configuration as TOML and exit.
    Config,
}

fn load_config(cli: &Cli) -> anyhow::Result<EngineConfig> {
    let mut config = match cli.config {
        Some(ref path) => EngineConfig::from_toml_file(&path.to_string_lossy())
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => EngineConfig::default(),
    };
    if let Some(ref level) = cli.log_level {
        config.log_level = level.clone();
    }
    if let Some(ref format) = cli.log_format {
        config.log_format = format.clone();
    }
    config.validate()?;
    Ok(config)
}

async fn run(config: EngineConfig) -> anyhow::Result<()> {
    let clock = Arc::new(SystemClock);
    let metrics = Arc::new(EngineMetrics::new());
    let repository = Arc::new(NullKeeperRepository::with_verified(
        config
            .seed_keepers
            .iter()
            .cloned()
            .map(KeeperRecord::new)
            .collect(),
    ));
    let cache = Arc::new(NullUptimeCache::new());
    let notifier = Arc::new(NullNotifier::new());

    let registry = Arc::new(KeeperRegistry::new(
        repository.clone(),
        clock.clone(),
        metrics.clone(),
        config.max_retries,
    ));
    let loaded = registry
        .load_verified_keepers()
        .await
        .context("failed to load verified keepers")?;

    let shutdown = ShutdownController::new();

    let metrics_handle = if config.enable_metrics {
        let listener = TcpListener::bind(config.metrics_addr.as_str())
            .await
            .with_context(|| format!("failed to bind metrics endpoint {}", config.metrics_addr))?;
        Some(spawn_metrics_server(listener, metrics.clone(), shutdown.subscribe()))
    } else {
        None
    };

    let mut detector = InactivityDetector::from_config(registry.clone(), &config);
    if let Some(alerter) = OfflineAlerter::from_config(notifier, &config.alerts) {
        detector = detector.with_alerter(Arc::new(alerter));
        tracing::info!("offline alerts enabled");
    }
    let detector_handle = detector.spawn(shutdown.subscribe());

    let rewards = Arc::new(RewardsEngine::from_config(
        repository,
        cache,
        clock,
        metrics.clone(),
        &config,
    )?);
    let health = rewards.health().await;
    tracing::info!(
        status = health.status.as_str(),
        next_distribution = %health.next_distribution,
        "rewards engine ready"
    );
    let rewards_handle = rewards.spawn(shutdown.subscribe());

    tracing::info!(
        keepers = loaded,
        sweep_interval_secs = config.sweep_interval_secs,
        inactivity_threshold_secs = config.inactivity_threshold_secs,
        "keeper engine started"
    );

    shutdown.wait_for_signal().await?;
    tracing::info!("shutdown signal received, stopping engine");
    shutdown.shutdown();

    if let Err(e) = detector_handle.await {
        tracing::error!(error = %e, "inactivity detector task failed");
    }
    if let Err(e) = rewards_handle.await {
        tracing::error!(error = %e, "rewards scheduler task failed");
    }
    if let Some(handle) = metrics_handle {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "metrics endpoint task failed");
        }
    }

    let report = registry.dump_state().await;
    if !report.failed.is_empty() {
        tracing::warn!(failed = report.failed.len(), "some keepers could not be marked inactive");
    }
    match registry.flush_snapshot().await {
        Ok(count) => tracing::info!(count, "registry snapshot flushed"),
        Err(e) => tracing::error!(error = %e, "registry snapshot flush failed"),
    }

    tracing::info!("keeper daemon exited cleanly");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command {
        Command::Config => {
            print!("{}", config.to_toml_string());
            Ok(())
        }
        Command::Run => {
            let format: LogFormat = config.log_format.parse()?;
            init_logging(format, &config.log_level)?;
            run(config).await
        }
    }
}
