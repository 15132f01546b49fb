//! feedscaled — the feedscale daemon.
//!
//! Runs the scale monitor for one change-feed triggered function:
//! - Lease store estimator (redb file, opened per poll)
//! - Metrics provider
//! - Vote or target scaler
//!
//! # Usage
//!
//! ```text
//! feedscaled init feedscale.toml --function orders-projection --database shop --container orders
//! feedscaled run --config feedscale.toml --mode target
//! feedscaled lease list --config feedscale.toml
//! ```

mod decisions;
mod lease_admin;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

use feedscale_autoscale::ScaleMonitor;
use feedscale_core::{FeedScaleConfig, ScalingMode};
use feedscale_lease::LeaseFileEstimator;

const DEFAULT_LOG_FILTER: &str = "info,feedscale=debug";

#[derive(Parser)]
#[command(name = "feedscaled", about = "Change-feed scale monitor daemon")]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the scale monitor until Ctrl-C.
    Run {
        /// Path to feedscale.toml.
        #[arg(long, default_value = "feedscale.toml")]
        config: PathBuf,

        /// Override `scaling.mode` ("vote" or "target").
        #[arg(long)]
        mode: Option<ScalingMode>,

        /// Override `scaling.interval` (e.g. "10s", "1m").
        #[arg(long)]
        interval: Option<String>,

        /// Append worker count changes as JSON lines to this file.
        #[arg(long)]
        decision_log: Option<PathBuf>,
    },

    /// Write a starter feedscale.toml.
    Init {
        path: PathBuf,

        #[arg(long)]
        function: String,

        #[arg(long)]
        database: String,

        #[arg(long)]
        container: String,

        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },

    /// Inspect or update the lease store.
    Lease {
        #[command(subcommand)]
        action: lease_admin::LeaseCommand,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Command::Run {
            config,
            mode,
            interval,
            decision_log,
        } => run_monitor(&config, mode, interval, decision_log).await,
        Command::Init {
            path,
            function,
            database,
            container,
            force,
        } => init_config(&path, &function, &database, &container, force),
        Command::Lease { action } => lease_admin::run(action),
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Load the config file and apply command-line overrides.
fn load_config(
    path: &Path,
    mode: Option<ScalingMode>,
    interval: Option<String>,
) -> anyhow::Result<FeedScaleConfig> {
    let mut config = FeedScaleConfig::from_file(path)
        .with_context(|| format!("loading {}", path.display()))?;
    if let Some(mode) = mode {
        config.scaling.mode = mode;
    }
    if let Some(interval) = interval {
        config.scaling.interval = interval;
    }
    config.validate()?;
    Ok(config)
}

async fn run_monitor(
    config_path: &Path,
    mode: Option<ScalingMode>,
    interval: Option<String>,
    decision_log: Option<PathBuf>,
) -> anyhow::Result<()> {
    let config = load_config(config_path, mode, interval)?;
    let interval = config.scaling.interval()?;

    let estimator = Arc::new(LeaseFileEstimator::new(&config.lease_store.path));
    let mut monitor = ScaleMonitor::from_config(&config, estimator)?;
    if let Some(path) = decision_log {
        info!(path = ?path, "recording worker count changes");
        monitor = monitor.with_scale_fn(decisions::append_to(path));
    }

    info!(
        descriptor = %config.descriptor(),
        mode = ?config.scaling.mode,
        lease_location = %config.function.lease_location(),
        lease_store = ?config.lease_store.path,
        "feedscaled starting"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            return;
        }
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    monitor.run(interval, shutdown_rx).await;

    info!("feedscaled stopped");
    Ok(())
}

fn init_config(
    path: &Path,
    function: &str,
    database: &str,
    container: &str,
    force: bool,
) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }
    let config = FeedScaleConfig::scaffold(function, database, container);
    std::fs::write(path, config.to_toml_string()?)
        .with_context(|| format!("writing {}", path.display()))?;
    info!(path = ?path, descriptor = %config.descriptor(), "config written");
    Ok(())
}
