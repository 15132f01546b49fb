//! `feedscaled lease …` subcommands for local lease stores.

use std::path::{Path, PathBuf};

use clap::Subcommand;
use tracing::info;

use feedscale_core::FeedScaleConfig;
use feedscale_lease::{LeaseRecord, LeaseStore};

#[derive(Subcommand)]
pub enum LeaseCommand {
    /// Print the function's leases as JSON lines.
    List {
        #[arg(long, default_value = "feedscale.toml")]
        config: PathBuf,
    },

    /// Record new writes on a partition (creates the lease if missing).
    Advance {
        #[arg(long, default_value = "feedscale.toml")]
        config: PathBuf,

        lease_token: String,

        head: u64,
    },

    /// Record processing progress on a partition.
    Checkpoint {
        #[arg(long, default_value = "feedscale.toml")]
        config: PathBuf,

        lease_token: String,

        owner: String,

        position: u64,
    },

    /// Remove a lease.
    Delete {
        #[arg(long, default_value = "feedscale.toml")]
        config: PathBuf,

        lease_token: String,
    },
}

pub fn run(command: LeaseCommand) -> anyhow::Result<()> {
    match command {
        LeaseCommand::List { config } => {
            let (store, prefix) = open(&config)?;
            for lease in store.list_leases(&prefix)? {
                println!("{}", render(&lease)?);
            }
        }
        LeaseCommand::Advance {
            config,
            lease_token,
            head,
        } => {
            let (store, prefix) = open(&config)?;
            let lease = store.advance_head(&prefix, &lease_token, head)?;
            info!(lease = %lease.table_key(), head = lease.head, lag = lease.estimated_lag(), "lease advanced");
        }
        LeaseCommand::Checkpoint {
            config,
            lease_token,
            owner,
            position,
        } => {
            let (store, prefix) = open(&config)?;
            let lease = store.checkpoint(&prefix, &lease_token, &owner, position)?;
            info!(lease = %lease.table_key(), checkpoint = lease.checkpoint, lag = lease.estimated_lag(), "lease checkpointed");
        }
        LeaseCommand::Delete {
            config,
            lease_token,
        } => {
            let (store, prefix) = open(&config)?;
            let existed = store.delete_lease(&prefix, &lease_token)?;
            info!(%lease_token, existed, "lease deleted");
        }
    }
    Ok(())
}

fn open(config_path: &Path) -> anyhow::Result<(LeaseStore, String)> {
    let config = FeedScaleConfig::from_file(config_path)?;
    if let Some(parent) = config.lease_store.path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let store = LeaseStore::open(&config.lease_store.path)?;
    Ok((store, config.function.lease_prefix))
}

/// A lease plus its current lag, as one JSON line.
fn render(lease: &LeaseRecord) -> anyhow::Result<String> {
    let mut value = serde_json::to_value(lease)?;
    value["estimated_lag"] = lease.estimated_lag().into();
    Ok(value.to_string())
}
