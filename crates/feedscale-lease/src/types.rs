//! Lease records persisted in the lease store.

use serde::{Deserialize, Serialize};

/// Ownership and progress of one change-feed partition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LeaseRecord {
    /// Partition (lease) token.
    pub lease_token: String,
    /// Processor name the lease belongs to.
    pub prefix: String,
    /// Worker currently holding the lease, if any.
    pub owner: Option<String>,
    /// Last position processed by the owner.
    pub checkpoint: u64,
    /// Latest position written to the partition.
    pub head: u64,
    /// Unix timestamp (seconds) of the last update.
    pub updated_at: u64,
}

impl LeaseRecord {
    pub fn new(prefix: &str, lease_token: &str) -> Self {
        Self {
            lease_token: lease_token.to_string(),
            prefix: prefix.to_string(),
            owner: None,
            checkpoint: 0,
            head: 0,
            updated_at: 0,
        }
    }

    /// Items written but not yet processed.
    pub fn estimated_lag(&self) -> u64 {
        self.head.saturating_sub(self.checkpoint)
    }

    pub fn table_key(&self) -> String {
        lease_key(&self.prefix, &self.lease_token)
    }
}

pub fn lease_key(prefix: &str, lease_token: &str) -> String {
    format!("{prefix}..{lease_token}")
}
