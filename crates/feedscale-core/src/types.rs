//! Domain types shared by the metrics provider and both scalers.
//!
//! A `MetricsSample` is produced once per polling interval and consumed
//! read-only. Scalers answer with either a `ScaleVote` (vote mode) or a
//! `TargetScaleResult` (target mode).

use std::fmt;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// Number of trailing samples the trend heuristics look at.
pub const NUMBER_OF_SAMPLES_TO_CONSIDER: usize = 5;

/// Source type segment used in scaler descriptors.
pub const DEFAULT_SOURCE_TYPE: &str = "changefeedtrigger";

// ── Metrics ────────────────────────────────────────────────────────

/// One observation of a monitored change feed.
///
/// `partition_count == 0` means "no information this cycle". An
/// uninitialized lease store is reported as `{1, 1}` instead so that at
/// least one worker gets provisioned to create the leases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSample {
    /// When the sample was taken.
    pub timestamp: SystemTime,
    /// Number of leases (partitions) known to the lease store.
    pub partition_count: u32,
    /// Sum of estimated lag across all leases.
    pub remaining_work: u64,
}

impl MetricsSample {
    /// A sample taken now.
    pub fn new(partition_count: u32, remaining_work: u64) -> Self {
        Self::at(SystemTime::now(), partition_count, remaining_work)
    }

    /// A sample with an explicit timestamp.
    pub fn at(timestamp: SystemTime, partition_count: u32, remaining_work: u64) -> Self {
        Self {
            timestamp,
            partition_count,
            remaining_work,
        }
    }

    /// `{1, 1}`: forces the host to keep at least one worker around.
    pub fn assign_one_worker() -> Self {
        Self::new(1, 1)
    }

    /// `{0, 0}`: nothing could be learned this cycle.
    pub fn no_information() -> Self {
        Self::new(0, 0)
    }
}

// ── Decisions ──────────────────────────────────────────────────────

/// Scale direction produced by the vote scaler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleVote {
    #[default]
    None,
    ScaleIn,
    ScaleOut,
}

impl fmt::Display for ScaleVote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ScaleVote::None => "none",
            ScaleVote::ScaleIn => "scale_in",
            ScaleVote::ScaleOut => "scale_out",
        };
        f.write_str(s)
    }
}

/// Worker count computed by the target scaler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetScaleResult {
    pub target_worker_count: u32,
}

// ── Descriptor ─────────────────────────────────────────────────────

/// Stable identity of a scaler, used by the host to correlate decisions
/// across polling cycles.
///
/// Rendered as lowercase `{function_id}-{source_type}-{database_id}-{container_id}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScalerDescriptor {
    function_id: String,
    database_id: String,
    container_id: String,
    id: String,
}

impl ScalerDescriptor {
    /// Descriptor with the default change-feed source type.
    pub fn new(function_id: &str, database_id: &str, container_id: &str) -> Self {
        Self::with_source_type(function_id, DEFAULT_SOURCE_TYPE, database_id, container_id)
    }

    pub fn with_source_type(
        function_id: &str,
        source_type: &str,
        database_id: &str,
        container_id: &str,
    ) -> Self {
        let id = format!("{function_id}-{source_type}-{database_id}-{container_id}").to_lowercase();
        Self {
            function_id: function_id.to_string(),
            database_id: database_id.to_string(),
            container_id: container_id.to_string(),
            id,
        }
    }

    /// The normalized descriptor string.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn function_id(&self) -> &str {
        &self.function_id
    }

    pub fn database_id(&self) -> &str {
        &self.database_id
    }

    pub fn container_id(&self) -> &str {
        &self.container_id
    }
}

impl fmt::Display for ScalerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_is_lowercase_and_hyphen_joined() {
        let d = ScalerDescriptor::new("OrdersProjection", "Shop", "Orders");
        assert_eq!(d.id(), "ordersprojection-changefeedtrigger-shop-orders");
        assert_eq!(d.to_string(), d.id());
        // Original casing is kept for log fields.
        assert_eq!(d.function_id(), "OrdersProjection");
        assert_eq!(d.container_id(), "Orders");
    }

    #[test]
    fn descriptor_custom_source_type() {
        let d = ScalerDescriptor::with_source_type("fn", "CosmosDBTrigger", "db", "c");
        assert_eq!(d.id(), "fn-cosmosdbtrigger-db-c");
    }

    #[test]
    fn sentinel_samples() {
        let one = MetricsSample::assign_one_worker();
        assert_eq!((one.partition_count, one.remaining_work), (1, 1));

        let none = MetricsSample::no_information();
        assert_eq!((none.partition_count, none.remaining_work), (0, 0));
    }

    #[test]
    fn vote_display_and_default() {
        assert_eq!(ScaleVote::default(), ScaleVote::None);
        assert_eq!(ScaleVote::ScaleOut.to_string(), "scale_out");
        assert_eq!(ScaleVote::ScaleIn.to_string(), "scale_in");
    }
}
