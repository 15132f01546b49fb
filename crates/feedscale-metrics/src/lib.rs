//! feedscale-metrics — backlog sampling for a leased change feed.
//!
//! # Architecture
//!
//! ```text
//! MetricsProvider
//!   ├── ChangeFeedEstimator::estimate() → per-lease lag
//!   ├── sum lag / count leases → MetricsSample
//!   └── on failure:
//!       ├── Gone, NotFound (bounded) → {1, 1}
//!       ├── classify_message() table → log, {0, 0}
//!       └── unclassified InvalidOperation → MetricsError
//! ```
//!
//! The provider never blocks the scaling loop on a hung backend: each
//! estimate is bounded by a timeout.

pub mod classify;
pub mod estimator;
pub mod provider;

pub use classify::{Classification, KNOWN_ERRORS, classify_message};
pub use estimator::{ChangeFeedEstimator, EstimatorError, HttpFailure, LeaseEstimate};
pub use provider::{
    DEFAULT_METRICS_TIMEOUT, DEFAULT_NOT_FOUND_ATTEMPTS, MetricsError, MetricsProvider,
    MetricsResult,
};
