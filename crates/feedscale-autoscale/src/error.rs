//! Autoscaler error types.

use thiserror::Error;

/// Errors surfaced to the host instead of being absorbed.
#[derive(Debug, Error)]
pub enum ScaleError {
    #[error("instance concurrency must be greater than zero, got {0}")]
    InvalidConcurrency(i64),

    #[error("metrics error: {0}")]
    Metrics(#[from] feedscale_metrics::MetricsError),
}

pub type AutoscaleResult<T> = Result<T, ScaleError>;
