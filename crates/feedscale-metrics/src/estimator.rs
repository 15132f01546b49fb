//! Change-feed estimator port.
//!
//! The estimator reports the unprocessed-item lag for every lease of a
//! processor. Implementations wrap a document database client or, for
//! local runs, the redb lease store in `feedscale-lease`.

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

/// Lag estimate for a single lease.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaseEstimate {
    pub lease_token: String,
    pub estimated_lag: u64,
}

impl LeaseEstimate {
    pub fn new(lease_token: impl Into<String>, estimated_lag: u64) -> Self {
        Self {
            lease_token: lease_token.into(),
            estimated_lag,
        }
    }
}

/// Transport-level failure reaching the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpFailure {
    /// The backend answered with an error status.
    ProtocolError { status: u16, description: String },
    /// The backend host could not be resolved.
    NameResolution { host: String },
    Other(String),
}

impl fmt::Display for HttpFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpFailure::ProtocolError {
                status,
                description,
            } => write!(f, "status {status}: {description}"),
            HttpFailure::NameResolution { host } => write!(f, "name resolution failed for {host}"),
            HttpFailure::Other(msg) => f.write_str(msg),
        }
    }
}

/// Failures reported by a change-feed estimator.
///
/// The wrapped clients do not expose structured subtypes for every case,
/// so everything that is not `Gone`, `NotFound` or `Http` is classified by
/// message text downstream.
#[derive(Debug, Error)]
pub enum EstimatorError {
    /// A partition is being split; metrics cannot be computed right now.
    #[error("resource gone: {0}")]
    Gone(String),

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("backend error (status {status:?}): {message}")]
    Backend { status: Option<u16>, message: String },

    /// The client was asked to do something its current state forbids.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("http request failed: {0}")]
    Http(HttpFailure),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl EstimatorError {
    /// The raw backend message, without the variant prefix.
    pub fn message(&self) -> String {
        match self {
            EstimatorError::Gone(msg)
            | EstimatorError::NotFound(msg)
            | EstimatorError::InvalidOperation(msg) => msg.clone(),
            EstimatorError::Backend { message, .. } => message.clone(),
            EstimatorError::Http(failure) => failure.to_string(),
            EstimatorError::Other(err) => err.to_string(),
        }
    }

    /// Short name used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            EstimatorError::Gone(_) => "gone",
            EstimatorError::NotFound(_) => "not_found",
            EstimatorError::Backend { .. } => "backend",
            EstimatorError::InvalidOperation(_) => "invalid_operation",
            EstimatorError::Http(_) => "http",
            EstimatorError::Other(_) => "other",
        }
    }
}

/// Source of per-lease backlog estimates for a change-feed processor.
#[async_trait]
pub trait ChangeFeedEstimator: Send + Sync {
    /// Estimate the lag of every lease owned by `processor`.
    ///
    /// An empty result means the lease store has not been initialized yet.
    async fn estimate(&self, processor: &str) -> Result<Vec<LeaseEstimate>, EstimatorError>;
}
