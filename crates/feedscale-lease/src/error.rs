//! Error types for the lease store.

use thiserror::Error;

/// Result type alias for lease store operations.
pub type LeaseResult<T> = Result<T, LeaseError>;

/// Errors that can occur during lease store operations.
#[derive(Debug, Error)]
pub enum LeaseError {
    #[error("failed to open lease store: {0}")]
    Open(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("table error: {0}")]
    Table(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),

    #[error("lease not found: {0}")]
    NotFound(String),
}
