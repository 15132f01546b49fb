//! feedscale-lease — embedded lease store for change-feed processors.
//!
//! Backed by [redb](https://docs.rs/redb). Each lease records how far a
//! partition has been written (`head`) and processed (`checkpoint`); the
//! difference is the lag reported to the metrics provider.
//!
//! Two `ChangeFeedEstimator` implementations are provided:
//!
//! - `LeaseStore` estimates over an already-open database.
//! - `LeaseFileEstimator` opens the file per query, so the daemon does not
//!   hold the redb lock between polls.

pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{LeaseError, LeaseResult};
pub use store::{LeaseFileEstimator, LeaseStore};
pub use types::{LeaseRecord, lease_key};
