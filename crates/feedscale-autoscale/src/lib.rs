//! feedscale-autoscale — scale decisions for a leased change feed.
//!
//! Two alternative strategies share one `MetricsProvider`:
//!
//! - **Vote** (`VoteScaler`): a rolling window of samples is run through an
//!   ordered rule table; the first rule that fires decides between
//!   `ScaleOut`, `ScaleIn` and `None`.
//! - **Target** (`TargetScaler`): one fresh sample and a per-worker
//!   concurrency give the worker count directly,
//!   `ceil(remaining_work / concurrency)` capped at the partition count.
//!
//! `ScaleMonitor` owns the window and runs the periodic loop; the scalers
//! themselves are synchronous and keep no state between calls.

pub mod error;
pub mod monitor;
pub mod target;
pub mod vote;
pub mod window;

pub use error::{AutoscaleResult, ScaleError};
pub use monitor::{ScaleAction, ScaleCallback, ScaleFuture, ScaleMonitor};
pub use target::{DEFAULT_CONCURRENCY, TargetScaler};
pub use vote::{MAX_REMAINING_WORK_PER_WORKER, VoteScaler};
pub use window::SampleWindow;
