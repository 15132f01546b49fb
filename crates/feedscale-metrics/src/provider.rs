//! Metrics provider — samples backlog and partition count for one
//! monitored change feed.
//!
//! Every call yields a `MetricsSample`. Known transient backend failures
//! are logged and turned into either `{1, 1}` (keep a worker around) or
//! `{0, 0}` (no information this cycle). The only error that escapes is an
//! unclassified `InvalidOperation`.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use feedscale_core::{MetricsSample, ScalerDescriptor};

use crate::classify::classify_message;
use crate::estimator::{ChangeFeedEstimator, EstimatorError, HttpFailure};

/// Default number of `NotFound` responses answered with `{1, 1}`.
pub const DEFAULT_NOT_FOUND_ATTEMPTS: u32 = 5;

/// Default bound on a single estimator query.
pub const DEFAULT_METRICS_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors the provider refuses to absorb.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("invalid operation while estimating change feed: {0}")]
    InvalidOperation(String),
}

pub type MetricsResult<T> = Result<T, MetricsError>;

/// Produces one `MetricsSample` per call for a single source/lease-store pair.
pub struct MetricsProvider {
    estimator: Arc<dyn ChangeFeedEstimator>,
    /// Processor name (lease prefix) whose leases are estimated.
    processor: String,
    descriptor: ScalerDescriptor,
    not_found_limit: u32,
    /// `NotFound` responses answered so far, over the provider's lifetime.
    not_found_count: AtomicU32,
    timeout: Duration,
}

impl MetricsProvider {
    pub fn new(
        estimator: Arc<dyn ChangeFeedEstimator>,
        processor: impl Into<String>,
        descriptor: ScalerDescriptor,
    ) -> Self {
        Self {
            estimator,
            processor: processor.into(),
            descriptor,
            not_found_limit: DEFAULT_NOT_FOUND_ATTEMPTS,
            not_found_count: AtomicU32::new(0),
            timeout: DEFAULT_METRICS_TIMEOUT,
        }
    }

    pub fn with_not_found_limit(mut self, limit: u32) -> Self {
        self.not_found_limit = limit;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn descriptor(&self) -> &ScalerDescriptor {
        &self.descriptor
    }

    /// Number of `NotFound` responses absorbed so far.
    pub fn not_found_attempts(&self) -> u32 {
        self.not_found_count.load(Ordering::Relaxed)
    }

    /// Sample the current backlog.
    pub async fn get_metrics(&self) -> MetricsResult<MetricsSample> {
        let query = self.estimator.estimate(&self.processor);
        let leases = match tokio::time::timeout(self.timeout, query).await {
            Ok(Ok(leases)) => leases,
            Ok(Err(e)) => return self.handle_error(e),
            Err(_) => {
                warn!(
                    descriptor = %self.descriptor,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "change feed estimate timed out"
                );
                return Ok(MetricsSample::no_information());
            }
        };

        if leases.is_empty() {
            warn!(
                descriptor = %self.descriptor,
                processor = %self.processor,
                "no leases found; lease store not initialized yet, assigning one worker"
            );
            return Ok(MetricsSample::assign_one_worker());
        }

        let partition_count = u32::try_from(leases.len()).unwrap_or(u32::MAX);
        let remaining_work = leases
            .iter()
            .fold(0u64, |acc, l| acc.saturating_add(l.estimated_lag));

        debug!(
            descriptor = %self.descriptor,
            partition_count,
            remaining_work,
            "change feed metrics sampled"
        );
        Ok(MetricsSample::new(partition_count, remaining_work))
    }

    fn handle_error(&self, err: EstimatorError) -> MetricsResult<MetricsSample> {
        match &err {
            EstimatorError::Gone(msg) => {
                warn!(
                    descriptor = %self.descriptor,
                    error = %msg,
                    "partition split in progress; assigning one worker"
                );
                return Ok(MetricsSample::assign_one_worker());
            }
            EstimatorError::NotFound(msg) if self.claim_not_found_attempt() => {
                warn!(
                    descriptor = %self.descriptor,
                    attempt = self.not_found_attempts(),
                    limit = self.not_found_limit,
                    error = %msg,
                    "lease container not found; assigning one worker so leases can be created"
                );
                return Ok(MetricsSample::assign_one_worker());
            }
            EstimatorError::Http(failure) => {
                self.log_http_failure(failure);
                return Ok(MetricsSample::no_information());
            }
            _ => {}
        }

        let message = err.message();
        if let Some(class) = classify_message(&message) {
            warn!(descriptor = %self.descriptor, kind = err.kind(), "{}", class.render(&message));
            return Ok(MetricsSample::no_information());
        }

        warn!(
            descriptor = %self.descriptor,
            kind = err.kind(),
            error = %message,
            "unable to handle change feed estimator error"
        );
        match err {
            EstimatorError::InvalidOperation(msg) => Err(MetricsError::InvalidOperation(msg)),
            _ => Ok(MetricsSample::no_information()),
        }
    }

    /// Take one slot of the not-found budget; false once it is exhausted.
    fn claim_not_found_attempt(&self) -> bool {
        let limit = self.not_found_limit;
        self.not_found_count
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
                (n < limit).then_some(n + 1)
            })
            .is_ok()
    }

    fn log_http_failure(&self, failure: &HttpFailure) {
        match failure {
            HttpFailure::ProtocolError {
                status,
                description,
            } => warn!(
                descriptor = %self.descriptor,
                status,
                "change feed backend returned status {status}: {description}"
            ),
            HttpFailure::NameResolution { host } => warn!(
                descriptor = %self.descriptor,
                "lookup failed for change feed backend host {host}"
            ),
            HttpFailure::Other(msg) => warn!(
                descriptor = %self.descriptor,
                error = %msg,
                "change feed backend request failed"
            ),
        }
    }
}
