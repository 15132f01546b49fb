//! Scale monitor — the polling loop around the provider and scalers.
//!
//! Each tick samples the change feed once, appends the sample to the
//! rolling window, asks the configured scaler for a decision, and applies
//! it to the tracked worker count. Scaling itself is performed by an
//! optional callback to the host.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use feedscale_core::{
    ConfigResult, FeedScaleConfig, NUMBER_OF_SAMPLES_TO_CONSIDER, ScaleVote, ScalingMode,
    TargetScaleResult,
};
use feedscale_metrics::{ChangeFeedEstimator, MetricsProvider};

use crate::error::AutoscaleResult;
use crate::target::TargetScaler;
use crate::vote::VoteScaler;
use crate::window::SampleWindow;

/// Decision taken on one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleAction {
    Vote(ScaleVote),
    Target(TargetScaleResult),
}

/// Callback type for performing scaling actions.
///
/// The monitor calls this with (descriptor, new_worker_count).
pub type ScaleCallback = Box<dyn Fn(&str, u32) -> ScaleFuture + Send + Sync>;

pub type ScaleFuture = std::pin::Pin<
    Box<dyn std::future::Future<Output = anyhow::Result<()>> + Send>,
>;

/// Drives one monitored change feed.
pub struct ScaleMonitor {
    provider: MetricsProvider,
    mode: ScalingMode,
    vote: VoteScaler,
    target: TargetScaler,
    /// Target-mode concurrency override.
    instance_concurrency: Option<i64>,
    window: SampleWindow,
    worker_count: u32,
    scale_fn: Option<ScaleCallback>,
}

impl ScaleMonitor {
    pub fn new(
        provider: MetricsProvider,
        mode: ScalingMode,
        max_items_per_invocation: i64,
        window: SampleWindow,
    ) -> Self {
        let descriptor = provider.descriptor().clone();
        Self {
            vote: VoteScaler::new(descriptor.clone()),
            target: TargetScaler::new(descriptor, max_items_per_invocation),
            provider,
            mode,
            instance_concurrency: None,
            window,
            worker_count: 0,
            scale_fn: None,
        }
    }

    /// Build a monitor from a validated config.
    pub fn from_config(
        config: &FeedScaleConfig,
        estimator: Arc<dyn ChangeFeedEstimator>,
    ) -> ConfigResult<Self> {
        let scaling = &config.scaling;
        let provider = MetricsProvider::new(
            estimator,
            config.function.lease_prefix.clone(),
            config.descriptor(),
        )
        .with_not_found_limit(scaling.not_found_attempts)
        .with_timeout(scaling.metrics_timeout()?);

        if scaling.mode == ScalingMode::Vote
            && scaling.window_max_samples < NUMBER_OF_SAMPLES_TO_CONSIDER
        {
            warn!(
                window_max_samples = scaling.window_max_samples,
                needed = NUMBER_OF_SAMPLES_TO_CONSIDER,
                "sample window too small for trend rules; votes limited to partition checks"
            );
        }

        info!(
            descriptor = %config.descriptor(),
            lease_location = %config.function.lease_location(),
            processor = %config.function.lease_prefix,
            mode = ?scaling.mode,
            "monitoring leases in {}",
            config.function.lease_location()
        );

        let window = SampleWindow::new(scaling.window_max_samples, scaling.window_max_age()?);
        Ok(Self::new(
            provider,
            scaling.mode,
            config.function.max_items_per_invocation,
            window,
        )
        .with_instance_concurrency(scaling.instance_concurrency)
        .with_worker_count(scaling.initial_workers))
    }

    pub fn with_instance_concurrency(mut self, concurrency: Option<i64>) -> Self {
        self.instance_concurrency = concurrency;
        self
    }

    pub fn with_worker_count(mut self, worker_count: u32) -> Self {
        self.worker_count = worker_count;
        self
    }

    /// Set the callback used to perform scaling.
    pub fn with_scale_fn(mut self, f: ScaleCallback) -> Self {
        self.scale_fn = Some(f);
        self
    }

    pub fn worker_count(&self) -> u32 {
        self.worker_count
    }

    pub fn window(&self) -> &SampleWindow {
        &self.window
    }

    pub fn mode(&self) -> ScalingMode {
        self.mode
    }

    /// Run one sampling + decision cycle.
    pub async fn tick(&mut self) -> AutoscaleResult<ScaleAction> {
        let sample = self.provider.get_metrics().await?;
        self.window.push(sample);

        let current = self.worker_count;
        let (action, desired) = match self.mode {
            ScalingMode::Vote => {
                let vote = self.vote.get_scale_status(current, self.window.as_slice());
                let desired = match vote {
                    ScaleVote::ScaleOut => current.saturating_add(1),
                    ScaleVote::ScaleIn => current.saturating_sub(1),
                    ScaleVote::None => current,
                };
                (ScaleAction::Vote(vote), desired)
            }
            ScalingMode::Target => {
                let result = self
                    .target
                    .scale_result_for_sample(self.instance_concurrency, &sample)?;
                (ScaleAction::Target(result), result.target_worker_count)
            }
        };

        if desired != current {
            self.apply(desired).await;
        }
        Ok(action)
    }

    async fn apply(&mut self, desired: u32) {
        let descriptor = self.provider.descriptor().clone();
        info!(
            descriptor = %descriptor,
            from = self.worker_count,
            to = desired,
            "worker count changed"
        );
        self.worker_count = desired;

        if let Some(ref scale_fn) = self.scale_fn
            && let Err(e) = scale_fn(descriptor.id(), desired).await
        {
            warn!(
                descriptor = %descriptor,
                target = desired,
                error = %e,
                "scaling action failed"
            );
        }
    }

    /// Run the monitor loop until shutdown.
    pub async fn run(
        &mut self,
        interval: Duration,
        mut shutdown: tokio::sync::watch::Receiver<bool>,
    ) {
        info!(
            descriptor = %self.provider.descriptor(),
            mode = ?self.mode,
            interval_ms = interval.as_millis() as u64,
            "scale monitor started"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    if let Err(e) = self.tick().await {
                        tracing::error!(
                            descriptor = %self.provider.descriptor(),
                            error = %e,
                            "scale monitor tick failed"
                        );
                    }
                }
                _ = shutdown.changed() => {
                    info!("scale monitor shutting down");
                    break;
                }
            }
        }
    }
}
