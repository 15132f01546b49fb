//! Target scaler — computes a worker count straight from the backlog.
//!
//! ```text
//! concurrency = override ?: max_items_per_invocation (> 0) ?: 100
//! target      = ceil(remaining_work / concurrency)
//! target      = min(target, partition_count)   if partition_count > 0
//! ```

use tracing::info;

use feedscale_core::{MetricsSample, ScalerDescriptor, TargetScaleResult};

use crate::error::{AutoscaleResult, ScaleError};

/// Per-worker concurrency when neither an override nor a batch size is set.
pub const DEFAULT_CONCURRENCY: i64 = 100;

/// Target-based scaler for one monitored change feed.
#[derive(Debug, Clone)]
pub struct TargetScaler {
    descriptor: ScalerDescriptor,
    /// Configured per-invocation batch size; `<= 0` means unset.
    max_items_per_invocation: i64,
}

impl TargetScaler {
    pub fn new(descriptor: ScalerDescriptor, max_items_per_invocation: i64) -> Self {
        Self {
            descriptor,
            max_items_per_invocation,
        }
    }

    pub fn descriptor(&self) -> &ScalerDescriptor {
        &self.descriptor
    }

    /// Effective per-worker concurrency. Not validated.
    pub fn resolve_concurrency(&self, instance_concurrency: Option<i64>) -> i64 {
        match instance_concurrency {
            Some(c) => c,
            None if self.max_items_per_invocation > 0 => self.max_items_per_invocation,
            None => DEFAULT_CONCURRENCY,
        }
    }

    /// Compute the target worker count for the given backlog.
    ///
    /// Fails with `InvalidConcurrency` if the resolved concurrency is not
    /// positive; that is a deployment misconfiguration, not a transient.
    pub fn get_scale_result(
        &self,
        instance_concurrency: Option<i64>,
        remaining_work: u64,
        partition_count: u32,
    ) -> AutoscaleResult<TargetScaleResult> {
        let concurrency = self.resolve_concurrency(instance_concurrency);
        let per_worker = u64::try_from(concurrency)
            .ok()
            .filter(|c| *c > 0)
            .ok_or(ScaleError::InvalidConcurrency(concurrency))?;

        let uncapped = u32::try_from(remaining_work.div_ceil(per_worker)).unwrap_or(u32::MAX);
        let capped = partition_count > 0 && uncapped > partition_count;
        let target_worker_count = if capped { partition_count } else { uncapped };

        let cap_note = if capped {
            format!(" (capped from {uncapped} at partition count {partition_count})")
        } else {
            String::new()
        };
        info!(
            function_id = %self.descriptor.function_id(),
            container_id = %self.descriptor.container_id(),
            remaining_work,
            concurrency,
            partition_count,
            target_worker_count,
            capped,
            "target worker count for function '{}' is {target_worker_count}{cap_note}",
            self.descriptor.function_id()
        );

        Ok(TargetScaleResult {
            target_worker_count,
        })
    }

    /// [`get_scale_result`](Self::get_scale_result) for a fresh sample.
    pub fn scale_result_for_sample(
        &self,
        instance_concurrency: Option<i64>,
        sample: &MetricsSample,
    ) -> AutoscaleResult<TargetScaleResult> {
        self.get_scale_result(
            instance_concurrency,
            sample.remaining_work,
            sample.partition_count,
        )
    }
}
