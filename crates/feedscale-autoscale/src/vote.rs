//! Vote scaler — turns a window of metrics samples into a scale direction.
//!
//! Rules are evaluated in table order and the first one that fires decides
//! the vote. The order is the contract:
//!
//! ```text
//! (empty window)           → None
//! too_many_workers         → ScaleIn   latest partitions > 0 and < workers
//! insufficient_history     → None      fewer than 5 samples
//! backlog_per_worker       → ScaleOut  latest work > workers * 1000
//! sustained_backlog        → ScaleOut  last 5: work > 0, partitions > workers
//! idle                     → ScaleIn   last 5: work == 0
//! backlog_increasing       → ScaleOut  last 5 strictly increasing, oldest > 0
//! backlog_decreasing       → ScaleIn   last 5 strictly decreasing
//! (no rule fired)          → None
//! ```

use tracing::{debug, info};

use feedscale_core::{MetricsSample, NUMBER_OF_SAMPLES_TO_CONSIDER, ScaleVote, ScalerDescriptor};

/// Backlog a single worker is expected to keep up with.
pub const MAX_REMAINING_WORK_PER_WORKER: u64 = 1000;

/// What every rule gets to look at.
#[derive(Debug, Clone, Copy)]
pub(crate) struct VoteContext<'a> {
    pub worker_count: u32,
    pub latest: &'a MetricsSample,
    /// At most the last `NUMBER_OF_SAMPLES_TO_CONSIDER` samples, oldest first.
    pub recent: &'a [MetricsSample],
    /// Length of the whole window.
    pub sample_count: usize,
}

impl<'a> VoteContext<'a> {
    /// `None` for an empty window.
    pub fn new(worker_count: u32, samples: &'a [MetricsSample]) -> Option<Self> {
        let latest = samples.last()?;
        let start = samples.len().saturating_sub(NUMBER_OF_SAMPLES_TO_CONSIDER);
        Some(Self {
            worker_count,
            latest,
            recent: &samples[start..],
            sample_count: samples.len(),
        })
    }

    /// The trend window, only once it is full.
    fn trend(&self) -> Option<&'a [MetricsSample]> {
        (self.recent.len() == NUMBER_OF_SAMPLES_TO_CONSIDER).then_some(self.recent)
    }
}

/// One entry of the rule table. `check` returns the log reason when the
/// rule fires.
pub(crate) struct Rule {
    pub name: &'static str,
    pub vote: ScaleVote,
    pub check: fn(&VoteContext<'_>) -> Option<String>,
}

pub(crate) const RULES: &[Rule] = &[
    Rule {
        name: "too_many_workers",
        vote: ScaleVote::ScaleIn,
        check: too_many_workers,
    },
    Rule {
        name: "insufficient_history",
        vote: ScaleVote::None,
        check: insufficient_history,
    },
    Rule {
        name: "backlog_per_worker",
        vote: ScaleVote::ScaleOut,
        check: backlog_per_worker,
    },
    Rule {
        name: "sustained_backlog",
        vote: ScaleVote::ScaleOut,
        check: sustained_backlog,
    },
    Rule {
        name: "idle",
        vote: ScaleVote::ScaleIn,
        check: idle,
    },
    Rule {
        name: "backlog_increasing",
        vote: ScaleVote::ScaleOut,
        check: backlog_increasing,
    },
    Rule {
        name: "backlog_decreasing",
        vote: ScaleVote::ScaleIn,
        check: backlog_decreasing,
    },
];

fn too_many_workers(ctx: &VoteContext<'_>) -> Option<String> {
    let partitions = ctx.latest.partition_count;
    (partitions > 0 && partitions < ctx.worker_count).then(|| {
        format!(
            "worker count ({}) is higher than partition count ({partitions})",
            ctx.worker_count
        )
    })
}

fn insufficient_history(ctx: &VoteContext<'_>) -> Option<String> {
    (ctx.sample_count < NUMBER_OF_SAMPLES_TO_CONSIDER).then(|| {
        format!(
            "only {} of {NUMBER_OF_SAMPLES_TO_CONSIDER} samples collected",
            ctx.sample_count
        )
    })
}

fn backlog_per_worker(ctx: &VoteContext<'_>) -> Option<String> {
    let limit = u64::from(ctx.worker_count).saturating_mul(MAX_REMAINING_WORK_PER_WORKER);
    (ctx.latest.remaining_work > limit).then(|| {
        format!(
            "remaining work ({}) is higher than worker count ({}) * {MAX_REMAINING_WORK_PER_WORKER}",
            ctx.latest.remaining_work, ctx.worker_count
        )
    })
}

fn sustained_backlog(ctx: &VoteContext<'_>) -> Option<String> {
    let trend = ctx.trend()?;
    let fires = trend.iter().all(|s| {
        s.remaining_work > 0 && s.partition_count > 0 && s.partition_count > ctx.worker_count
    });
    fires.then(|| {
        format!(
            "remaining work stayed above zero for the last {NUMBER_OF_SAMPLES_TO_CONSIDER} samples \
             with {} partitions and {} workers",
            ctx.latest.partition_count, ctx.worker_count
        )
    })
}

fn idle(ctx: &VoteContext<'_>) -> Option<String> {
    let trend = ctx.trend()?;
    trend
        .iter()
        .all(|s| s.remaining_work == 0)
        .then(|| format!("remaining work was zero for the last {NUMBER_OF_SAMPLES_TO_CONSIDER} samples"))
}

fn backlog_increasing(ctx: &VoteContext<'_>) -> Option<String> {
    let trend = ctx.trend()?;
    let increasing = trend[0].remaining_work > 0
        && trend
            .windows(2)
            .all(|w| w[1].remaining_work > w[0].remaining_work);
    increasing.then(|| format!("remaining work is increasing: {}", render_trend(trend)))
}

fn backlog_decreasing(ctx: &VoteContext<'_>) -> Option<String> {
    let trend = ctx.trend()?;
    let decreasing = trend
        .windows(2)
        .all(|w| w[1].remaining_work < w[0].remaining_work);
    decreasing.then(|| format!("remaining work is decreasing: {}", render_trend(trend)))
}

fn render_trend(samples: &[MetricsSample]) -> String {
    samples
        .iter()
        .map(|s| s.remaining_work.to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Vote-based scaler for one monitored change feed.
#[derive(Debug, Clone)]
pub struct VoteScaler {
    descriptor: ScalerDescriptor,
}

impl VoteScaler {
    pub fn new(descriptor: ScalerDescriptor) -> Self {
        Self { descriptor }
    }

    pub fn descriptor(&self) -> &ScalerDescriptor {
        &self.descriptor
    }

    /// Decide a scale direction from `samples` (oldest first).
    ///
    /// Pure apart from logging: identical inputs give identical votes.
    pub fn get_scale_status(&self, worker_count: u32, samples: &[MetricsSample]) -> ScaleVote {
        let Some(ctx) = VoteContext::new(worker_count, samples) else {
            debug!(descriptor = %self.descriptor, "no metrics samples yet; no vote");
            return ScaleVote::None;
        };

        for rule in RULES {
            if let Some(reason) = (rule.check)(&ctx) {
                info!(
                    descriptor = %self.descriptor,
                    rule = rule.name,
                    vote = %rule.vote,
                    worker_count,
                    partition_count = ctx.latest.partition_count,
                    remaining_work = ctx.latest.remaining_work,
                    "{reason}"
                );
                return rule.vote;
            }
        }

        info!(
            descriptor = %self.descriptor,
            worker_count,
            partition_count = ctx.latest.partition_count,
            remaining_work = ctx.latest.remaining_work,
            "remaining work is steady; no vote"
        );
        ScaleVote::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};
    use tracing_test::traced_test;

    /// Samples one second apart with the given partition counts and backlog.
    fn window(points: &[(u32, u64)]) -> Vec<MetricsSample> {
        points
            .iter()
            .enumerate()
            .map(|(i, &(p, r))| MetricsSample::at(UNIX_EPOCH + Duration::from_secs(i as u64), p, r))
            .collect()
    }

    /// Backlog series with a fixed partition count.
    fn work(partitions: u32, remaining: &[u64]) -> Vec<MetricsSample> {
        let points: Vec<_> = remaining.iter().map(|&r| (partitions, r)).collect();
        window(&points)
    }

    fn scaler() -> VoteScaler {
        VoteScaler::new(ScalerDescriptor::new("fn", "db", "orders"))
    }

    fn rule(name: &str) -> &'static Rule {
        RULES.iter().find(|r| r.name == name).unwrap()
    }

    fn fires(name: &str, worker_count: u32, samples: &[MetricsSample]) -> bool {
        let ctx = VoteContext::new(worker_count, samples).unwrap();
        (rule(name).check)(&ctx).is_some()
    }

    // ── Rule table ─────────────────────────────────────────────────

    #[test]
    fn rule_order_is_fixed() {
        let names: Vec<_> = RULES.iter().map(|r| r.name).collect();
        assert_eq!(
            names,
            [
                "too_many_workers",
                "insufficient_history",
                "backlog_per_worker",
                "sustained_backlog",
                "idle",
                "backlog_increasing",
                "backlog_decreasing",
            ]
        );
    }

    #[test]
    fn too_many_workers_rule() {
        assert!(fires("too_many_workers", 3, &work(2, &[0])));
        assert!(!fires("too_many_workers", 2, &work(2, &[0])));
        // Unknown partition count never triggers it.
        assert!(!fires("too_many_workers", 3, &work(0, &[0])));
        // Only the latest sample matters.
        assert!(!fires("too_many_workers", 3, &window(&[(1, 0), (4, 0)])));
    }

    #[test]
    fn insufficient_history_rule() {
        assert!(fires("insufficient_history", 1, &work(1, &[1, 2, 3, 4])));
        assert!(!fires("insufficient_history", 1, &work(1, &[1, 2, 3, 4, 5])));
    }

    #[test]
    fn backlog_per_worker_rule() {
        assert!(fires("backlog_per_worker", 2, &work(8, &[2001])));
        assert!(!fires("backlog_per_worker", 2, &work(8, &[2000])));
        assert!(fires("backlog_per_worker", 0, &work(8, &[1])));
        let limit = u64::from(u32::MAX) * MAX_REMAINING_WORK_PER_WORKER;
        assert!(!fires("backlog_per_worker", u32::MAX, &work(8, &[limit])));
        assert!(fires("backlog_per_worker", u32::MAX, &work(8, &[limit + 1])));
    }

    #[test]
    fn sustained_backlog_rule() {
        assert!(fires("sustained_backlog", 2, &work(4, &[5, 1, 7, 3, 9])));
        // One empty sample breaks the streak.
        assert!(!fires("sustained_backlog", 2, &work(4, &[5, 0, 7, 3, 9])));
        // No headroom: partitions == workers.
        assert!(!fires("sustained_backlog", 4, &work(4, &[5, 1, 7, 3, 9])));
        // Headroom must hold for every sample, not just the latest.
        let mixed = window(&[(4, 5), (1, 5), (4, 5), (4, 5), (4, 5)]);
        assert!(!fires("sustained_backlog", 2, &mixed));
        // Needs a full trend window.
        assert!(!fires("sustained_backlog", 2, &work(4, &[5, 5, 5, 5])));
    }

    #[test]
    fn idle_rule() {
        assert!(fires("idle", 1, &work(1, &[0, 0, 0, 0, 0])));
        assert!(!fires("idle", 1, &work(1, &[0, 0, 1, 0, 0])));
        // Older non-zero samples outside the trend window are ignored.
        assert!(fires("idle", 1, &work(1, &[9, 9, 0, 0, 0, 0, 0])));
    }

    #[test]
    fn backlog_increasing_rule() {
        assert!(fires("backlog_increasing", 1, &work(1, &[1, 2, 3, 4, 5])));
        // Oldest sample must be non-zero.
        assert!(!fires("backlog_increasing", 1, &work(1, &[0, 2, 3, 4, 5])));
        // Strictly increasing only.
        assert!(!fires("backlog_increasing", 1, &work(1, &[1, 2, 2, 4, 5])));
    }

    #[test]
    fn backlog_decreasing_rule() {
        assert!(fires("backlog_decreasing", 1, &work(1, &[50, 40, 30, 20, 0])));
        assert!(!fires("backlog_decreasing", 1, &work(1, &[50, 40, 40, 20, 10])));
    }

    // ── get_scale_status ───────────────────────────────────────────

    #[test]
    fn empty_window_votes_none() {
        assert_eq!(scaler().get_scale_status(3, &[]), ScaleVote::None);
    }

    #[test]
    #[traced_test]
    fn too_many_workers_wins_regardless_of_trend() {
        // Increasing backlog would otherwise scale out.
        let samples = work(2, &[100, 200, 300, 400, 500]);
        assert_eq!(scaler().get_scale_status(3, &samples), ScaleVote::ScaleIn);
        // Also with a short window.
        assert_eq!(scaler().get_scale_status(3, &work(2, &[5000])), ScaleVote::ScaleIn);
        assert!(logs_contain("worker count (3) is higher than partition count (2)"));
    }

    #[test]
    #[traced_test]
    fn short_window_abstains() {
        let samples = work(8, &[5000, 6000, 7000, 8000]);
        assert_eq!(scaler().get_scale_status(1, &samples), ScaleVote::None);
        assert!(logs_contain("insufficient_history"));
        assert!(logs_contain("only 4 of 5 samples collected"));
    }

    #[test]
    #[traced_test]
    fn backlog_per_worker_scales_out() {
        let samples = work(1, &[0, 0, 0, 0, 1001]);
        assert_eq!(scaler().get_scale_status(1, &samples), ScaleVote::ScaleOut);
        assert!(logs_contain("backlog_per_worker"));
        assert!(logs_contain("remaining work (1001) is higher than worker count (1) * 1000"));
    }

    #[test]
    #[traced_test]
    fn sustained_backlog_scales_out() {
        let samples = work(4, &[10, 5, 10, 5, 10]);
        assert_eq!(scaler().get_scale_status(2, &samples), ScaleVote::ScaleOut);
        assert!(logs_contain(
            "remaining work stayed above zero for the last 5 samples with 4 partitions and 2 workers"
        ));
    }

    #[test]
    #[traced_test]
    fn idle_scales_in() {
        let samples = work(4, &[0, 0, 0, 0, 0]);
        assert_eq!(scaler().get_scale_status(2, &samples), ScaleVote::ScaleIn);
        assert!(logs_contain("remaining work was zero for the last 5 samples"));
    }

    #[test]
    #[traced_test]
    fn increasing_backlog_scales_out() {
        // partitions == workers, so sustained_backlog does not fire first.
        let samples = work(2, &[10, 20, 30, 40, 50]);
        assert_eq!(scaler().get_scale_status(2, &samples), ScaleVote::ScaleOut);
        assert!(logs_contain("remaining work is increasing: 10 -> 20 -> 30 -> 40 -> 50"));
    }

    #[test]
    #[traced_test]
    fn decreasing_backlog_scales_in() {
        let samples = work(2, &[50, 40, 30, 20, 10]);
        assert_eq!(scaler().get_scale_status(2, &samples), ScaleVote::ScaleIn);
        assert!(logs_contain("remaining work is decreasing: 50 -> 40 -> 30 -> 20 -> 10"));
    }

    #[test]
    fn decreasing_to_zero_scales_in() {
        let samples = work(2, &[4, 3, 2, 1, 0]);
        assert_eq!(scaler().get_scale_status(2, &samples), ScaleVote::ScaleIn);
    }

    #[test]
    #[traced_test]
    fn steady_backlog_votes_none() {
        let samples = work(2, &[10, 12, 10, 12, 10]);
        assert_eq!(scaler().get_scale_status(2, &samples), ScaleVote::None);
        assert!(logs_contain("remaining work is steady"));
    }

    #[test]
    fn only_last_five_samples_count() {
        // The older 0 would break the increasing streak if it were included.
        let samples = work(2, &[0, 10, 20, 30, 40, 50]);
        assert_eq!(scaler().get_scale_status(2, &samples), ScaleVote::ScaleOut);

        let samples = work(2, &[60, 10, 20, 30, 40, 50]);
        assert_eq!(scaler().get_scale_status(2, &samples), ScaleVote::ScaleOut);
    }

    #[test]
    fn votes_are_idempotent() {
        let samples = work(3, &[7, 3, 9, 3, 7]);
        let s = scaler();
        let first = s.get_scale_status(1, &samples);
        let second = s.get_scale_status(1, &samples);
        assert_eq!(first, second);
        assert_eq!(first, ScaleVote::ScaleOut);
    }
}
