//! Rolling window of metrics samples owned by the scaling loop.

use std::time::Duration;

use feedscale_core::MetricsSample;

/// Time-ordered samples, oldest first, bounded by count and age.
#[derive(Debug, Clone)]
pub struct SampleWindow {
    samples: Vec<MetricsSample>,
    max_samples: usize,
    /// Maximum age relative to the newest sample.
    max_age: Duration,
}

impl SampleWindow {
    pub fn new(max_samples: usize, max_age: Duration) -> Self {
        Self {
            samples: Vec::new(),
            max_samples: max_samples.max(1),
            max_age,
        }
    }

    /// Insert a sample in timestamp order, then evict by age and count.
    pub fn push(&mut self, sample: MetricsSample) {
        let idx = self
            .samples
            .partition_point(|s| s.timestamp <= sample.timestamp);
        self.samples.insert(idx, sample);

        if let Some(newest) = self.samples.last().map(|s| s.timestamp) {
            let max_age = self.max_age;
            self.samples.retain(|s| {
                newest
                    .duration_since(s.timestamp)
                    .map(|age| age <= max_age)
                    .unwrap_or(true)
            });
        }

        let excess = self.samples.len().saturating_sub(self.max_samples);
        self.samples.drain(..excess);
    }

    pub fn as_slice(&self) -> &[MetricsSample] {
        &self.samples
    }

    pub fn latest(&self) -> Option<&MetricsSample> {
        self.samples.last()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}
