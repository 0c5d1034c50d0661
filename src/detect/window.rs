//! Baseline & recent window split.
//!
//! The recent window is the requested range; the baseline is the interval
//! of identical length immediately before it. Both come from a single gateway
//! fetch covering `[start - span, end)`.

use crate::detect::stats::TimeSeries;
use crate::detect::DetectError;
use crate::gateway::{MetricSample, TimeRange};

pub const MIN_BASELINE_SAMPLES: usize = 20;
pub const MIN_RECENT_SAMPLES: usize = 10;

/// Baseline and recent samples for one metric, both ordered by timestamp.
#[derive(Debug, Clone)]
pub struct Windows {
    pub recent: Vec<MetricSample>,
    pub baseline: Vec<MetricSample>,
}

impl Windows {
    pub fn recent_series(&self) -> TimeSeries {
        TimeSeries::from_samples(&self.recent)
    }

    pub fn baseline_series(&self) -> TimeSeries {
        TimeSeries::from_samples(&self.baseline)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WindowPolicy {
    pub min_baseline: usize,
    pub min_recent: usize,
}

impl Default for WindowPolicy {
    fn default() -> Self {
        Self {
            min_baseline: MIN_BASELINE_SAMPLES,
            min_recent: MIN_RECENT_SAMPLES,
        }
    }
}

impl WindowPolicy {
    /// The range the gateway must be asked for to fill both windows.
    pub fn fetch_range(range: TimeRange) -> Result<TimeRange, DetectError> {
        Ok(TimeRange::new(baseline_range(range)?.start, range.end))
    }

    /// Partition `samples` (anything inside [`Self::fetch_range`]) into the
    /// two windows and enforce minimum counts.
    pub fn split(&self, range: TimeRange, mut samples: Vec<MetricSample>) -> Result<Windows, DetectError> {
        samples.sort_by_key(|s| s.timestamp);

        let baseline_range = baseline_range(range)?;
        let mut baseline = Vec::new();
        let mut recent = Vec::new();
        for sample in samples {
            if range.contains(sample.timestamp) {
                recent.push(sample);
            } else if baseline_range.contains(sample.timestamp) {
                baseline.push(sample);
            }
        }

        if baseline.len() < self.min_baseline {
            return Err(DetectError::InsufficientBaseline {
                needed: self.min_baseline,
                have: baseline.len(),
            });
        }
        if recent.len() < self.min_recent {
            return Err(DetectError::InsufficientRecent {
                needed: self.min_recent,
                have: recent.len(),
            });
        }

        Ok(Windows { recent, baseline })
    }
}

fn baseline_range(range: TimeRange) -> Result<TimeRange, DetectError> {
    range
        .preceding()
        .ok_or(DetectError::RangeOutOfBounds { start: range.start })
}
