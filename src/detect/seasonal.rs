//! Hour-of-day seasonal comparison between the baseline and recent windows.
//!
//! Each series is reduced to a seasonal index: per-bucket average divided by
//! the overall series mean, so 1.0 means "typical for this series". Buckets
//! are assigned by sample position (`index % period`), which lines up with the
//! hour of day for hourly series that start at midnight.
//!
//! The sample reported for a flagged bucket is the latest recent sample whose
//! wall-clock hour is `bucket`. For ranges that do not start at midnight that
//! is a different hour from the one the bucket averaged.

use chrono::Timelike;

use crate::detect::stats::TimeSeries;
use crate::detect::window::Windows;
use crate::detect::{AnomalyDetection, AnomalyType, Severity};

pub const DEFAULT_PERIOD: usize = 24;
const INDEX_DELTA_THRESHOLD: f64 = 0.5;
const CONFIDENCE: f64 = 0.7;

/// Seasonal index per bucket. A bucket with no samples is `None`.
///
/// Returns `None` altogether when the series mean is zero, since no ratio can
/// be formed against it.
pub fn seasonal_indices(values: &[f64], period: usize) -> Option<Vec<Option<f64>>> {
    if values.is_empty() || period == 0 {
        return None;
    }
    let mean = TimeSeries::new(values.to_vec()).mean();
    if mean == 0.0 || !mean.is_finite() {
        return None;
    }

    let mut sums = vec![0.0; period];
    let mut counts = vec![0usize; period];
    for (i, v) in values.iter().enumerate() {
        sums[i % period] += v;
        counts[i % period] += 1;
    }

    Some(
        sums.iter()
            .zip(&counts)
            .map(|(&sum, &count)| (count > 0).then(|| sum / count as f64 / mean))
            .collect(),
    )
}

pub fn detect(metric: &str, windows: &Windows, period: usize) -> Vec<AnomalyDetection> {
    let baseline = windows.baseline_series();
    let Some(baseline_idx) = seasonal_indices(baseline.values(), period) else {
        return Vec::new();
    };
    let Some(recent_idx) = seasonal_indices(windows.recent_series().values(), period) else {
        return Vec::new();
    };
    let baseline_mean = baseline.mean();

    let mut anomalies = Vec::new();
    for bucket in 0..period {
        let (Some(expected_idx), Some(observed_idx)) = (baseline_idx[bucket], recent_idx[bucket]) else {
            continue;
        };
        let delta = (observed_idx - expected_idx).abs();
        if delta <= INDEX_DELTA_THRESHOLD {
            continue;
        }

        let Some(sample) = windows
            .recent
            .iter()
            .rev()
            .find(|s| s.timestamp.hour() as usize % period == bucket)
        else {
            continue;
        };

        anomalies.push(
            AnomalyDetection::new(metric, AnomalyType::SeasonalDeviation, sample.timestamp)
                .with_values(baseline_mean * expected_idx, sample.value, delta)
                .with_severity(Severity::Medium)
                .with_confidence(CONFIDENCE)
                .with_recommendations([
                    format!("Hour {:02}:00 of {} no longer follows its usual daily pattern", bucket, metric),
                    "Check for rescheduled batch jobs or shifted user traffic".to_string(),
                ]),
        );
    }
    anomalies
}
