//! 3-sigma outlier detection against the baseline window.

use crate::detect::stats::{normalized_trend, TimeSeries};
use crate::detect::window::Windows;
use crate::detect::{AnomalyDetection, AnomalyType, Severity};

pub const SIGMA_THRESHOLD: f64 = 3.0;
const SPIKE_FACTOR: f64 = 2.0;
const DROP_FACTOR: f64 = 0.5;
const LOCAL_TREND_THRESHOLD: f64 = 0.1;

/// Flag every recent sample more than [`SIGMA_THRESHOLD`] standard deviations
/// from the baseline mean.
pub fn detect(metric: &str, windows: &Windows) -> Vec<AnomalyDetection> {
    let baseline = windows.baseline_series();
    let mean = baseline.mean();
    let recent = windows.recent_series();

    let mut anomalies = Vec::new();
    for (i, sample) in windows.recent.iter().enumerate() {
        if !sample.value.is_finite() {
            continue;
        }
        // Flat baseline: nothing can be measured in sigmas
        let Some(deviation) = baseline.sigma_distance(sample.value) else {
            return anomalies;
        };
        if !deviation.is_finite() || deviation <= SIGMA_THRESHOLD {
            continue;
        }

        let anomaly_type = classify(sample.value, mean, &recent, i);
        anomalies.push(
            AnomalyDetection::new(metric, anomaly_type, sample.timestamp)
                .with_values(mean, sample.value, deviation)
                .with_severity(severity_for(deviation))
                .with_confidence(deviation / 4.0)
                .with_recommendations(recommendations(anomaly_type, metric)),
        );
    }
    anomalies
}

/// Spike and drop take priority over the local trend check.
pub fn classify(value: f64, baseline_mean: f64, recent: &TimeSeries, index: usize) -> AnomalyType {
    if value > baseline_mean * SPIKE_FACTOR {
        return AnomalyType::Spike;
    }
    if value < baseline_mean * DROP_FACTOR {
        return AnomalyType::Drop;
    }
    match local_trend(recent.values(), index) {
        Some(t) if t.abs() > LOCAL_TREND_THRESHOLD => AnomalyType::TrendChange,
        _ => AnomalyType::Outlier,
    }
}

/// Normalized trend over the (up to) three points centred on `index`.
fn local_trend(values: &[f64], index: usize) -> Option<f64> {
    let lo = index.saturating_sub(1);
    let hi = (index + 2).min(values.len());
    normalized_trend(values.get(lo..hi)?)
}

pub fn severity_for(deviation: f64) -> Severity {
    if deviation > 4.0 {
        Severity::Critical
    } else if deviation > 3.0 {
        Severity::High
    } else if deviation > 2.5 {
        Severity::Medium
    } else {
        Severity::Low
    }
}

fn recommendations(anomaly_type: AnomalyType, metric: &str) -> Vec<String> {
    match anomaly_type {
        AnomalyType::Spike => vec![
            format!("Check for unusual load or runaway jobs driving {}", metric),
            "Review recent deployments and configuration changes".to_string(),
            "Confirm autoscaling limits can absorb the spike".to_string(),
        ],
        AnomalyType::Drop => vec![
            format!("Verify that producers of {} are still reporting", metric),
            "Check for outages or failed upstream dependencies".to_string(),
        ],
        AnomalyType::TrendChange => vec![
            format!("Investigate what changed the direction of {}", metric),
            "Compare with recent traffic and usage patterns".to_string(),
        ],
        _ => vec![
            format!("Inspect the raw samples of {} around the flagged time", metric),
            "Mark as false positive if the value is expected".to_string(),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::MetricSample;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap()
    }

    /// Mean 100, population stddev 10.
    fn baseline() -> Vec<MetricSample> {
        (0..20)
            .map(|h| {
                let v = if h % 2 == 0 { 90.0 } else { 110.0 };
                MetricSample::new(start() + Duration::hours(h), v)
            })
            .collect()
    }

    fn recent(values: &[f64]) -> Vec<MetricSample> {
        values
            .iter()
            .enumerate()
            .map(|(h, &v)| MetricSample::new(start() + Duration::hours(24 + h as i64), v))
            .collect()
    }

    fn windows(values: &[f64]) -> Windows {
        Windows {
            baseline: baseline(),
            recent: recent(values),
        }
    }

    #[test]
    fn test_three_sigma_boundary() {
        let mut values = vec![100.0; 10];
        values[4] = 131.0;
        values[7] = 129.0;

        let found = detect("compute", &windows(&values));
        assert_eq!(found.len(), 1);
        let a = &found[0];
        assert_eq!(a.actual_value, 131.0);
        assert!((a.deviation - 3.1).abs() < 1e-9);
        assert_eq!(a.anomaly_type, AnomalyType::Outlier);
        assert_eq!(a.severity, Severity::High);
        assert!((a.confidence - 0.775).abs() < 1e-9);
        assert_eq!(a.expected_value, 100.0);
    }

    #[test]
    fn test_spike_beats_local_trend() {
        let mut values = vec![100.0; 10];
        values[3] = 100.0;
        values[4] = 250.0;
        values[5] = 400.0;

        let found = detect("compute", &windows(&values));
        let at_250 = found.iter().find(|a| a.actual_value == 250.0).unwrap();
        assert_eq!(at_250.anomaly_type, AnomalyType::Spike);
        assert_eq!(at_250.severity, Severity::Critical);
        assert_eq!(at_250.confidence, 1.0);
    }

    #[test]
    fn test_drop_and_trend_change_classification() {
        let mut values = vec![100.0; 10];
        values[2] = 40.0;
        values[6] = 100.0;
        values[7] = 140.0;
        values[8] = 160.0;

        let found = detect("storage", &windows(&values));
        let drop = found.iter().find(|a| a.actual_value == 40.0).unwrap();
        assert_eq!(drop.anomaly_type, AnomalyType::Drop);

        // Local trend around 140: (160 - 100) / (100 * 3) = 0.2
        let trend = found.iter().find(|a| a.actual_value == 140.0).unwrap();
        assert_eq!(trend.anomaly_type, AnomalyType::TrendChange);
    }

    #[test]
    fn test_flat_baseline_yields_nothing() {
        let w = Windows {
            baseline: (0..20)
                .map(|h| MetricSample::new(start() + Duration::hours(h), 5.0))
                .collect(),
            recent: recent(&[5.0, 500.0, 5.0, 5.0, 5.0, 5.0, 5.0, 5.0, 5.0, 5.0]),
        };
        assert!(detect("compute", &w).is_empty());
    }

    #[test]
    fn test_non_finite_values_are_never_flagged() {
        let mut values = vec![100.0; 10];
        values[1] = f64::NAN;
        values[2] = f64::INFINITY;
        values[5] = 250.0;

        let found = detect("compute", &windows(&values));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].actual_value, 250.0);
        assert!(found.iter().all(|a| a.deviation.is_finite()));

        // A poisoned baseline measures nothing
        let mut w = windows(&values);
        w.baseline[3].value = f64::NAN;
        assert!(detect("compute", &w).is_empty());
    }

    #[test]
    fn test_severity_scale() {
        assert_eq!(severity_for(4.5), Severity::Critical);
        assert_eq!(severity_for(3.5), Severity::High);
        assert_eq!(severity_for(2.7), Severity::Medium);
        assert_eq!(severity_for(1.0), Severity::Low);
    }

    #[test]
    fn test_local_trend_clips_at_edges() {
        assert_eq!(local_trend(&[10.0, 20.0], 0), Some(0.5));
        assert_eq!(local_trend(&[10.0, 20.0, 30.0], 2), Some(0.25));
        assert_eq!(local_trend(&[10.0], 0), None);
    }
}
