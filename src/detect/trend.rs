//! Normalized-slope comparison between baseline and recent windows.

use crate::detect::window::Windows;
use crate::detect::{AnomalyDetection, AnomalyType, Severity};

pub const MIN_TREND_SAMPLES: usize = 10;
const TREND_DELTA_THRESHOLD: f64 = 0.1;
const HIGH_SEVERITY_DELTA: f64 = 0.2;
const CONFIDENCE: f64 = 0.8;

pub fn detect(metric: &str, windows: &Windows) -> Option<AnomalyDetection> {
    if windows.recent.len() < MIN_TREND_SAMPLES || windows.baseline.len() < MIN_TREND_SAMPLES {
        return None;
    }

    let baseline = windows.baseline_series();
    let recent = windows.recent_series();
    let delta = (recent.trend()? - baseline.trend()?).abs();
    if delta <= TREND_DELTA_THRESHOLD {
        return None;
    }

    let last = windows.recent.last()?;
    let severity = if delta > HIGH_SEVERITY_DELTA {
        Severity::High
    } else {
        Severity::Medium
    };

    Some(
        AnomalyDetection::new(metric, AnomalyType::TrendChange, last.timestamp)
            .with_values(baseline.last()?, last.value, delta)
            .with_severity(severity)
            .with_confidence(CONFIDENCE)
            .with_recommendations([
                format!("The growth rate of {} has shifted against its baseline", metric),
                "Re-check capacity plans that assumed the previous trend".to_string(),
            ]),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::MetricSample;
    use chrono::{Duration, TimeZone, Utc};

    fn series(offset_h: i64, values: impl IntoIterator<Item = f64>) -> Vec<MetricSample> {
        let t0 = Utc.with_ymd_and_hms(2024, 9, 1, 0, 0, 0).unwrap();
        values
            .into_iter()
            .enumerate()
            .map(|(i, v)| MetricSample::new(t0 + Duration::hours(offset_h + i as i64), v))
            .collect()
    }

    #[test]
    fn test_detects_acceleration() {
        // Baseline flat at 100; recent climbs 100 -> 400 over 10 samples.
        // Recent trend = 300 / (100 * 10) = 0.3, delta 0.3 -> high
        let windows = Windows {
            baseline: series(0, std::iter::repeat(100.0).take(20)),
            recent: series(24, (0..10).map(|i| 100.0 + i as f64 * 300.0 / 9.0)),
        };

        let a = detect("document_generation", &windows).unwrap();
        assert_eq!(a.anomaly_type, AnomalyType::TrendChange);
        assert_eq!(a.severity, Severity::High);
        assert!((a.deviation - 0.3).abs() < 1e-9);
        assert_eq!(a.expected_value, 100.0);
        assert!((a.actual_value - 400.0).abs() < 1e-9);
        assert_eq!(a.confidence, 0.8);
    }

    #[test]
    fn test_medium_band() {
        // Recent trend = 150 / (100 * 10) = 0.15
        let windows = Windows {
            baseline: series(0, std::iter::repeat(100.0).take(20)),
            recent: series(24, (0..10).map(|i| 100.0 + i as f64 * 150.0 / 9.0)),
        };
        assert_eq!(detect("ai_usage", &windows).unwrap().severity, Severity::Medium);
    }

    #[test]
    fn test_no_signal_cases() {
        let steady = Windows {
            baseline: series(0, std::iter::repeat(100.0).take(20)),
            recent: series(24, std::iter::repeat(100.0).take(10)),
        };
        assert!(detect("compute", &steady).is_none());

        let zero_start = Windows {
            baseline: series(0, (0..20).map(|i| i as f64)),
            recent: series(24, (0..10).map(|i| 50.0 * i as f64)),
        };
        assert!(detect("compute", &zero_start).is_none());

        let short = Windows {
            baseline: series(0, std::iter::repeat(100.0).take(20)),
            recent: series(24, (0..9).map(|i| 100.0 * (i + 1) as f64)),
        };
        assert!(detect("compute", &short).is_none());
    }
}
