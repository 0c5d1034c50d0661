//! Pluggable evaluation of custom rules.

use crate::detect::window::Windows;
use crate::detect::{AnomalyDetection, AnomalyType, Severity};
use crate::rules::DetectionRule;

/// Runs one rule against a metric's windows.
///
/// The engine picks the strategy by the rule's [`crate::rules::Algorithm`].
/// Rules whose algorithm has no registered strategy are credited with
/// whatever the fixed detectors find on their metric.
pub trait RuleStrategy: Send + Sync {
    fn evaluate(&self, rule: &DetectionRule, windows: &Windows) -> Vec<AnomalyDetection>;
}

/// Flags recent samples above `parameters.threshold`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThresholdStrategy;

const DEFAULT_CONFIDENCE: f64 = 0.9;

impl RuleStrategy for ThresholdStrategy {
    fn evaluate(&self, rule: &DetectionRule, windows: &Windows) -> Vec<AnomalyDetection> {
        let Some(threshold) = rule.parameters.threshold else {
            return Vec::new();
        };
        let confidence = rule.parameters.confidence.unwrap_or(DEFAULT_CONFIDENCE);

        windows
            .recent
            .iter()
            .filter(|s| s.value > threshold)
            .map(|s| {
                let excess = if threshold != 0.0 {
                    (s.value - threshold) / threshold.abs()
                } else {
                    s.value - threshold
                };
                let severity = if excess > 0.5 {
                    Severity::Critical
                } else if excess > 0.2 {
                    Severity::High
                } else {
                    Severity::Medium
                };
                AnomalyDetection::new(&rule.metric, AnomalyType::Spike, s.timestamp)
                    .with_values(threshold, s.value, excess)
                    .with_severity(severity)
                    .with_confidence(confidence)
                    .with_recommendations([format!(
                        "Value exceeded the limit of rule '{}' ({})",
                        rule.name, threshold
                    )])
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::MetricSample;
    use crate::rules::{Algorithm, RuleParameters};
    use chrono::{Duration, TimeZone, Utc};

    #[test]
    fn test_threshold_strategy_flags_excess() {
        let t0 = Utc.with_ymd_and_hms(2024, 11, 1, 0, 0, 0).unwrap();
        let at = |h: i64, v: f64| MetricSample::new(t0 + Duration::hours(h), v);
        let windows = Windows {
            baseline: vec![],
            recent: vec![at(0, 0.5), at(1, 0.95), at(2, 1.5)],
        };
        let rule = DetectionRule {
            id: "r1".to_string(),
            name: "cpu ceiling".to_string(),
            metric: "compute".to_string(),
            algorithm: Algorithm::Threshold,
            parameters: RuleParameters {
                threshold: Some(0.9),
                ..Default::default()
            },
            enabled: true,
            trigger_count: 0,
            false_positive_count: 0,
            last_triggered: None,
            created_at: t0,
        };

        let found = ThresholdStrategy.evaluate(&rule, &windows);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].severity, Severity::Medium);
        assert_eq!(found[1].severity, Severity::Critical);
        assert!(found.iter().all(|a| a.metric == "compute" && a.confidence == 0.9));
    }
}
