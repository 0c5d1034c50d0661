//! Detection rule registry.
//!
//! Rules are operator-managed metadata: which metric they watch, which
//! algorithm they name, how often they fired and how often an operator later
//! called the result a false positive. Rules whose algorithm has a registered
//! [`strategy::RuleStrategy`] are also evaluated during detection passes.

pub mod strategy;

use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum RuleError {
    #[error("rule name must not be empty")]
    EmptyName,

    #[error("rule metric must not be empty")]
    EmptyMetric,

    #[error("unknown algorithm '{0}', expected one of: statistical, machine_learning, threshold, pattern_based")]
    UnknownAlgorithm(String),

    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("rule '{0}' not found")]
    NotFound(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    Statistical,
    MachineLearning,
    Threshold,
    PatternBased,
}

impl FromStr for Algorithm {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "statistical" => Ok(Algorithm::Statistical),
            "machine_learning" => Ok(Algorithm::MachineLearning),
            "threshold" => Ok(Algorithm::Threshold),
            "pattern_based" => Ok(Algorithm::PatternBased),
            other => Err(RuleError::UnknownAlgorithm(other.to_string())),
        }
    }
}

impl std::fmt::Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Algorithm::Statistical => write!(f, "statistical"),
            Algorithm::MachineLearning => write!(f, "machine_learning"),
            Algorithm::Threshold => write!(f, "threshold"),
            Algorithm::PatternBased => write!(f, "pattern_based"),
        }
    }
}

/// Algorithm-dependent knobs; all optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleParameters {
    pub sensitivity: Option<f64>,
    pub window_size: Option<usize>,
    pub threshold: Option<f64>,
    pub confidence: Option<f64>,
}

/// Input to [`RuleRegistry::create`]. `algorithm` is free text so that bad
/// input can be rejected with a proper validation error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSpec {
    pub name: String,
    pub metric: String,
    pub algorithm: String,
    #[serde(default)]
    pub parameters: RuleParameters,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRule {
    pub id: String,
    pub name: String,
    pub metric: String,
    pub algorithm: Algorithm,
    pub parameters: RuleParameters,
    pub enabled: bool,
    /// Only ever increases.
    pub trigger_count: u64,
    pub false_positive_count: u64,
    pub last_triggered: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RulePerformance {
    pub trigger_count: u64,
    pub false_positive_rate: f64,
    pub last_triggered: Option<DateTime<Utc>>,
}

impl DetectionRule {
    pub fn performance(&self) -> RulePerformance {
        RulePerformance {
            trigger_count: self.trigger_count,
            false_positive_rate: self.false_positive_count as f64 / self.trigger_count.max(1) as f64,
            last_triggered: self.last_triggered,
        }
    }
}

fn validate(spec: &RuleSpec) -> Result<Algorithm, RuleError> {
    if spec.name.trim().is_empty() {
        return Err(RuleError::EmptyName);
    }
    if spec.metric.trim().is_empty() {
        return Err(RuleError::EmptyMetric);
    }
    let algorithm = spec.algorithm.parse::<Algorithm>()?;

    let p = &spec.parameters;
    for (name, value) in [("sensitivity", p.sensitivity), ("confidence", p.confidence)] {
        if let Some(v) = value {
            if !(0.0..=1.0).contains(&v) {
                return Err(RuleError::InvalidParameter {
                    name,
                    reason: format!("{} is outside [0, 1]", v),
                });
            }
        }
    }
    if p.window_size == Some(0) {
        return Err(RuleError::InvalidParameter {
            name: "window_size",
            reason: "must be at least 1".to_string(),
        });
    }
    match p.threshold {
        Some(t) if !t.is_finite() => {
            return Err(RuleError::InvalidParameter {
                name: "threshold",
                reason: "must be a finite number".to_string(),
            });
        }
        None if algorithm == Algorithm::Threshold => {
            return Err(RuleError::InvalidParameter {
                name: "threshold",
                reason: "required by the threshold algorithm".to_string(),
            });
        }
        _ => {}
    }

    Ok(algorithm)
}

#[derive(Debug, Default)]
pub struct RuleRegistry {
    rules: HashMap<String, DetectionRule>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, spec: RuleSpec) -> Result<String, RuleError> {
        let algorithm = validate(&spec)?;
        let id = uuid::Uuid::new_v4().to_string();
        let rule = DetectionRule {
            id: id.clone(),
            name: spec.name.trim().to_string(),
            metric: spec.metric.trim().to_string(),
            algorithm,
            parameters: spec.parameters,
            enabled: spec.enabled,
            trigger_count: 0,
            false_positive_count: 0,
            last_triggered: None,
            created_at: Utc::now(),
        };
        tracing::info!(rule_id = %id, name = %rule.name, metric = %rule.metric, %algorithm, "Detection rule created");
        self.rules.insert(id.clone(), rule);
        Ok(id)
    }

    pub fn get(&self, id: &str) -> Option<&DetectionRule> {
        self.rules.get(id)
    }

    /// All rules, oldest first.
    pub fn list(&self) -> Vec<DetectionRule> {
        let mut rules: Vec<_> = self.rules.values().cloned().collect();
        rules.sort_by_key(|r| r.created_at);
        rules
    }

    pub fn set_enabled(&mut self, id: &str, enabled: bool) -> Result<(), RuleError> {
        let rule = self
            .rules
            .get_mut(id)
            .ok_or_else(|| RuleError::NotFound(id.to_string()))?;
        rule.enabled = enabled;
        Ok(())
    }

    /// Enabled rules watching `metric`.
    pub fn enabled_for(&self, metric: &str) -> Vec<DetectionRule> {
        self.rules
            .values()
            .filter(|r| r.enabled && r.metric == metric)
            .cloned()
            .collect()
    }

    pub fn record_trigger(&mut self, id: &str, at: DateTime<Utc>) {
        if let Some(rule) = self.rules.get_mut(id) {
            rule.trigger_count += 1;
            rule.last_triggered = Some(at);
        }
    }

    pub fn record_false_positive(&mut self, id: &str) {
        if let Some(rule) = self.rules.get_mut(id) {
            rule.false_positive_count += 1;
        }
    }

    pub fn performance(&self, id: &str) -> Option<RulePerformance> {
        self.rules.get(id).map(DetectionRule::performance)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(metric: &str, algorithm: &str) -> RuleSpec {
        RuleSpec {
            name: "cpu watch".to_string(),
            metric: metric.to_string(),
            algorithm: algorithm.to_string(),
            parameters: RuleParameters::default(),
            enabled: true,
        }
    }

    #[test]
    fn test_create_validates_metric_and_algorithm() {
        let mut registry = RuleRegistry::new();
        assert_eq!(registry.create(spec("", "statistical")), Err(RuleError::EmptyMetric));
        assert_eq!(
            registry.create(spec("compute", "deep_magic")),
            Err(RuleError::UnknownAlgorithm("deep_magic".to_string()))
        );
        assert!(registry.is_empty());

        for alg in ["statistical", "machine_learning", "pattern_based"] {
            assert!(registry.create(spec("compute", alg)).is_ok());
        }
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_parameter_validation() {
        let mut registry = RuleRegistry::new();

        let mut s = spec("compute", "statistical");
        s.parameters.confidence = Some(1.5);
        assert!(matches!(
            registry.create(s),
            Err(RuleError::InvalidParameter { name: "confidence", .. })
        ));

        // threshold algorithm needs a threshold
        assert!(matches!(
            registry.create(spec("compute", "threshold")),
            Err(RuleError::InvalidParameter { name: "threshold", .. })
        ));

        let mut s = spec("compute", "threshold");
        s.parameters.threshold = Some(0.9);
        assert!(registry.create(s).is_ok());
    }

    #[test]
    fn test_false_positive_rate() {
        let mut registry = RuleRegistry::new();
        let id = registry.create(spec("compute", "statistical")).unwrap();

        for _ in 0..10 {
            registry.record_trigger(&id, Utc::now());
        }
        for _ in 0..3 {
            registry.record_false_positive(&id);
        }

        let perf = registry.performance(&id).unwrap();
        assert_eq!(perf.trigger_count, 10);
        assert!((perf.false_positive_rate - 0.3).abs() < 1e-12);
        assert!(perf.last_triggered.is_some());
        assert!(registry.performance("missing").is_none());
    }

    #[test]
    fn test_rate_with_no_triggers_uses_one_as_denominator() {
        let mut registry = RuleRegistry::new();
        let id = registry.create(spec("compute", "statistical")).unwrap();
        registry.record_false_positive(&id);
        assert_eq!(registry.performance(&id).unwrap().false_positive_rate, 1.0);
    }

    #[test]
    fn test_enable_toggle_filters_rules() {
        let mut registry = RuleRegistry::new();
        let id = registry.create(spec("compute", "statistical")).unwrap();
        registry.create(spec("storage", "statistical")).unwrap();

        assert_eq!(registry.enabled_for("compute").len(), 1);
        registry.set_enabled(&id, false).unwrap();
        assert!(registry.enabled_for("compute").is_empty());
        assert_eq!(
            registry.set_enabled("nope", true),
            Err(RuleError::NotFound("nope".to_string()))
        );
    }

    #[test]
    fn test_spec_from_json_defaults_enabled() {
        let s: RuleSpec = serde_json::from_str(
            r#"{"name": "n", "metric": "ai_tokens", "algorithm": "statistical"}"#,
        )
        .unwrap();
        assert!(s.enabled);
        assert_eq!(s.parameters, RuleParameters::default());
    }
}
