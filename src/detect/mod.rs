//! Anomaly detection: windowing, the three fixed detectors, and the
//! deduplicating bounded store.

pub mod seasonal;
pub mod statistical;
pub mod stats;
pub mod store;
pub mod trend;
pub mod window;

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::gateway::GatewayError;

#[derive(Debug, Error)]
pub enum DetectError {
    #[error("insufficient baseline data: need {needed} samples, have {have}")]
    InsufficientBaseline { needed: usize, have: usize },

    #[error("insufficient recent data: need {needed} samples, have {have}")]
    InsufficientRecent { needed: usize, have: usize },

    #[error("gateway failed for metric '{metric}': {source}")]
    Gateway {
        metric: String,
        #[source]
        source: GatewayError,
    },

    #[error("gateway timed out for metric '{metric}' after {timeout:?}")]
    Timeout { metric: String, timeout: Duration },

    #[error("time range starting at {start} has no representable baseline window")]
    RangeOutOfBounds { start: DateTime<Utc> },
}

impl DetectError {
    /// Too few samples is an expected condition, not a fault.
    pub fn is_insufficient_data(&self) -> bool {
        matches!(
            self,
            DetectError::InsufficientBaseline { .. } | DetectError::InsufficientRecent { .. }
        )
    }
}

/// Severity levels shared by anomalies, warnings and warning actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyType {
    Spike,
    Drop,
    TrendChange,
    PatternBreak,
    SeasonalDeviation,
    Outlier,
}

impl std::fmt::Display for AnomalyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnomalyType::Spike => write!(f, "spike"),
            AnomalyType::Drop => write!(f, "drop"),
            AnomalyType::TrendChange => write!(f, "trend_change"),
            AnomalyType::PatternBreak => write!(f, "pattern_break"),
            AnomalyType::SeasonalDeviation => write!(f, "seasonal_deviation"),
            AnomalyType::Outlier => write!(f, "outlier"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyStatus {
    New,
    Investigating,
    Resolved,
    FalsePositive,
}

impl AnomalyStatus {
    pub fn is_active(self) -> bool {
        matches!(self, AnomalyStatus::New | AnomalyStatus::Investigating)
    }
}

impl std::fmt::Display for AnomalyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnomalyStatus::New => write!(f, "new"),
            AnomalyStatus::Investigating => write!(f, "investigating"),
            AnomalyStatus::Resolved => write!(f, "resolved"),
            AnomalyStatus::FalsePositive => write!(f, "false_positive"),
        }
    }
}

/// How an operator closed out an anomaly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Resolved,
    FalsePositive,
}

/// Optional ownership tags carried along with an anomaly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnomalyContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
}

/// One detected deviation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyDetection {
    pub id: String,
    pub metric: String,
    pub detected_at: DateTime<Utc>,
    pub anomaly_type: AnomalyType,
    pub severity: Severity,
    pub expected_value: f64,
    pub actual_value: f64,
    /// Dimensionless, never negative.
    pub deviation: f64,
    /// Always within `[0, 1]`.
    pub confidence: f64,
    pub context: AnomalyContext,
    pub recommendations: Vec<String>,
    pub status: AnomalyStatus,
    /// Rules this anomaly was attributed to when it was stored.
    pub rule_ids: Vec<String>,
    pub assigned_to: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolution: Option<String>,
}

impl AnomalyDetection {
    pub fn new(metric: &str, anomaly_type: AnomalyType, detected_at: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            metric: metric.to_string(),
            detected_at,
            anomaly_type,
            severity: Severity::Low,
            expected_value: 0.0,
            actual_value: 0.0,
            deviation: 0.0,
            confidence: 0.0,
            context: AnomalyContext::default(),
            recommendations: Vec::new(),
            status: AnomalyStatus::New,
            rule_ids: Vec::new(),
            assigned_to: None,
            resolved_at: None,
            resolution: None,
        }
    }

    pub fn with_values(mut self, expected: f64, actual: f64, deviation: f64) -> Self {
        self.expected_value = expected;
        self.actual_value = actual;
        self.deviation = deviation.abs();
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        self
    }

    pub fn with_recommendations<I, S>(mut self, recommendations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.recommendations = recommendations.into_iter().map(Into::into).collect();
        self
    }

    /// `metric:type:hour` -- anomalies sharing a key are one occurrence.
    pub fn dedup_key(&self) -> String {
        format!(
            "{}:{}:{}",
            self.metric,
            self.anomaly_type,
            self.detected_at.timestamp().div_euclid(3600)
        )
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// new -> investigating. Any other starting status is rejected.
    pub fn acknowledge(&mut self, user_id: &str) -> bool {
        if self.status != AnomalyStatus::New {
            return false;
        }
        self.status = AnomalyStatus::Investigating;
        self.assigned_to = Some(user_id.to_string());
        true
    }

    /// Close an open anomaly. Already closed anomalies are left untouched.
    pub fn resolve(&mut self, resolution: &str, outcome: Outcome) -> bool {
        if !self.is_active() {
            return false;
        }
        self.status = match outcome {
            Outcome::Resolved => AnomalyStatus::Resolved,
            Outcome::FalsePositive => AnomalyStatus::FalsePositive,
        };
        self.resolution = Some(resolution.to_string());
        self.resolved_at = Some(Utc::now());
        true
    }
}
