//! Early warnings: projected threshold breaches before they happen.

pub mod checks;
pub mod projection;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::detect::store::Retained;
use crate::detect::Severity;

pub use self::checks::WarningCheck;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningType {
    ThresholdBreach,
    TrendAlert,
    CapacityWarning,
    CostAlert,
    PerformanceDegradation,
}

impl std::fmt::Display for WarningType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WarningType::ThresholdBreach => write!(f, "threshold_breach"),
            WarningType::TrendAlert => write!(f, "trend_alert"),
            WarningType::CapacityWarning => write!(f, "capacity_warning"),
            WarningType::CostAlert => write!(f, "cost_alert"),
            WarningType::PerformanceDegradation => write!(f, "performance_degradation"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningStatus {
    Active,
    Acknowledged,
    Resolved,
    Dismissed,
}

/// A recommended response to a warning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarningAction {
    pub action: String,
    pub priority: Severity,
    pub timeframe: String,
    pub impact: String,
}

impl WarningAction {
    pub fn new(action: &str, priority: Severity, timeframe: &str, impact: &str) -> Self {
        Self {
            action: action.to_string(),
            priority,
            timeframe: timeframe.to_string(),
            impact: impact.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EarlyWarning {
    pub id: String,
    #[serde(rename = "type")]
    pub warning_type: WarningType,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    pub metric: String,
    pub current_value: f64,
    pub threshold: f64,
    pub projected_value: f64,
    /// Minutes; `f64::INFINITY` (serialized as `null`) when not approaching.
    #[serde(with = "minutes")]
    pub time_to_breach: f64,
    pub confidence: f64,
    pub actions: Vec<WarningAction>,
    pub status: WarningStatus,
    pub created_at: DateTime<Utc>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub acknowledged_by: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub dismissed_at: Option<DateTime<Utc>>,
}

impl EarlyWarning {
    pub fn is_active(&self) -> bool {
        self.status == WarningStatus::Active
    }

    pub fn acknowledge(&mut self, user_id: &str) -> bool {
        if self.status != WarningStatus::Active {
            return false;
        }
        self.status = WarningStatus::Acknowledged;
        self.acknowledged_by = Some(user_id.to_string());
        self.acknowledged_at = Some(Utc::now());
        true
    }

    pub fn resolve(&mut self) -> bool {
        if !matches!(self.status, WarningStatus::Active | WarningStatus::Acknowledged) {
            return false;
        }
        self.status = WarningStatus::Resolved;
        self.resolved_at = Some(Utc::now());
        true
    }

    pub fn dismiss(&mut self) -> bool {
        if !matches!(self.status, WarningStatus::Active | WarningStatus::Acknowledged) {
            return false;
        }
        self.status = WarningStatus::Dismissed;
        self.dismissed_at = Some(Utc::now());
        true
    }
}

impl Retained for EarlyWarning {
    fn id(&self) -> &str {
        &self.id
    }

    /// One warning per check, metric and hour.
    fn dedup_key(&self) -> String {
        format!(
            "{}:{}:{}",
            self.metric,
            self.warning_type,
            self.created_at.timestamp().div_euclid(3600)
        )
    }

    fn retained_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Non-finite minutes travel as `null`.
mod minutes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_some(value)
        } else {
            serializer.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::INFINITY))
    }
}
