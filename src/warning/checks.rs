//! The four early-warning checks.
//!
//! Each check looks at one metric's recent samples, projects the value over a
//! check-specific horizon and decides whether the trajectory deserves a
//! warning. Checks never share state and are run independently.

use chrono::Utc;

use super::projection::Projection;
use super::{EarlyWarning, WarningAction, WarningStatus, WarningType};
use crate::config::WarningConfig;
use crate::detect::Severity;
use crate::gateway::MetricSample;

/// Proximity factor: threshold checks wake up at 90% of the threshold.
const THRESHOLD_PROXIMITY: f64 = 0.9;
const THRESHOLD_HORIZON_MIN: f64 = 60.0;
const THRESHOLD_MAX_TTB_MIN: f64 = 120.0;
const THRESHOLD_CRITICAL_TTB_MIN: f64 = 30.0;

const TREND_GROWTH: f64 = 0.2;
const TREND_CRITICAL_GROWTH: f64 = 0.5;
const DAY_MIN: f64 = 1440.0;

const CAPACITY_UTILIZATION: f64 = 0.8;
const CAPACITY_CRITICAL_UTILIZATION: f64 = 0.9;
const CAPACITY_HORIZON_MIN: f64 = 60.0;

const COST_BUDGET_FRACTION: f64 = 0.8;
const COST_CRITICAL_FRACTION: f64 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WarningCheck {
    ThresholdBreach,
    TrendAlert,
    CapacityWarning,
    CostAlert,
}

impl WarningCheck {
    pub const ALL: [WarningCheck; 4] = [
        WarningCheck::ThresholdBreach,
        WarningCheck::TrendAlert,
        WarningCheck::CapacityWarning,
        WarningCheck::CostAlert,
    ];

    pub fn name(self) -> &'static str {
        match self {
            WarningCheck::ThresholdBreach => "threshold_breach",
            WarningCheck::TrendAlert => "trend_alert",
            WarningCheck::CapacityWarning => "capacity_warning",
            WarningCheck::CostAlert => "cost_alert",
        }
    }

    /// Metrics this check inspects.
    pub fn metrics(self, cfg: &WarningConfig) -> Vec<String> {
        let fixed: &[&str] = match self {
            WarningCheck::ThresholdBreach => {
                return cfg.thresholds.keys().cloned().collect();
            }
            WarningCheck::TrendAlert => &["document_generation", "ai_usage", "user_activity", "cost_analysis"],
            WarningCheck::CapacityWarning => &["compute", "storage", "bandwidth"],
            WarningCheck::CostAlert => &["cost_analysis"],
        };
        fixed.iter().map(|m| m.to_string()).collect()
    }

    /// Evaluate one metric. `None` means "nothing to warn about", which
    /// includes too few samples and a degenerate trend.
    pub fn evaluate(self, metric: &str, samples: &[MetricSample], cfg: &WarningConfig) -> Option<EarlyWarning> {
        if samples.len() < cfg.min_samples.max(2) {
            return None;
        }

        let (projection, threshold, severity) = match self {
            WarningCheck::ThresholdBreach => {
                let threshold = *cfg.thresholds.get(metric)?;
                let p = Projection::from_samples(samples, THRESHOLD_HORIZON_MIN)?;
                if p.current <= threshold * THRESHOLD_PROXIMITY {
                    return None;
                }
                let ttb = p.time_to_breach(threshold);
                if ttb >= THRESHOLD_MAX_TTB_MIN {
                    return None;
                }
                let severity = if ttb < THRESHOLD_CRITICAL_TTB_MIN {
                    Severity::Critical
                } else {
                    Severity::High
                };
                (p, threshold, severity)
            }
            WarningCheck::TrendAlert => {
                let p = Projection::from_samples(samples, DAY_MIN)?;
                if p.trend <= TREND_GROWTH {
                    return None;
                }
                let severity = if p.trend > TREND_CRITICAL_GROWTH {
                    Severity::Critical
                } else {
                    Severity::High
                };
                (p, p.current * 2.0, severity)
            }
            WarningCheck::CapacityWarning => {
                let p = Projection::from_samples(samples, CAPACITY_HORIZON_MIN)?;
                if p.current <= CAPACITY_UTILIZATION {
                    return None;
                }
                let severity = if p.current > CAPACITY_CRITICAL_UTILIZATION {
                    Severity::Critical
                } else {
                    Severity::High
                };
                (p, 1.0, severity)
            }
            WarningCheck::CostAlert => {
                let budget = cfg.daily_budget;
                let p = Projection::from_samples(samples, DAY_MIN)?;
                if p.current <= budget * COST_BUDGET_FRACTION {
                    return None;
                }
                let severity = if p.current > budget * COST_CRITICAL_FRACTION {
                    Severity::Critical
                } else {
                    Severity::High
                };
                (p, budget, severity)
            }
        };

        // A trajectory that is not approaching its threshold is never reported
        let time_to_breach = projection.time_to_breach(threshold);
        if !time_to_breach.is_finite() {
            return None;
        }

        Some(self.build(metric, projection, threshold, time_to_breach, severity, samples.len()))
    }

    fn build(
        self,
        metric: &str,
        p: Projection,
        threshold: f64,
        time_to_breach: f64,
        severity: Severity,
        sample_count: usize,
    ) -> EarlyWarning {
        let (warning_type, title, description) = match self {
            WarningCheck::ThresholdBreach => (
                WarningType::ThresholdBreach,
                format!("{} approaching threshold", metric),
                format!(
                    "{} is at {:.1}% and is projected to cross {:.1}% in {:.0} minutes",
                    metric,
                    p.current * 100.0,
                    threshold * 100.0,
                    time_to_breach
                ),
            ),
            WarningCheck::TrendAlert => (
                WarningType::TrendAlert,
                format!("Rapid growth in {}", metric),
                format!(
                    "{} is growing {:.0}% per hour and is projected to double in {:.0} minutes",
                    metric,
                    p.trend * 100.0,
                    time_to_breach
                ),
            ),
            WarningCheck::CapacityWarning => (
                WarningType::CapacityWarning,
                format!("{} capacity running low", metric),
                format!(
                    "{} utilization is {:.1}%; full capacity projected in {:.0} minutes",
                    metric,
                    p.current * 100.0,
                    time_to_breach
                ),
            ),
            WarningCheck::CostAlert => (
                WarningType::CostAlert,
                "Daily budget nearly exhausted".to_string(),
                format!(
                    "Spend is {:.2} of a {:.2} daily budget; projected to exceed it in {:.0} minutes",
                    p.current, threshold, time_to_breach
                ),
            ),
        };

        EarlyWarning {
            id: uuid::Uuid::new_v4().to_string(),
            warning_type,
            severity,
            title,
            description,
            metric: metric.to_string(),
            current_value: p.current,
            threshold,
            projected_value: p.projected,
            time_to_breach,
            confidence: confidence(sample_count),
            actions: self.actions(metric, severity),
            status: WarningStatus::Active,
            created_at: Utc::now(),
            acknowledged_at: None,
            acknowledged_by: None,
            resolved_at: None,
            dismissed_at: None,
        }
    }

    fn actions(self, metric: &str, priority: Severity) -> Vec<WarningAction> {
        let urgent = priority == Severity::Critical;
        match self {
            WarningCheck::ThresholdBreach => vec![
                WarningAction::new(
                    &format!("Scale up {} capacity", metric),
                    priority,
                    if urgent { "immediate" } else { "within 1 hour" },
                    "Prevents the threshold breach",
                ),
                WarningAction::new(
                    "Identify the workloads driving the increase",
                    priority,
                    "within 1 hour",
                    "Confirms whether the growth is expected",
                ),
            ],
            WarningCheck::TrendAlert => vec![WarningAction::new(
                &format!("Review what is driving growth in {}", metric),
                priority,
                if urgent { "within 4 hours" } else { "within 24 hours" },
                "Keeps capacity and spend plans in line with demand",
            )],
            WarningCheck::CapacityWarning => vec![
                WarningAction::new(
                    &format!("Provision additional {} capacity", metric),
                    priority,
                    if urgent { "immediate" } else { "within 1 hour" },
                    "Avoids service degradation at full utilization",
                ),
                WarningAction::new(
                    "Free unused resources",
                    priority,
                    "within 1 hour",
                    "Buys headroom while capacity is added",
                ),
            ],
            WarningCheck::CostAlert => vec![
                WarningAction::new(
                    "Review today's highest-cost workloads",
                    priority,
                    if urgent { "immediate" } else { "today" },
                    "Keeps spend within the daily budget",
                ),
                WarningAction::new(
                    "Throttle non-essential AI and document generation",
                    priority,
                    "today",
                    "Slows spend until the budget resets",
                ),
            ],
        }
    }
}

/// More samples, more trust in the linear fit; capped below certainty.
fn confidence(sample_count: usize) -> f64 {
    (0.5 + sample_count as f64 / 100.0).min(0.95)
}
