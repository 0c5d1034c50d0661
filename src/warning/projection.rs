//! Linear projection and breach-time estimation.

use crate::detect::stats::TimeSeries;
use crate::gateway::MetricSample;

/// Project `current` forward by `horizon_minutes` at the normalized hourly
/// `trend`.
pub fn project(current: f64, trend: f64, horizon_minutes: f64) -> f64 {
    current * (1.0 + trend * (horizon_minutes / 60.0))
}

/// Minutes until `threshold` is reached along the line from `current` to
/// `projected` over `horizon_minutes`.
///
/// Infinite when the trajectory is flat or falling. Zero when the threshold
/// is already behind us.
pub fn time_to_breach(current: f64, threshold: f64, projected: f64, horizon_minutes: f64) -> f64 {
    if projected <= current || horizon_minutes <= 0.0 {
        return f64::INFINITY;
    }
    let rate_per_minute = (projected - current) / horizon_minutes;
    if rate_per_minute <= 0.0 || !rate_per_minute.is_finite() {
        return f64::INFINITY;
    }
    ((threshold - current) / rate_per_minute).max(0.0)
}

/// Everything a check needs to know about a metric's near future.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    pub current: f64,
    pub trend: f64,
    pub projected: f64,
    pub horizon_minutes: f64,
}

impl Projection {
    /// `None` when the series is empty, holds a non-finite value, or its
    /// trend is degenerate.
    pub fn from_samples(samples: &[MetricSample], horizon_minutes: f64) -> Option<Self> {
        if samples.iter().any(|s| !s.value.is_finite()) {
            return None;
        }
        let series = TimeSeries::from_samples(samples);
        let current = series.last()?;
        let trend = series.trend()?;
        Some(Self {
            current,
            trend,
            projected: project(current, trend, horizon_minutes),
            horizon_minutes,
        })
    }

    pub fn time_to_breach(&self, threshold: f64) -> f64 {
        time_to_breach(self.current, threshold, self.projected, self.horizon_minutes)
    }
}
