//! Metric Gateway -- the source of time-series samples.
//!
//! The engine only ever asks for "samples of metric X between A and B".
//! Where they come from (SQLite, a remote TSDB, a test fixture) is up to the
//! [`MetricGateway`] implementation.

pub mod memory;
pub mod sqlite;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use self::memory::InMemoryGateway;
pub use self::sqlite::SqliteGateway;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("gateway task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("metric source unavailable: {0}")]
    Unavailable(String),
}

/// A single observation of a metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

impl MetricSample {
    pub fn new(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// The `hours` leading up to now. `None` when the start would fall
    /// outside the representable calendar.
    pub fn last_hours(hours: i64) -> Option<Self> {
        let end = Utc::now();
        let start = end.checked_sub_signed(Duration::try_hours(hours)?)?;
        Some(Self { start, end })
    }

    pub fn span(&self) -> Duration {
        self.end - self.start
    }

    /// The interval of identical length that ends where this one starts.
    /// `None` when it would begin before the representable calendar.
    pub fn preceding(&self) -> Option<Self> {
        let start = self.start.checked_sub_signed(self.span())?;
        Some(Self { start, end: self.start })
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at < self.end
    }
}

/// Supplier of ordered samples for a named metric.
///
/// Implementations may return fewer samples than the range could hold and
/// must return an empty vector (not an error) when there is simply no data.
/// Errors are reserved for genuine I/O failures.
#[async_trait::async_trait]
pub trait MetricGateway: Send + Sync {
    async fn recent_samples(
        &self,
        metric: &str,
        range: TimeRange,
    ) -> Result<Vec<MetricSample>, GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_preceding_range_has_equal_span() {
        let start = Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 3, 3, 0, 0, 0).unwrap();
        let range = TimeRange::new(start, end);

        let before = range.preceding().unwrap();
        assert_eq!(before.end, start);
        assert_eq!(before.span(), range.span());
        assert_eq!(before.start, Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_out_of_calendar_ranges_are_rejected() {
        assert!(TimeRange::last_hours(24).is_some());
        assert!(TimeRange::last_hours(i64::MAX).is_none());

        // Starts inside the calendar, but its equal-length predecessor does not
        let wide = TimeRange::last_hours(2_000_000_000).unwrap();
        assert!(wide.preceding().is_none());
    }

    #[test]
    fn test_range_is_half_open() {
        let start = Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap();
        let range = TimeRange::new(start, start + Duration::hours(1));
        assert!(range.contains(start));
        assert!(!range.contains(range.end));
    }
}
