//! In-process gateway backed by a map of series.

use std::collections::{HashMap, HashSet};

use tokio::sync::RwLock;

use super::{GatewayError, MetricGateway, MetricSample, TimeRange};

#[derive(Default)]
struct Series {
    samples: HashMap<String, Vec<MetricSample>>,
    failing: HashSet<String>,
}

/// Holds samples in memory. Metrics can be marked as failing to simulate an
/// unreachable upstream.
#[derive(Default)]
pub struct InMemoryGateway {
    inner: RwLock<Series>,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style variant of [`InMemoryGateway::set_series`].
    pub fn with_series(mut self, metric: &str, samples: Vec<MetricSample>) -> Self {
        let series = self.inner.get_mut();
        series.samples.insert(metric.to_string(), sorted(samples));
        self
    }

    /// Builder-style variant of [`InMemoryGateway::set_failing`].
    pub fn with_failure(mut self, metric: &str) -> Self {
        self.inner.get_mut().failing.insert(metric.to_string());
        self
    }

    pub async fn set_series(&self, metric: &str, samples: Vec<MetricSample>) {
        let mut inner = self.inner.write().await;
        inner.samples.insert(metric.to_string(), sorted(samples));
    }

    pub async fn push(&self, metric: &str, sample: MetricSample) {
        let mut inner = self.inner.write().await;
        let series = inner.samples.entry(metric.to_string()).or_default();
        series.push(sample);
        series.sort_by_key(|s| s.timestamp);
    }

    pub async fn set_failing(&self, metric: &str, failing: bool) {
        let mut inner = self.inner.write().await;
        if failing {
            inner.failing.insert(metric.to_string());
        } else {
            inner.failing.remove(metric);
        }
    }
}

fn sorted(mut samples: Vec<MetricSample>) -> Vec<MetricSample> {
    samples.sort_by_key(|s| s.timestamp);
    samples
}

#[async_trait::async_trait]
impl MetricGateway for InMemoryGateway {
    async fn recent_samples(
        &self,
        metric: &str,
        range: TimeRange,
    ) -> Result<Vec<MetricSample>, GatewayError> {
        let inner = self.inner.read().await;
        if inner.failing.contains(metric) {
            return Err(GatewayError::Unavailable(format!(
                "metric '{}' is marked as failing",
                metric
            )));
        }

        Ok(inner
            .samples
            .get(metric)
            .map(|series| {
                series
                    .iter()
                    .filter(|s| range.contains(s.timestamp))
                    .copied()
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    #[tokio::test]
    async fn test_filters_by_range_and_orders() {
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let samples = vec![
            MetricSample::new(t0 + Duration::hours(2), 3.0),
            MetricSample::new(t0, 1.0),
            MetricSample::new(t0 + Duration::hours(1), 2.0),
        ];
        let gateway = InMemoryGateway::new().with_series("compute", samples);

        let range = TimeRange::new(t0, t0 + Duration::hours(2));
        let got = gateway.recent_samples("compute", range).await.unwrap();
        assert_eq!(got.iter().map(|s| s.value).collect::<Vec<_>>(), vec![1.0, 2.0]);
    }

    #[tokio::test]
    async fn test_unknown_metric_is_empty_not_error() {
        let gateway = InMemoryGateway::new();
        let got = gateway
            .recent_samples("nothing", TimeRange::last_hours(1).unwrap())
            .await
            .unwrap();
        assert!(got.is_empty());
    }

    #[tokio::test]
    async fn test_failing_metric_errors() {
        let gateway = InMemoryGateway::new().with_failure("storage");
        let err = gateway
            .recent_samples("storage", TimeRange::last_hours(1).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Unavailable(_)));

        gateway.set_failing("storage", false).await;
        assert!(gateway
            .recent_samples("storage", TimeRange::last_hours(1).unwrap())
            .await
            .is_ok());
    }
}
