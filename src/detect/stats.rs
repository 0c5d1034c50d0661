use crate::gateway::MetricSample;

/// A simple time series for statistical analysis.
#[derive(Debug, Clone, Default)]
pub struct TimeSeries {
    values: Vec<f64>,
}

impl TimeSeries {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    pub fn from_samples(samples: &[MetricSample]) -> Self {
        Self::new(samples.iter().map(|s| s.value).collect())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn first(&self) -> Option<f64> {
        self.values.first().copied()
    }

    pub fn last(&self) -> Option<f64> {
        self.values.last().copied()
    }

    pub fn mean(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        self.values.iter().sum::<f64>() / self.values.len() as f64
    }

    /// Population variance.
    pub fn variance(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let mean = self.mean();
        let sum_sq_diff: f64 = self
            .values
            .iter()
            .map(|&x| (x - mean).powi(2))
            .sum();
        sum_sq_diff / self.values.len() as f64
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// `|value - mean| / std_dev`, or `None` against a flat series.
    pub fn sigma_distance(&self, value: f64) -> Option<f64> {
        let std = self.std_dev();
        if self.values.is_empty() || std <= f64::EPSILON || !std.is_finite() {
            return None;
        }
        Some((value - self.mean()).abs() / std)
    }

    /// Normalized slope of the whole series, see [`normalized_trend`].
    pub fn trend(&self) -> Option<f64> {
        normalized_trend(&self.values)
    }
}

/// `(last - first) / (first * len)`.
///
/// `None` when there are fewer than two points or the first value is zero.
pub fn normalized_trend(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let first = values[0];
    let last = values[values.len() - 1];
    if first == 0.0 || !first.is_finite() {
        return None;
    }
    let trend = (last - first) / (first * values.len() as f64);
    trend.is_finite().then_some(trend)
}
