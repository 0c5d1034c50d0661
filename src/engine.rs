//! The single owner of detection state.
//!
//! [`Engine`] holds the anomaly store, the warning store and the rule
//! registry behind one `RwLock`, so every insert, eviction and status
//! transition is serialized. Gateway calls happen outside the lock, each under
//! a timeout; they are the only suspension points of a pass.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::Utc;
use futures::FutureExt;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::detect::store::BoundedStore;
use crate::detect::window::{WindowPolicy, Windows};
use crate::detect::{seasonal, statistical, trend, AnomalyDetection, DetectError, Outcome};
use crate::gateway::{MetricGateway, MetricSample, TimeRange};
use crate::rules::strategy::{RuleStrategy, ThresholdStrategy};
use crate::rules::{Algorithm, DetectionRule, RuleError, RulePerformance, RuleRegistry, RuleSpec};
use crate::warning::{EarlyWarning, WarningCheck};

struct EngineState {
    anomalies: BoundedStore<AnomalyDetection>,
    warnings: BoundedStore<EarlyWarning>,
    rules: RuleRegistry,
}

/// Outcome of one scheduled pass over many metrics or checks.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PassReport {
    /// Metrics (detection) or metric/check pairs (warnings) evaluated.
    pub evaluated: usize,
    /// Items skipped because of a gateway error, timeout or panic.
    pub failed: usize,
    /// Entries newly added to the store.
    pub stored: usize,
}

/// Store sizes and active counts, for status endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub anomalies_stored: usize,
    pub anomalies_active: usize,
    pub warnings_stored: usize,
    pub warnings_active: usize,
    pub rules: usize,
    pub active_anomalies_by_severity: BTreeMap<String, usize>,
    pub active_warnings_by_severity: BTreeMap<String, usize>,
}

pub struct Engine {
    gateway: Arc<dyn MetricGateway>,
    config: Config,
    window_policy: WindowPolicy,
    strategies: HashMap<Algorithm, Arc<dyn RuleStrategy>>,
    state: RwLock<EngineState>,
}

impl Engine {
    pub fn new(gateway: Arc<dyn MetricGateway>, config: Config) -> Self {
        let window_policy = WindowPolicy {
            min_baseline: config.detection.min_baseline_samples,
            min_recent: config.detection.min_recent_samples,
        };
        let state = EngineState {
            anomalies: BoundedStore::new(config.detection.max_anomalies),
            warnings: BoundedStore::new(config.warnings.max_warnings),
            rules: RuleRegistry::new(),
        };

        let mut strategies: HashMap<Algorithm, Arc<dyn RuleStrategy>> = HashMap::new();
        strategies.insert(Algorithm::Threshold, Arc::new(ThresholdStrategy));

        Self {
            gateway,
            config,
            window_policy,
            strategies,
            state: RwLock::new(state),
        }
    }

    /// Register (or replace) the strategy used for rules of `algorithm`.
    pub fn with_strategy(mut self, algorithm: Algorithm, strategy: Arc<dyn RuleStrategy>) -> Self {
        self.strategies.insert(algorithm, strategy);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Detection
    // -----------------------------------------------------------------------

    /// Run one detection pass for `metric` and store what it finds.
    ///
    /// Returns every anomaly the pass produced, as stored: an occurrence that
    /// was already in the store comes back as the stored entry. Too little
    /// data is an empty result, not an error.
    pub async fn detect_anomalies(
        &self,
        metric: &str,
        range: Option<TimeRange>,
    ) -> Result<Vec<AnomalyDetection>, DetectError> {
        let range = match range {
            Some(r) => r,
            None => self.default_range(self.config.detection.lookback_hours)?,
        };
        self.detect_metric(metric, range).await.map(|(found, _)| found)
    }

    fn default_range(&self, hours: i64) -> Result<TimeRange, DetectError> {
        TimeRange::last_hours(hours).ok_or(DetectError::RangeOutOfBounds { start: Utc::now() })
    }

    /// Returns the pass's anomalies and how many of them were new.
    async fn detect_metric(
        &self,
        metric: &str,
        range: TimeRange,
    ) -> Result<(Vec<AnomalyDetection>, usize), DetectError> {
        let samples = self.fetch(metric, WindowPolicy::fetch_range(range)?).await?;

        let windows = match self.window_policy.split(range, samples) {
            Ok(w) => w,
            Err(e) if e.is_insufficient_data() => {
                debug!(metric = %metric, reason = %e, "Skipping detection");
                return Ok((Vec::new(), 0));
            }
            Err(e) => return Err(e),
        };

        let rules = self.state.read().await.rules.enabled_for(metric);
        let found = self.run_detectors(metric, &windows, &rules);
        if found.is_empty() {
            debug!(metric = %metric, "No anomalies");
            return Ok((Vec::new(), 0));
        }

        Ok(self.commit_anomalies(metric, found).await)
    }

    /// Runs the fixed detectors and every rule strategy, tagging each anomaly
    /// with the rules it belongs to. A strategy's output belongs to its own
    /// rule only; fixed-detector output belongs to the rules that have no
    /// strategy of their own.
    fn run_detectors(&self, metric: &str, windows: &Windows, rules: &[DetectionRule]) -> Vec<AnomalyDetection> {
        let unbacked: Vec<String> = rules
            .iter()
            .filter(|r| !self.strategies.contains_key(&r.algorithm))
            .map(|r| r.id.clone())
            .collect();

        let mut found = statistical::detect(metric, windows);
        found.extend(seasonal::detect(metric, windows, self.config.detection.seasonal_period));
        found.extend(trend::detect(metric, windows));
        for anomaly in &mut found {
            anomaly.rule_ids = unbacked.clone();
        }

        for rule in rules {
            if let Some(strategy) = self.strategies.get(&rule.algorithm) {
                found.extend(strategy.evaluate(rule, windows).into_iter().map(|mut a| {
                    a.rule_ids = vec![rule.id.clone()];
                    a
                }));
            }
        }
        found
    }

    async fn commit_anomalies(&self, metric: &str, found: Vec<AnomalyDetection>) -> (Vec<AnomalyDetection>, usize) {
        let mut state = self.state.write().await;
        let admissions = state.anomalies.insert_batch(found);
        let stored = admissions.iter().filter(|a| a.is_inserted()).count();

        // One trigger per rule per pass, however many new anomalies it owns
        let fired: BTreeSet<String> = admissions
            .iter()
            .filter_map(|a| a.inserted())
            .flat_map(|a| a.rule_ids.iter().cloned())
            .collect();

        if stored > 0 {
            let now = Utc::now();
            for id in &fired {
                state.rules.record_trigger(id, now);
            }
            info!(metric = %metric, stored, rules = fired.len(), total = state.anomalies.len(), "Anomalies detected");
        }

        (admissions.into_iter().map(|a| a.into_inner()).collect(), stored)
    }

    /// Detection pass over the configured metric set. A failing metric is
    /// logged and skipped; the rest of the pass continues.
    pub async fn detect_all(&self) -> PassReport {
        match self.default_range(self.config.detection.lookback_hours) {
            Ok(range) => self.detect_all_in(range).await,
            Err(e) => {
                error!(error = %e, "Detection pass skipped");
                PassReport::default()
            }
        }
    }

    /// [`Engine::detect_all`] over an explicit range.
    pub async fn detect_all_in(&self, range: TimeRange) -> PassReport {
        let mut report = PassReport::default();

        for metric in &self.config.detection.metrics {
            report.evaluated += 1;
            let outcome = AssertUnwindSafe(self.detect_metric(metric, range))
                .catch_unwind()
                .await;
            match outcome {
                Ok(Ok((_, stored))) => report.stored += stored,
                Ok(Err(e)) => {
                    report.failed += 1;
                    warn!(metric = %metric, error = %e, "Detection skipped for metric");
                }
                Err(_) => {
                    report.failed += 1;
                    error!(metric = %metric, "Detection panicked for metric");
                }
            }
        }
        report
    }

    async fn fetch(&self, metric: &str, range: TimeRange) -> Result<Vec<MetricSample>, DetectError> {
        let timeout = self.config.gateway.timeout();
        match tokio::time::timeout(timeout, self.gateway.recent_samples(metric, range)).await {
            Ok(Ok(samples)) => Ok(samples),
            Ok(Err(source)) => Err(DetectError::Gateway {
                metric: metric.to_string(),
                source,
            }),
            Err(_) => Err(DetectError::Timeout {
                metric: metric.to_string(),
                timeout,
            }),
        }
    }

    // -----------------------------------------------------------------------
    // Early warnings
    // -----------------------------------------------------------------------

    /// Run the four warning checks and store what they raise.
    pub async fn generate_early_warnings(&self, range: Option<TimeRange>) -> Vec<EarlyWarning> {
        self.warning_pass(range).await.0
    }

    /// Like [`Engine::generate_early_warnings`] but also reports failures.
    pub async fn warning_pass(&self, range: Option<TimeRange>) -> (Vec<EarlyWarning>, PassReport) {
        let range = match range {
            Some(r) => r,
            None => match self.default_range(self.config.warnings.lookback_hours) {
                Ok(r) => r,
                Err(e) => {
                    error!(error = %e, "Warning pass skipped");
                    return (Vec::new(), PassReport::default());
                }
            },
        };
        let cfg = &self.config.warnings;
        let mut report = PassReport::default();

        // Each metric is fetched once per pass and shared by the checks
        let mut series: HashMap<String, Option<Vec<MetricSample>>> = HashMap::new();
        let mut raised = Vec::new();

        for check in WarningCheck::ALL {
            for metric in check.metrics(cfg) {
                report.evaluated += 1;
                if !series.contains_key(&metric) {
                    let fetched = match self.fetch(&metric, range).await {
                        Ok(samples) => Some(samples),
                        Err(e) => {
                            warn!(metric = %metric, error = %e, "Warning checks skipped for metric");
                            None
                        }
                    };
                    series.insert(metric.clone(), fetched);
                }
                let Some(Some(samples)) = series.get(&metric) else {
                    report.failed += 1;
                    continue;
                };

                let evaluated = std::panic::catch_unwind(AssertUnwindSafe(|| check.evaluate(&metric, samples, cfg)));
                match evaluated {
                    Ok(Some(warning)) => raised.push(warning),
                    Ok(None) => {}
                    Err(_) => {
                        report.failed += 1;
                        error!(metric = %metric, check = check.name(), "Warning check panicked");
                    }
                }
            }
        }

        if raised.is_empty() {
            return (Vec::new(), report);
        }

        let mut state = self.state.write().await;
        let admissions = state.warnings.insert_batch(raised);
        report.stored = admissions.iter().filter(|a| a.is_inserted()).count();
        if report.stored > 0 {
            info!(stored = report.stored, total = state.warnings.len(), "Early warnings raised");
        }
        (admissions.into_iter().map(|a| a.into_inner()).collect(), report)
    }

    // -----------------------------------------------------------------------
    // Queries and transitions
    // -----------------------------------------------------------------------

    /// New or investigating anomalies, newest first.
    pub async fn active_anomalies(&self) -> Vec<AnomalyDetection> {
        let state = self.state.read().await;
        let mut active: Vec<_> = state.anomalies.iter().filter(|a| a.is_active()).cloned().collect();
        active.sort_by(|a, b| b.detected_at.cmp(&a.detected_at));
        active
    }

    pub async fn get_anomaly(&self, id: &str) -> Option<AnomalyDetection> {
        self.state.read().await.anomalies.get(id).cloned()
    }

    /// Active warnings, newest first.
    pub async fn active_warnings(&self) -> Vec<EarlyWarning> {
        let state = self.state.read().await;
        let mut active: Vec<_> = state.warnings.iter().filter(|w| w.is_active()).cloned().collect();
        active.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        active
    }

    pub async fn get_warning(&self, id: &str) -> Option<EarlyWarning> {
        self.state.read().await.warnings.get(id).cloned()
    }

    pub async fn acknowledge_anomaly(&self, id: &str, user_id: &str) -> bool {
        let mut state = self.state.write().await;
        let acknowledged = state
            .anomalies
            .get_mut(id)
            .map(|a| a.acknowledge(user_id))
            .unwrap_or(false);
        if acknowledged {
            info!(anomaly_id = %id, user = %user_id, "Anomaly acknowledged");
        }
        acknowledged
    }

    /// Close an anomaly. A false positive counts against every rule the
    /// anomaly was attributed to.
    pub async fn resolve_anomaly(&self, id: &str, resolution: &str, outcome: Outcome) -> bool {
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        let Some(anomaly) = state.anomalies.get_mut(id) else {
            return false;
        };
        if !anomaly.resolve(resolution, outcome) {
            return false;
        }

        if outcome == Outcome::FalsePositive {
            for rule_id in &anomaly.rule_ids {
                state.rules.record_false_positive(rule_id);
            }
        }
        info!(anomaly_id = %id, ?outcome, "Anomaly resolved");
        true
    }

    pub async fn acknowledge_warning(&self, id: &str, user_id: &str) -> bool {
        let mut state = self.state.write().await;
        state
            .warnings
            .get_mut(id)
            .map(|w| w.acknowledge(user_id))
            .unwrap_or(false)
    }

    pub async fn resolve_warning(&self, id: &str) -> bool {
        let mut state = self.state.write().await;
        state.warnings.get_mut(id).map(|w| w.resolve()).unwrap_or(false)
    }

    pub async fn dismiss_warning(&self, id: &str) -> bool {
        let mut state = self.state.write().await;
        state.warnings.get_mut(id).map(|w| w.dismiss()).unwrap_or(false)
    }

    // -----------------------------------------------------------------------
    // Rules
    // -----------------------------------------------------------------------

    pub async fn create_detection_rule(&self, spec: RuleSpec) -> Result<String, RuleError> {
        self.state.write().await.rules.create(spec)
    }

    pub async fn rule_performance(&self, rule_id: &str) -> Option<RulePerformance> {
        self.state.read().await.rules.performance(rule_id)
    }

    pub async fn get_rule(&self, rule_id: &str) -> Option<DetectionRule> {
        self.state.read().await.rules.get(rule_id).cloned()
    }

    pub async fn list_rules(&self) -> Vec<DetectionRule> {
        self.state.read().await.rules.list()
    }

    pub async fn set_rule_enabled(&self, rule_id: &str, enabled: bool) -> Result<(), RuleError> {
        self.state.write().await.rules.set_enabled(rule_id, enabled)
    }

    pub async fn summary(&self) -> Summary {
        let state = self.state.read().await;
        let mut active_anomalies_by_severity = BTreeMap::new();
        let mut anomalies_active = 0;
        for a in state.anomalies.iter().filter(|a| a.is_active()) {
            anomalies_active += 1;
            *active_anomalies_by_severity.entry(a.severity.to_string()).or_insert(0) += 1;
        }
        let mut active_warnings_by_severity = BTreeMap::new();
        let mut warnings_active = 0;
        for w in state.warnings.iter().filter(|w| w.is_active()) {
            warnings_active += 1;
            *active_warnings_by_severity.entry(w.severity.to_string()).or_insert(0) += 1;
        }

        Summary {
            anomalies_stored: state.anomalies.len(),
            anomalies_active,
            warnings_stored: state.warnings.len(),
            warnings_active,
            rules: state.rules.len(),
            active_anomalies_by_severity,
            active_warnings_by_severity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::AnomalyStatus;
    use crate::gateway::{GatewayError, InMemoryGateway};
    use chrono::{DateTime, Duration, TimeZone};
    use std::time::Duration as StdDuration;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 12, 1, 0, 0, 0).unwrap()
    }

    /// 24h baseline alternating 90/110, then 24h of 100 with a 250 spike.
    fn spiky_series() -> Vec<MetricSample> {
        (0..48)
            .map(|h| {
                let v = match h {
                    0..=23 if h % 2 == 0 => 90.0,
                    0..=23 => 110.0,
                    30 => 250.0,
                    _ => 100.0,
                };
                MetricSample::new(t0() + Duration::hours(h), v)
            })
            .collect()
    }

    fn recent_range() -> TimeRange {
        TimeRange::new(t0() + Duration::hours(24), t0() + Duration::hours(48))
    }

    fn engine(gateway: InMemoryGateway) -> Engine {
        Engine::new(Arc::new(gateway), Config::default())
    }

    #[tokio::test]
    async fn test_detect_and_resolve_false_positive_counts_against_rule() {
        let engine = engine(InMemoryGateway::new().with_series("compute", spiky_series()));
        let rule_id = engine
            .create_detection_rule(RuleSpec {
                name: "compute z".to_string(),
                metric: "compute".to_string(),
                algorithm: "statistical".to_string(),
                parameters: Default::default(),
                enabled: true,
            })
            .await
            .unwrap();

        let found = engine.detect_anomalies("compute", Some(recent_range())).await.unwrap();
        let spike = found
            .iter()
            .find(|a| a.actual_value == 250.0 && a.anomaly_type == crate::detect::AnomalyType::Spike)
            .unwrap();
        assert_eq!(spike.rule_ids, vec![rule_id.clone()]);

        let perf = engine.rule_performance(&rule_id).await.unwrap();
        assert_eq!(perf.trigger_count, 1);

        assert!(engine.acknowledge_anomaly(&spike.id, "ops").await);
        assert!(engine.resolve_anomaly(&spike.id, "load test", Outcome::FalsePositive).await);
        assert_eq!(
            engine.get_anomaly(&spike.id).await.unwrap().status,
            AnomalyStatus::FalsePositive
        );
        let perf = engine.rule_performance(&rule_id).await.unwrap();
        assert_eq!(perf.false_positive_rate, 1.0);

        // Re-running finds only known occurrences, so the rule does not fire again
        engine.detect_anomalies("compute", Some(recent_range())).await.unwrap();
        assert_eq!(engine.rule_performance(&rule_id).await.unwrap().trigger_count, 1);
    }

    #[tokio::test]
    async fn test_rule_is_credited_only_for_its_own_anomalies() {
        let engine = engine(InMemoryGateway::new().with_series("compute", spiky_series()));
        let spec = |name: &str, algorithm: &str, threshold: Option<f64>| RuleSpec {
            name: name.to_string(),
            metric: "compute".to_string(),
            algorithm: algorithm.to_string(),
            parameters: crate::rules::RuleParameters {
                threshold,
                ..Default::default()
            },
            enabled: true,
        };
        let ceiling = engine
            .create_detection_rule(spec("unreachable ceiling", "threshold", Some(1e9)))
            .await
            .unwrap();
        let low_ceiling = engine
            .create_detection_rule(spec("low ceiling", "threshold", Some(99.0)))
            .await
            .unwrap();
        let sigma = engine
            .create_detection_rule(spec("compute z", "statistical", None))
            .await
            .unwrap();

        let found = engine.detect_anomalies("compute", Some(recent_range())).await.unwrap();
        assert!(!found.is_empty());
        assert!(found.iter().all(|a| !a.rule_ids.contains(&ceiling)));
        // Flat hours are only over the low ceiling, not over 3 sigma
        let spike_at = |value: f64| {
            found
                .iter()
                .find(|a| a.anomaly_type == crate::detect::AnomalyType::Spike && a.actual_value == value)
                .unwrap()
        };
        assert_eq!(spike_at(100.0).rule_ids, vec![low_ceiling.clone()]);
        assert_eq!(spike_at(250.0).rule_ids, vec![sigma.clone()]);

        assert_eq!(engine.rule_performance(&ceiling).await.unwrap().trigger_count, 0);
        assert_eq!(engine.rule_performance(&low_ceiling).await.unwrap().trigger_count, 1);
        assert_eq!(engine.rule_performance(&sigma).await.unwrap().trigger_count, 1);
        assert!(engine.get_rule(&ceiling).await.unwrap().last_triggered.is_none());
    }

    #[tokio::test]
    async fn test_unrepresentable_ranges_are_rejected() {
        let engine = engine(InMemoryGateway::new().with_series("compute", spiky_series()));
        let range = TimeRange::new(DateTime::<Utc>::MIN_UTC, t0());
        let err = engine.detect_anomalies("compute", Some(range)).await.unwrap_err();
        assert!(matches!(err, DetectError::RangeOutOfBounds { .. }));

        let mut config = Config::default();
        config.detection.metrics = vec!["compute".to_string()];
        config.detection.lookback_hours = i64::MAX;
        config.warnings.lookback_hours = i64::MAX;
        let engine = Engine::new(
            Arc::new(InMemoryGateway::new().with_series("compute", spiky_series())),
            config,
        );
        assert!(matches!(
            engine.detect_anomalies("compute", None).await,
            Err(DetectError::RangeOutOfBounds { .. })
        ));
        assert_eq!(engine.detect_all().await, PassReport::default());
        let (warnings, report) = engine.warning_pass(None).await;
        assert!(warnings.is_empty());
        assert_eq!(report, PassReport::default());
    }

    #[tokio::test]
    async fn test_insufficient_data_is_empty_result() {
        let short: Vec<_> = spiky_series().into_iter().skip(10).collect();
        let engine = engine(InMemoryGateway::new().with_series("compute", short));
        let found = engine.detect_anomalies("compute", Some(recent_range())).await.unwrap();
        assert!(found.is_empty());
        assert_eq!(engine.summary().await.anomalies_stored, 0);
    }

    #[tokio::test]
    async fn test_gateway_failure_surfaces_as_error() {
        let engine = engine(InMemoryGateway::new().with_failure("storage"));
        let err = engine.detect_anomalies("storage", Some(recent_range())).await.unwrap_err();
        assert!(matches!(
            err,
            DetectError::Gateway { source: GatewayError::Unavailable(_), .. }
        ));
    }

    struct SlowGateway;

    #[async_trait::async_trait]
    impl MetricGateway for SlowGateway {
        async fn recent_samples(&self, _: &str, _: TimeRange) -> Result<Vec<MetricSample>, GatewayError> {
            tokio::time::sleep(StdDuration::from_secs(3600)).await;
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_gateway_timeout() {
        let mut config = Config::default();
        config.gateway.timeout_secs = 1;
        let engine = Engine::new(Arc::new(SlowGateway), config);

        let err = engine.detect_anomalies("compute", Some(recent_range())).await.unwrap_err();
        assert!(matches!(err, DetectError::Timeout { .. }));
    }

    struct PanickyStrategy;

    impl RuleStrategy for PanickyStrategy {
        fn evaluate(&self, _: &DetectionRule, _: &Windows) -> Vec<AnomalyDetection> {
            panic!("strategy bug");
        }
    }

    #[tokio::test]
    async fn test_panicking_metric_does_not_abort_pass() {
        let mut config = Config::default();
        config.detection.metrics = vec!["compute".to_string(), "storage".to_string()];
        let gateway = InMemoryGateway::new()
            .with_series("compute", spiky_series())
            .with_series("storage", spiky_series());
        let engine = Engine::new(Arc::new(gateway), config)
            .with_strategy(Algorithm::PatternBased, Arc::new(PanickyStrategy));
        engine
            .create_detection_rule(RuleSpec {
                name: "boom".to_string(),
                metric: "compute".to_string(),
                algorithm: "pattern_based".to_string(),
                parameters: Default::default(),
                enabled: true,
            })
            .await
            .unwrap();

        let report = engine.detect_all_in(recent_range()).await;
        assert_eq!(report.evaluated, 2);
        assert_eq!(report.failed, 1);
        assert!(report.stored > 0);
        assert!(engine.active_anomalies().await.iter().all(|a| a.metric == "storage"));
    }

    #[tokio::test]
    async fn test_warning_lifecycle() {
        let now = Utc::now();
        let rising: Vec<_> = (0..12)
            .map(|i| MetricSample::new(now - Duration::hours(11 - i), 0.82 + 0.01 * i as f64))
            .collect();
        let engine = engine(InMemoryGateway::new().with_series("storage", rising));

        let warnings = engine.generate_early_warnings(None).await;
        let capacity = warnings
            .iter()
            .find(|w| w.warning_type == crate::warning::WarningType::CapacityWarning)
            .unwrap();
        assert_eq!(engine.active_warnings().await.len(), warnings.len());

        assert!(engine.acknowledge_warning(&capacity.id, "oncall").await);
        assert!(!engine.acknowledge_warning(&capacity.id, "oncall").await);
        assert!(engine.resolve_warning(&capacity.id).await);
        assert!(!engine.dismiss_warning(&capacity.id).await);
        assert!(!engine.acknowledge_warning("missing", "oncall").await);
        assert!(engine.active_warnings().await.iter().all(|w| w.id != capacity.id));
    }
}
