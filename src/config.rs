//! TOML configuration for metricwatch.
//!
//! Layered lookup: explicit path, then the `METRICWATCH_CONFIG` environment
//! variable, then `/etc/metricwatch/metricwatch.toml`, then compiled-in
//! defaults. Every section may be omitted.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::detect::window::{MIN_BASELINE_SAMPLES, MIN_RECENT_SAMPLES};

pub const CONFIG_ENV_VAR: &str = "METRICWATCH_CONFIG";
const SYSTEM_CONFIG_PATH: &str = "/etc/metricwatch/metricwatch.toml";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub warnings: WarningConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        info!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// An explicit path must load; the fallbacks only warn.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::load(path),
            None => Ok(Self::load_or_default()),
        }
    }

    pub fn load_or_default() -> Self {
        if let Ok(env_path) = std::env::var(CONFIG_ENV_VAR) {
            let path = Path::new(&env_path);
            match Self::load(path) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "METRICWATCH_CONFIG set but file could not be loaded, trying fallback"
                    );
                }
            }
        }

        let system_path = Path::new(SYSTEM_CONFIG_PATH);
        if system_path.exists() {
            match Self::load(system_path) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    warn!(
                        path = %system_path.display(),
                        error = %e,
                        "system config file exists but could not be loaded, using defaults"
                    );
                }
            }
        }

        debug!("no config file found, using compiled-in defaults");
        Self::default()
    }
}

// ---------------------------------------------------------------------------
// Detection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Seconds between detection passes.
    pub interval_secs: u64,
    /// Length of the recent window; the baseline has the same length.
    pub lookback_hours: i64,
    /// Metrics visited by each scheduled pass.
    pub metrics: Vec<String>,
    /// Retention cap of the anomaly store.
    pub max_anomalies: usize,
    pub min_baseline_samples: usize,
    pub min_recent_samples: usize,
    /// Buckets in the seasonal index (24 = hour of day).
    pub seasonal_period: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            interval_secs: 15 * 60,
            lookback_hours: 24,
            metrics: [
                "compute",
                "storage",
                "bandwidth",
                "ai_tokens",
                "api_calls",
                "document_generation",
                "ai_usage",
                "user_activity",
                "cost_analysis",
            ]
            .iter()
            .map(|m| m.to_string())
            .collect(),
            max_anomalies: 1000,
            min_baseline_samples: MIN_BASELINE_SAMPLES,
            min_recent_samples: MIN_RECENT_SAMPLES,
            seasonal_period: crate::detect::seasonal::DEFAULT_PERIOD,
        }
    }
}

impl DetectionConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

// ---------------------------------------------------------------------------
// Warnings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WarningConfig {
    /// Seconds between warning passes.
    pub interval_secs: u64,
    pub lookback_hours: i64,
    /// Retention cap of the warning store.
    pub max_warnings: usize,
    /// Budget the cost check measures `cost_analysis` against.
    pub daily_budget: f64,
    /// Utilization thresholds for the threshold-breach check.
    pub thresholds: BTreeMap<String, f64>,
    /// Fewer samples than this and a metric's trend is not trusted.
    pub min_samples: usize,
}

impl Default for WarningConfig {
    fn default() -> Self {
        Self {
            interval_secs: 5 * 60,
            lookback_hours: 24,
            max_warnings: 500,
            daily_budget: 1000.0,
            thresholds: [
                ("compute", 0.8),
                ("storage", 0.9),
                ("bandwidth", 0.7),
                ("ai_tokens", 0.85),
                ("api_calls", 0.75),
            ]
            .iter()
            .map(|(m, t)| (m.to_string(), *t))
            .collect(),
            min_samples: MIN_RECENT_SAMPLES,
        }
    }
}

impl WarningConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

// ---------------------------------------------------------------------------
// Gateway
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// SQLite database holding `metric_samples`.
    pub db_path: String,
    /// Upper bound on any single gateway call.
    pub timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            db_path: "data/metricwatch.db".to_string(),
            timeout_secs: 10,
        }
    }
}

impl GatewayConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is not set.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.detection.interval(), Duration::from_secs(900));
        assert_eq!(cfg.warnings.interval(), Duration::from_secs(300));
        assert_eq!(cfg.detection.max_anomalies, 1000);
        assert_eq!(cfg.warnings.max_warnings, 500);
        assert_eq!(cfg.warnings.thresholds.get("storage"), Some(&0.9));
        assert_eq!(cfg.detection.min_baseline_samples, 20);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            [detection]
            metrics = ["compute"]

            [warnings]
            daily_budget = 250.0

            [warnings.thresholds]
            compute = 0.6
            "#,
        )
        .unwrap();

        assert_eq!(cfg.detection.metrics, vec!["compute"]);
        assert_eq!(cfg.detection.interval_secs, 900);
        assert_eq!(cfg.warnings.daily_budget, 250.0);
        assert_eq!(cfg.warnings.thresholds.len(), 1);
        assert_eq!(cfg.server.bind, "127.0.0.1:8080");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metricwatch.toml");
        std::fs::write(&path, "[gateway]\ntimeout_secs = 3\n").unwrap();

        let cfg = Config::resolve(Some(&path)).unwrap();
        assert_eq!(cfg.gateway.timeout(), Duration::from_secs(3));

        assert!(Config::resolve(Some(&dir.path().join("missing.toml"))).is_err());
    }
}
