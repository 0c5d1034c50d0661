use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};

use metricwatch::config::{Config, LoggingConfig};
use metricwatch::detect::DetectError;
use metricwatch::engine::Engine;
use metricwatch::gateway::{SqliteGateway, TimeRange};

#[derive(Parser)]
#[command(
    name = "metricwatch",
    about = "Anomaly detection and early warnings for operational metrics",
    version,
    long_about = None
)]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the sample database path
    #[arg(long, global = true)]
    db: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the daemon (API server + detection and warning loops)
    Serve {
        /// Bind address (overrides [server].bind)
        #[arg(long)]
        bind: Option<String>,
    },

    /// Record one metric sample
    Ingest {
        /// Metric name
        #[arg(long)]
        metric: String,

        /// Observed value
        #[arg(long, allow_negative_numbers = true)]
        value: f64,

        /// RFC 3339 timestamp; defaults to now
        #[arg(long)]
        at: Option<String>,
    },

    /// Run one detection pass and print what it finds
    Detect {
        /// Metric to analyze; all configured metrics when omitted
        #[arg(long)]
        metric: Option<String>,

        /// Lookback in hours
        #[arg(long)]
        hours: Option<i64>,

        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// Run the early-warning checks once and print what they raise
    Warnings {
        /// Lookback in hours
        #[arg(long)]
        hours: Option<i64>,

        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(cfg: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cfg.level));
    // Logs go to stderr so --json output stays parseable
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if cfg.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn one_shot_engine(config: Config) -> Result<Engine> {
    let pool = metricwatch::storage::open_pool(&config.gateway.db_path)?;
    Ok(Engine::new(Arc::new(SqliteGateway::new(pool)), config))
}

fn lookback(hours: Option<i64>) -> Result<Option<TimeRange>> {
    match hours {
        Some(h) if h <= 0 => anyhow::bail!("--hours must be positive, got {}", h),
        Some(h) => match TimeRange::last_hours(h) {
            Some(range) => Ok(Some(range)),
            None => anyhow::bail!("--hours {} reaches outside the supported calendar", h),
        },
        None => Ok(None),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::resolve(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        config.gateway.db_path = db;
    }
    init_tracing(&config.logging);

    match cli.command {
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            tracing::info!(bind = %config.server.bind, "Starting metricwatch daemon");
            metricwatch::serve(config).await?;
        }
        Commands::Ingest { metric, value, at } => {
            let recorded_at = match at {
                Some(raw) => DateTime::parse_from_rfc3339(&raw)
                    .with_context(|| format!("invalid --at timestamp: {}", raw))?
                    .with_timezone(&Utc),
                None => Utc::now(),
            };
            let pool = metricwatch::storage::open_pool(&config.gateway.db_path)?;
            metricwatch::storage::save_sample(&pool, &metric, value, recorded_at)?;
            println!("Recorded {} = {} at {}", metric, value, recorded_at.to_rfc3339());
        }
        Commands::Detect { metric, hours, json } => {
            let range = lookback(hours)?;
            let metrics = match metric {
                Some(m) => vec![m],
                None => config.detection.metrics.clone(),
            };
            let engine = one_shot_engine(config)?;

            let mut found = Vec::new();
            for metric in &metrics {
                match engine.detect_anomalies(metric, range).await {
                    Ok(anomalies) => found.extend(anomalies),
                    Err(e @ DetectError::RangeOutOfBounds { .. }) => return Err(e.into()),
                    Err(e) => tracing::warn!(metric = %metric, error = %e, "Detection failed"),
                }
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&found)?);
            } else if found.is_empty() {
                println!("No anomalies detected.");
            } else {
                println!(
                    "{:<20} | {:<18} | {:<8} | {:>12} | {:>12} | Detected",
                    "Metric", "Type", "Severity", "Expected", "Actual"
                );
                println!("{:-<20}-|-{:-<18}-|-{:-<8}-|-{:->12}-|-{:->12}-|-{:-<20}", "", "", "", "", "", "");
                for a in &found {
                    println!(
                        "{:<20} | {:<18} | {:<8} | {:>12.4} | {:>12.4} | {}",
                        a.metric,
                        a.anomaly_type.to_string(),
                        a.severity.to_string(),
                        a.expected_value,
                        a.actual_value,
                        a.detected_at.to_rfc3339()
                    );
                }
            }
        }
        Commands::Warnings { hours, json } => {
            let range = lookback(hours)?;
            let engine = one_shot_engine(config)?;
            let warnings = engine.generate_early_warnings(range).await;

            if json {
                println!("{}", serde_json::to_string_pretty(&warnings)?);
            } else if warnings.is_empty() {
                println!("No early warnings.");
            } else {
                for w in &warnings {
                    let ttb = if w.time_to_breach.is_finite() {
                        format!("{:.0} min", w.time_to_breach)
                    } else {
                        "n/a".to_string()
                    };
                    println!("[{}] {} ({})", w.severity, w.title, ttb);
                    println!("    {}", w.description);
                    for action in &w.actions {
                        println!("    -> {} ({})", action.action, action.timeframe);
                    }
                }
            }
        }
    }

    Ok(())
}
