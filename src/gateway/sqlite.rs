use rusqlite::params;
use tracing::debug;

use super::{GatewayError, MetricGateway, MetricSample, TimeRange};
use crate::storage::{decode_timestamp, encode_timestamp, Pool};

/// Reads samples from the `metric_samples` table.
#[derive(Clone)]
pub struct SqliteGateway {
    pool: Pool,
}

impl SqliteGateway {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl MetricGateway for SqliteGateway {
    async fn recent_samples(
        &self,
        metric: &str,
        range: TimeRange,
    ) -> Result<Vec<MetricSample>, GatewayError> {
        let pool = self.pool.clone();
        let metric = metric.to_string();

        // rusqlite is blocking; keep it off the runtime threads
        let samples = tokio::task::spawn_blocking(move || -> Result<Vec<MetricSample>, GatewayError> {
            let conn = pool.get()?;
            let mut stmt = conn.prepare(
                "SELECT recorded_at, value FROM metric_samples
                 WHERE metric = ?1
                 AND recorded_at >= ?2
                 AND recorded_at < ?3
                 ORDER BY recorded_at ASC",
            )?;

            let rows = stmt.query_map(
                params![metric, encode_timestamp(range.start), encode_timestamp(range.end)],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?)),
            )?;

            let mut samples = Vec::new();
            for r in rows {
                let (raw, value) = r?;
                match decode_timestamp(&raw) {
                    Some(timestamp) => samples.push(MetricSample { timestamp, value }),
                    None => debug!(metric = %metric, raw = %raw, "Skipping sample with unparseable timestamp"),
                }
            }
            Ok(samples)
        })
        .await??;

        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{open_pool, save_sample};
    use chrono::{Duration, TimeZone, Utc};

    #[tokio::test]
    async fn test_reads_only_requested_metric_and_range() {
        let dir = tempfile::tempdir().unwrap();
        let pool = open_pool(dir.path().join("gw.db").to_str().unwrap()).unwrap();

        let t0 = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        for h in 0..5 {
            save_sample(&pool, "storage", h as f64, t0 + Duration::hours(h)).unwrap();
        }
        save_sample(&pool, "compute", 99.0, t0).unwrap();

        let gateway = SqliteGateway::new(pool);
        let range = TimeRange::new(t0 + Duration::hours(1), t0 + Duration::hours(4));
        let samples = gateway.recent_samples("storage", range).await.unwrap();

        let values: Vec<f64> = samples.iter().map(|s| s.value).collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0]);
        assert_eq!(samples[0].timestamp, t0 + Duration::hours(1));
    }
}
