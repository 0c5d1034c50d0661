use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::engine::{Engine, PassReport};

/// Drive `pass` every `period` until `shutdown` flips to true.
///
/// Passes run one at a time on this task: a tick that fires while a pass is
/// still running is skipped, not queued. Shutdown is only observed between
/// passes, so an in-flight pass always completes.
pub async fn run_periodic<F, Fut>(name: &'static str, period: Duration, mut shutdown: watch::Receiver<bool>, mut pass: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = PassReport>,
{
    info!(loop_name = name, period_secs = period.as_secs_f64(), "Scheduler loop started");

    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
        }
        if *shutdown.borrow() {
            break;
        }

        let started = Instant::now();
        let report = pass().await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        if report.failed > 0 {
            warn!(
                loop_name = name,
                evaluated = report.evaluated,
                failed = report.failed,
                stored = report.stored,
                elapsed_ms,
                "Pass finished with failures"
            );
        } else {
            debug!(
                loop_name = name,
                evaluated = report.evaluated,
                stored = report.stored,
                elapsed_ms,
                "Pass finished"
            );
        }
    }

    info!(loop_name = name, "Scheduler loop stopped");
}

/// Detection loop: every configured metric through windowing, the three
/// detectors and the store.
pub async fn run_detection_loop(engine: Arc<Engine>, period: Duration, shutdown: watch::Receiver<bool>) {
    run_periodic("detection", period, shutdown, || {
        let engine = engine.clone();
        async move { engine.detect_all().await }
    })
    .await;
}

/// Warning loop: the four early-warning checks.
pub async fn run_warning_loop(engine: Arc<Engine>, period: Duration, shutdown: watch::Receiver<bool>) {
    run_periodic("warnings", period, shutdown, || {
        let engine = engine.clone();
        async move { engine.warning_pass(None).await.1 }
    })
    .await;
}
