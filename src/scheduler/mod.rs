//! Background passes: anomaly detection and early warnings on independent
//! fixed intervals.

pub mod engine;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::engine::Engine;

pub use self::engine::{run_detection_loop, run_periodic, run_warning_loop};

/// Owns the interval settings for both loops. Call [`Scheduler::spawn`] once.
#[derive(Clone)]
pub struct Scheduler {
    engine: Arc<Engine>,
    detection_interval: Duration,
    warning_interval: Duration,
}

impl Scheduler {
    /// Intervals come from the engine's configuration
    /// (`detection.interval_secs`, `warnings.interval_secs`).
    pub fn new(engine: Arc<Engine>) -> Self {
        let detection_interval = engine.config().detection.interval();
        let warning_interval = engine.config().warnings.interval();
        Self {
            engine,
            detection_interval,
            warning_interval,
        }
    }

    pub fn with_intervals(mut self, detection: Duration, warnings: Duration) -> Self {
        self.detection_interval = detection;
        self.warning_interval = warnings;
        self
    }

    pub fn spawn(self) -> SchedulerHandle {
        let (shutdown, rx) = watch::channel(false);
        let detection = tokio::spawn(run_detection_loop(
            self.engine.clone(),
            self.detection_interval,
            rx.clone(),
        ));
        let warnings = tokio::spawn(run_warning_loop(self.engine, self.warning_interval, rx));
        SchedulerHandle {
            shutdown,
            detection,
            warnings,
        }
    }
}

/// Handle to the two running loops.
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    detection: JoinHandle<()>,
    warnings: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Signal both loops and wait for any in-flight pass to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for (name, task) in [("detection", self.detection), ("warnings", self.warnings)] {
            if let Err(e) = task.await {
                tracing::error!(loop_name = name, error = %e, "Scheduler loop terminated abnormally");
            }
        }
    }
}
