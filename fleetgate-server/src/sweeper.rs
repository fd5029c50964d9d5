//! Background sweeper for expired counters and cache entries
//!
//! The sweeper is started with the service and stopped with it. Stopping
//! is deterministic: [`SweeperHandle::shutdown`] returns only after the
//! task has exited.

use crate::config::MAX_SWEEP_INTERVAL_SECS;
use crate::metrics::Metrics;
use fleetgate::{Sweep, SweepReport, sweep_all};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

const MIN_INTERVAL: Duration = Duration::from_secs(1);
const MAX_INTERVAL: Duration = Duration::from_secs(MAX_SWEEP_INTERVAL_SECS);

/// Recurring eviction pass over a fixed set of stores
pub struct Sweeper {
    targets: Vec<Arc<dyn Sweep>>,
    interval: Duration,
    metrics: Arc<Metrics>,
}

/// Handle to a running sweeper task
pub struct SweeperHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl Sweeper {
    /// `interval` is clamped to between one second and one day
    pub fn new(targets: Vec<Arc<dyn Sweep>>, interval: Duration, metrics: Arc<Metrics>) -> Self {
        let clamped = interval.clamp(MIN_INTERVAL, MAX_INTERVAL);
        if clamped != interval {
            tracing::warn!(
                requested_secs = interval.as_secs(),
                interval_secs = clamped.as_secs(),
                "sweep interval out of range, clamped"
            );
        }

        Sweeper {
            targets,
            interval: clamped,
            metrics,
        }
    }

    /// Sweep every target once, right now
    pub fn sweep_now(&self) -> SweepReport {
        let report = sweep_all(&self.targets, SystemTime::now());
        self.metrics.record_sweep(&report);

        for outcome in report.outcomes.iter().filter(|o| o.removed > 0) {
            tracing::debug!(
                store = %outcome.name,
                removed = outcome.removed,
                remaining = outcome.remaining,
                "swept expired entries"
            );
        }
        report
    }

    /// Start sweeping every `interval`, first sweep one interval from now
    pub fn spawn(self) -> SweeperHandle {
        let token = CancellationToken::new();
        let child = token.clone();

        let task = tokio::spawn(async move {
            tracing::info!(
                interval_secs = self.interval.as_secs(),
                stores = self.targets.len(),
                "sweeper started"
            );

            let start = Instant::now() + self.interval;
            let mut ticker = tokio::time::interval_at(start, self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = child.cancelled() => break,
                    _ = ticker.tick() => {
                        self.sweep_now();
                    }
                }
            }

            tracing::info!("sweeper stopped");
        });

        SweeperHandle { token, task }
    }
}

impl SweeperHandle {
    /// Stop the sweeper and wait for its task to exit
    pub async fn shutdown(self) {
        self.token.cancel();
        if let Err(e) = self.task.await {
            tracing::error!("sweeper task panicked: {}", e);
        }
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}
