//! Periodic cycle scheduler.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{MissedTickBehavior, interval};

use super::cycle::CycleRunner;
use crate::error::AppError;

/// Runs a cycle every `interval` until shutdown.
pub struct Scheduler {
    runner: Arc<CycleRunner>,
    interval: Duration,
}

impl Scheduler {
    #[must_use]
    pub fn new(runner: Arc<CycleRunner>, interval: Duration) -> Self {
        Self { runner, interval }
    }

    /// Runs the scheduler loop. The first cycle starts immediately.
    ///
    /// Shutdown is observed between cycles and, through the runner, between
    /// postings of a running cycle.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        log::info!("Scheduler started (interval: {:?})", self.interval);

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        while !*shutdown.borrow() {
            tokio::select! {
                _ = ticker.tick() => self.tick(&shutdown).await,
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        log::info!("Scheduler shutting down");
    }

    async fn tick(&self, shutdown: &watch::Receiver<bool>) {
        match self.runner.run_once(shutdown).await {
            Ok(report) if report.new > 0 || !report.errored.is_empty() => {
                crate::utils::log::cycle_summary(&report);
            }
            Ok(_) => log::debug!("No new postings"),
            Err(AppError::CycleInProgress) => log::debug!("Previous cycle still running, skipping tick"),
            Err(e) => log::warn!("Cycle failed: {}", e),
        }
    }
}
