//! Poll scheduler service implementation.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashSet;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::domain::BroadcasterHandle;
use crate::monitor::StreamMonitor;
use crate::{Error, Result};

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Time between ticks.
    pub poll_interval: Duration,
    /// Broadcasters processed at the same time.
    pub max_concurrent_checks: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
            max_concurrent_checks: 8,
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(Error::config("poll interval must be greater than zero"));
        }
        if self.max_concurrent_checks == 0 {
            return Err(Error::config("max concurrent checks must be at least 1"));
        }
        Ok(())
    }
}

/// What one tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Broadcasters a task was started for.
    pub spawned: usize,
    /// Broadcasters skipped because the previous check was still running.
    pub skipped: usize,
}

/// Removes a broadcaster from the in-flight set when its task ends, however
/// it ends.
struct InFlightGuard {
    in_flight: Arc<DashSet<BroadcasterHandle>>,
    handle: BroadcasterHandle,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.remove(&self.handle);
    }
}

/// The top-level driver.
pub struct Scheduler {
    monitor: Arc<StreamMonitor>,
    config: SchedulerConfig,
    in_flight: Arc<DashSet<BroadcasterHandle>>,
    permits: Arc<Semaphore>,
    cancellation: CancellationToken,
}

impl Scheduler {
    pub fn new(
        monitor: Arc<StreamMonitor>,
        config: SchedulerConfig,
        cancellation: CancellationToken,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            monitor,
            permits: Arc::new(Semaphore::new(config.max_concurrent_checks)),
            config,
            in_flight: Arc::new(DashSet::new()),
            cancellation,
        })
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Tick until cancelled, then wait for in-flight checks to finish.
    pub async fn run(&self) {
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut tasks = JoinSet::new();

        info!(
            poll_interval = ?self.config.poll_interval,
            max_concurrent_checks = self.config.max_concurrent_checks,
            "Scheduler started"
        );

        loop {
            tokio::select! {
                biased;

                _ = self.cancellation.cancelled() => break,

                _ = ticker.tick() => {
                    reap(&mut tasks);
                    self.tick(&mut tasks).await;
                }
            }
        }

        info!(in_flight = tasks.len(), "Scheduler stopping, waiting for in-flight checks");
        drain(&mut tasks).await;
        info!("Scheduler stopped");
    }

    /// Run a single tick and wait for every check it started.
    pub async fn run_once(&self) -> TickReport {
        let mut tasks = JoinSet::new();
        let report = self.tick(&mut tasks).await;
        drain(&mut tasks).await;
        report
    }

    /// Start a check task for every subscribed broadcaster not already in
    /// flight. Returns without waiting for the checks.
    pub async fn tick(&self, tasks: &mut JoinSet<()>) -> TickReport {
        let mut report = TickReport::default();

        let broadcasters = match self.monitor.list_broadcasters().await {
            Ok(broadcasters) => broadcasters,
            Err(e) => {
                warn!(error = %e, "Failed to list broadcasters, skipping tick");
                return report;
            }
        };

        match self.monitor.prune_orphaned().await {
            Ok(0) => {}
            Ok(pruned) => debug!(pruned, "Pruned orphaned liveness records"),
            Err(e) => warn!(error = %e, "Failed to prune orphaned liveness records"),
        }

        for handle in broadcasters {
            if !self.in_flight.insert(handle.clone()) {
                debug!(broadcaster = %handle, "Previous check still running, skipping");
                report.skipped += 1;
                continue;
            }

            let guard = InFlightGuard {
                in_flight: self.in_flight.clone(),
                handle: handle.clone(),
            };
            let monitor = self.monitor.clone();
            let permits = self.permits.clone();

            tasks.spawn(async move {
                let _guard = guard;
                let Ok(_permit) = permits.acquire_owned().await else {
                    return;
                };
                if let Err(e) = monitor.process_broadcaster(&handle).await {
                    warn!(broadcaster = %handle, error = %e, "Broadcaster check aborted");
                }
            });
            report.spawned += 1;
        }

        debug!(
            spawned = report.spawned,
            skipped = report.skipped,
            "Tick dispatched"
        );
        report
    }
}

/// Collect finished tasks without waiting.
fn reap(tasks: &mut JoinSet<()>) {
    while let Some(result) = tasks.try_join_next() {
        log_join_error(result);
    }
}

async fn drain(tasks: &mut JoinSet<()>) {
    while let Some(result) = tasks.join_next().await {
        log_join_error(result);
    }
}

fn log_join_error(result: std::result::Result<(), tokio::task::JoinError>) {
    if let Err(e) = result
        && e.is_panic()
    {
        error!(error = %e, "Broadcaster check panicked");
    }
}
