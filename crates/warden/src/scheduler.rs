//! Fixed-period background ticking.
//!
//! The scheduler awaits each tick before waiting for the next one, so two
//! ticks of the same task never run at once. A tick that overruns its period
//! causes the missed firings to be skipped rather than queued.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use warden_directory::DirectoryClient;
use warden_store::GrantStore;

use crate::reconciler::GrantReconciler;

/// Periodic work driven by a [`Scheduler`].
#[async_trait]
pub trait Tick: Send + Sync + 'static {
    async fn tick(&self);
}

#[async_trait]
impl<S, D> Tick for GrantReconciler<S, D>
where
    S: GrantStore + ?Sized + 'static,
    D: DirectoryClient + ?Sized + 'static,
{
    async fn tick(&self) {
        match self.run_once().await {
            Ok(report) if report.expired > 0 => {
                tracing::info!(
                    expired = report.expired,
                    revoked = report.revoked,
                    revoke_failures = report.revoke_failures,
                    deleted = report.deleted,
                    "reconciled expired grants"
                );
            }
            Ok(_) => {}
            Err(e) => tracing::error!(error = %e, "reconciliation pass failed"),
        }
    }
}

/// Runs a [`Tick`] every `period` until told to stop.
pub struct Scheduler<T: ?Sized> {
    task: Arc<T>,
    period: Duration,
}

impl<T: Tick + ?Sized> Scheduler<T> {
    /// `period` must be non-zero.
    pub fn new(task: Arc<T>, period: Duration) -> Self {
        Self { task, period }
    }

    /// Drive the task until `shutdown` flips to `true` or its sender drops.
    ///
    /// The first tick fires immediately.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = interval.tick() => self.task.tick().await,
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        tracing::debug!("scheduler stopped");
    }

    /// Run on the current tokio runtime.
    pub fn spawn(self) -> SchedulerHandle {
        let (tx, rx) = watch::channel(false);
        let join = tokio::spawn(self.run(rx));
        SchedulerHandle { shutdown: tx, join }
    }
}

/// Handle to a spawned [`Scheduler`].
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stop ticking and wait for an in-flight tick to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.join.await {
            tracing::error!(error = %e, "scheduler task panicked");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}
