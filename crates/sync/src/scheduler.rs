//! Cadence scheduler.
//!
//! One ticker per fixed cadence plus a due-check ticker for each
//! connection's own interval sync. Every tick fans out one task per eligible
//! connection into a shared [`JoinSet`]; a [`Semaphore`] bounds how many
//! runs are in flight across all cadences. Leases are per connection and
//! kind, so cadences that tick together all run; each run has its own
//! timeout, so a slow or failing connection never holds up the others.

use std::sync::Arc;

use chrono::Utc;
use staysync_core::cadence::SyncKind;
use staysync_core::sync_error::{SyncError, SyncResult};
use staysync_core::types::DbId;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::runner::{RunOutcome, SyncRunner};
use crate::store::SyncStore;

/// Connection, kind and result of one scheduled run.
pub type RunResult = (DbId, SyncKind, SyncResult<RunOutcome>);

pub struct Scheduler {
    runner: Arc<SyncRunner>,
    store: Arc<dyn SyncStore>,
    permits: Arc<Semaphore>,
}

impl Scheduler {
    pub fn new(runner: Arc<SyncRunner>, store: Arc<dyn SyncStore>) -> Self {
        let permits = Arc::new(Semaphore::new(runner.config().max_in_flight.max(1)));
        Self {
            runner,
            store,
            permits,
        }
    }

    /// Run the scheduler loop until the cancellation token is triggered,
    /// then wait for in-flight runs to finish.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut short = cadence_ticker(SyncKind::ShortHorizonPricing);
        let mut long = cadence_ticker(SyncKind::LongHorizonPricing);
        let mut backup = cadence_ticker(SyncKind::AvailabilityBackup);
        let mut due = interval(self.runner.config().due_check_interval);
        due.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut tasks: JoinSet<RunResult> = JoinSet::new();
        tracing::info!(
            max_in_flight = self.runner.config().max_in_flight,
            "Sync scheduler started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!(in_flight = tasks.len(), "Sync scheduler shutting down");
                    break;
                }
                _ = short.tick() => self.dispatch(SyncKind::ShortHorizonPricing, &mut tasks).await,
                _ = long.tick() => self.dispatch(SyncKind::LongHorizonPricing, &mut tasks).await,
                _ = backup.tick() => self.dispatch(SyncKind::AvailabilityBackup, &mut tasks).await,
                _ = due.tick() => self.dispatch_due(&mut tasks).await,
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => report(joined),
            }
        }

        while let Some(joined) = tasks.join_next().await {
            report(joined);
        }
        tracing::info!("Sync scheduler stopped");
    }

    /// Run `kind` once for every schedulable connection and wait for all runs.
    pub async fn run_cadence(&self, kind: SyncKind) -> Vec<RunResult> {
        let mut tasks = JoinSet::new();
        self.dispatch(kind, &mut tasks).await;
        let mut results = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(e) => tracing::error!(error = %e, "Sync task panicked"),
            }
        }
        results
    }

    async fn dispatch(&self, kind: SyncKind, tasks: &mut JoinSet<RunResult>) {
        match self.store.schedulable_connections().await {
            Ok(connections) => {
                tracing::debug!(kind = %kind, connections = connections.len(), "Dispatching cadence");
                for connection in connections {
                    self.spawn(connection.id, kind, tasks);
                }
            }
            Err(e) => tracing::error!(kind = %kind, error = %e, "Failed to list schedulable connections"),
        }
    }

    async fn dispatch_due(&self, tasks: &mut JoinSet<RunResult>) {
        match self.store.due_connections(Utc::now()).await {
            Ok(connections) => {
                for connection in connections {
                    self.spawn(connection.id, SyncKind::Incremental, tasks);
                }
            }
            Err(e) => tracing::error!(error = %e, "Failed to list due connections"),
        }
    }

    fn spawn(&self, connection_id: DbId, kind: SyncKind, tasks: &mut JoinSet<RunResult>) {
        let runner = Arc::clone(&self.runner);
        let permits = Arc::clone(&self.permits);
        tasks.spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return (connection_id, kind, Err(SyncError::unknown("Scheduler is shutting down")));
            };
            (connection_id, kind, runner.run(connection_id, kind).await)
        });
    }
}

/// Fixed-cadence ticker whose first tick is one period from now.
fn cadence_ticker(kind: SyncKind) -> tokio::time::Interval {
    let period = kind
        .cadence()
        .unwrap_or(std::time::Duration::from_secs(24 * 60 * 60));
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

fn report(joined: Result<RunResult, tokio::task::JoinError>) {
    match joined {
        Ok((connection_id, kind, Err(e))) => {
            tracing::error!(connection_id, kind = %kind, error = %e, "Sync run could not start");
        }
        Ok((connection_id, kind, Ok(RunOutcome::Skipped(reason)))) => {
            tracing::info!(connection_id, kind = %kind, reason = ?reason, "Sync run skipped");
        }
        Ok(_) => {}
        Err(e) => tracing::error!(error = %e, "Sync task panicked"),
    }
}
