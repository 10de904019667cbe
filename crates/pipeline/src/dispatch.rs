//! Change-feed dispatcher.
//!
//! Every change event becomes its own task. A semaphore caps how many run at
//! once and each task is cut off after a deadline. A failing or timed-out
//! task is logged and counted; it never stops the loop or touches the write
//! that produced the event.
//!
//! The feed is unbounded. Tasks write to the store they are fed from (a
//! crossing inserts an alert, which publishes `AlertCreated`), so publishing
//! must not wait on this loop.

use std::sync::Arc;
use std::time::Duration;

use stockwatch_storage::{ChangeEvent, StockStore};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinError, JoinHandle, JoinSet};

use crate::orchestrator::Orchestrator;

/// Limits applied by [`run_dispatcher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Maximum number of events handled concurrently.
    pub max_in_flight: usize,
    /// Upper bound on the time spent handling one event.
    pub task_deadline: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_in_flight: 16,
            task_deadline: Duration::from_secs(60),
        }
    }
}

/// Create the channel connecting a store's change feed to [`run_dispatcher`].
pub fn change_feed() -> (
    mpsc::UnboundedSender<ChangeEvent>,
    mpsc::UnboundedReceiver<ChangeEvent>,
) {
    mpsc::unbounded_channel()
}

/// Counters reported when the dispatcher stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub received: u64,
    pub completed: u64,
    pub failed: u64,
    pub timed_out: u64,
}

enum TaskEnd {
    Completed,
    Failed,
    TimedOut,
}

impl DispatchStats {
    fn record(&mut self, joined: Result<TaskEnd, JoinError>) {
        match joined {
            Ok(TaskEnd::Completed) => self.completed += 1,
            Ok(TaskEnd::Failed) => self.failed += 1,
            Ok(TaskEnd::TimedOut) => self.timed_out += 1,
            Err(err) => {
                tracing::error!(error = %err, "change event task panicked");
                self.failed += 1;
            }
        }
    }
}

/// Handle events from `events` until every sender is dropped, then wait for
/// the tasks still in flight.
pub async fn run_dispatcher<S: StockStore>(
    orchestrator: Arc<Orchestrator<S>>,
    mut events: mpsc::UnboundedReceiver<ChangeEvent>,
    config: DispatchConfig,
) -> DispatchStats {
    let permits = Arc::new(Semaphore::new(config.max_in_flight.max(1)));
    let mut tasks = JoinSet::new();
    let mut stats = DispatchStats::default();

    tracing::info!(
        max_in_flight = config.max_in_flight,
        deadline_ms = config.task_deadline.as_millis() as u64,
        "dispatcher started"
    );

    while let Some(event) = events.recv().await {
        stats.received += 1;

        while let Some(joined) = tasks.try_join_next() {
            stats.record(joined);
        }

        let Ok(permit) = permits.clone().acquire_owned().await else {
            break;
        };
        let orchestrator = orchestrator.clone();
        let deadline = config.task_deadline;

        tasks.spawn(async move {
            let _permit = permit;
            let label = event.label();
            match tokio::time::timeout(deadline, orchestrator.handle(event)).await {
                Ok(Ok(outcome)) => {
                    tracing::debug!(event = label, ?outcome, "change event handled");
                    TaskEnd::Completed
                }
                Ok(Err(err)) => {
                    tracing::warn!(event = label, error = %err, "change event dropped");
                    TaskEnd::Failed
                }
                Err(_) => {
                    tracing::error!(
                        event = label,
                        deadline_ms = deadline.as_millis() as u64,
                        "change event exceeded its deadline"
                    );
                    TaskEnd::TimedOut
                }
            }
        });
    }

    while let Some(joined) = tasks.join_next().await {
        stats.record(joined);
    }

    tracing::info!(
        received = stats.received,
        completed = stats.completed,
        failed = stats.failed,
        timed_out = stats.timed_out,
        "dispatcher stopped"
    );
    stats
}

/// Spawn [`run_dispatcher`] on the current runtime.
pub fn spawn_dispatcher<S: StockStore>(
    orchestrator: Arc<Orchestrator<S>>,
    events: mpsc::UnboundedReceiver<ChangeEvent>,
    config: DispatchConfig,
) -> JoinHandle<DispatchStats> {
    tokio::spawn(run_dispatcher(orchestrator, events, config))
}
