//! Binds one launched task to one log tail.
//!
//! A session waits for the task to run, tails its log stream, and closes
//! the tail once the task stops. The stop wait runs as its own tokio task
//! and reaches the tail only through a [`TailCloser`]; a session-scoped
//! [`CancellationToken`] stops the watcher when the consumer goes away.

use std::sync::Arc;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::launcher::TaskHandle;
use crate::logs::tail::{LogTail, TailCloser, TailConfig};
use crate::logs::{LogRecordStream, LogStore, LogTarget};
use crate::scheduler::Scheduler;
use crate::scheduler::gate::TaskGate;

/// Log session for a single task.
pub struct TaskLogSession {
    gate: TaskGate,
    store: Arc<dyn LogStore>,
    target: LogTarget,
    config: TailConfig,
}

impl std::fmt::Debug for TaskLogSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskLogSession")
            .field("gate", &self.gate)
            .field("store", &self.store.name())
            .field("target", &self.target)
            .field("config", &self.config)
            .finish()
    }
}

impl TaskLogSession {
    pub fn new(
        gate: TaskGate,
        store: Arc<dyn LogStore>,
        target: LogTarget,
        config: TailConfig,
    ) -> Self {
        Self {
            gate,
            store,
            target,
            config,
        }
    }

    /// Build a session for a launched task and open it.
    pub fn open_for(
        scheduler: Arc<dyn Scheduler>,
        store: Arc<dyn LogStore>,
        handle: &TaskHandle,
        target: LogTarget,
        config: &TailConfig,
    ) -> LogRecordStream {
        let gate = TaskGate::new(scheduler, handle.cluster.clone(), handle.task_id.clone());
        Self::new(gate, store, target, config.clone()).open()
    }

    /// Start the session.
    ///
    /// Nothing is yielded before the task is running. If it never gets
    /// there the stream stays pending; callers that need a bound must add
    /// their own timeout. A failed running wait is yielded as the only
    /// item. A task that stops before the first poll completes yields an
    /// empty stream.
    pub fn open(self) -> LogRecordStream {
        let TaskLogSession {
            gate,
            store,
            target,
            config,
        } = self;

        let stream = async_stream::stream! {
            if let Err(e) = gate.wait_until_running().await {
                yield Err(e);
                return;
            }

            info!(task_id = %gate.task_id(), log_stream = %target, "task running, tailing logs");

            let tail = LogTail::new(store, target.clone(), &config);
            let session_done = CancellationToken::new();
            let _watcher_guard = session_done.clone().drop_guard();
            tokio::spawn(watch_for_stop(gate.clone(), tail.close_handle(), session_done));

            let mut records = tail.into_stream();
            let mut delivered: u64 = 0;
            while let Some(item) = records.next().await {
                if item.is_ok() {
                    delivered += 1;
                }
                yield item;
            }

            info!(task_id = %gate.task_id(), records = delivered, "log session ended");
        };

        Box::pin(stream)
    }
}

/// Close the tail once the task stops.
///
/// A failed stop wait has no consumer to report to, so it is logged and
/// the tail keeps running.
async fn watch_for_stop(gate: TaskGate, closer: TailCloser, session_done: CancellationToken) {
    tokio::select! {
        _ = session_done.cancelled() => {
            debug!(task_id = %gate.task_id(), "session finished before task stopped");
        }
        result = gate.wait_until_stopped() => match result {
            Ok(()) => {
                debug!(task_id = %gate.task_id(), "task stopped, closing log tail");
                closer.close();
            }
            Err(e) => {
                warn!(task_id = %gate.task_id(), error = %e, "stop watcher failed, log tail left open");
            }
        }
    }
}
