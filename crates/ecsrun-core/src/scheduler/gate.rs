//! One-shot waits on a launched task's status.

use std::sync::Arc;

use tracing::debug;

use super::{Scheduler, TaskCondition};
use crate::error::TailError;

/// Waits for a single task to become running or stopped.
///
/// Both waits may be awaited concurrently and more than once; each call
/// issues its own scheduler wait. No timeout is imposed here.
#[derive(Clone)]
pub struct TaskGate {
    scheduler: Arc<dyn Scheduler>,
    cluster: String,
    task_id: String,
}

impl std::fmt::Debug for TaskGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskGate")
            .field("scheduler", &self.scheduler.name())
            .field("cluster", &self.cluster)
            .field("task_id", &self.task_id)
            .finish()
    }
}

impl TaskGate {
    pub fn new(
        scheduler: Arc<dyn Scheduler>,
        cluster: impl Into<String>,
        task_id: impl Into<String>,
    ) -> Self {
        Self {
            scheduler,
            cluster: cluster.into(),
            task_id: task_id.into(),
        }
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub async fn wait_until_running(&self) -> Result<(), TailError> {
        self.wait(TaskCondition::Running).await
    }

    pub async fn wait_until_stopped(&self) -> Result<(), TailError> {
        self.wait(TaskCondition::Stopped).await
    }

    async fn wait(&self, condition: TaskCondition) -> Result<(), TailError> {
        debug!(task_id = %self.task_id, %condition, "waiting for task condition");
        self.scheduler
            .wait_for(condition, &self.cluster, &self.task_id)
            .await
            .map_err(|source| TailError::Wait {
                condition,
                task_id: self.task_id.clone(),
                source,
            })?;
        debug!(task_id = %self.task_id, %condition, "task reached condition");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::{RunTaskOutput, RunTaskRequest};
    use anyhow::{Result, bail};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records waits; fails the stopped wait.
    #[derive(Default)]
    struct RecordingScheduler {
        waits: Mutex<Vec<(TaskCondition, String, String)>>,
    }

    #[async_trait]
    impl Scheduler for RecordingScheduler {
        fn name(&self) -> &str {
            "recording"
        }

        async fn run_task(&self, _request: &RunTaskRequest) -> Result<RunTaskOutput> {
            Ok(RunTaskOutput::default())
        }

        async fn wait_for(&self, condition: TaskCondition, cluster: &str, task_id: &str) -> Result<()> {
            self.waits
                .lock()
                .unwrap()
                .push((condition, cluster.to_string(), task_id.to_string()));
            if condition == TaskCondition::Stopped {
                bail!("waiter exceeded max attempts");
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn running_wait_passes_cluster_and_task() {
        let scheduler = Arc::new(RecordingScheduler::default());
        let gate = TaskGate::new(scheduler.clone(), "prod", "abc123");

        gate.wait_until_running().await.unwrap();

        let waits = scheduler.waits.lock().unwrap().clone();
        assert_eq!(
            waits,
            vec![(TaskCondition::Running, "prod".to_string(), "abc123".to_string())]
        );
    }

    #[tokio::test]
    async fn failed_wait_maps_to_wait_error() {
        let gate = TaskGate::new(Arc::new(RecordingScheduler::default()), "prod", "abc123");

        let err = gate.wait_until_stopped().await.unwrap_err();
        match err {
            TailError::Wait {
                condition, task_id, ..
            } => {
                assert_eq!(condition, TaskCondition::Stopped);
                assert_eq!(task_id, "abc123");
            }
            other => panic!("expected Wait error, got {other:?}"),
        }
    }
}
