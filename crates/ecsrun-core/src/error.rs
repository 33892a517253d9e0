//! Error type shared by the launcher, gates, and log streams.

use crate::scheduler::TaskCondition;

/// Errors surfaced to callers of `ecsrun-core`.
///
/// Collaborator traits ([`crate::Scheduler`], [`crate::LogStore`]) report
/// failures as `anyhow::Error`; the core wraps them here so consumers can
/// tell a rejected launch from a broken log stream.
#[derive(Debug, thiserror::Error)]
pub enum TailError {
    /// The scheduler returned no task for a run request.
    #[error("failed to launch task {task}: {failures}")]
    LaunchFailure { task: String, failures: String },

    /// The run request reported a call failure before any task existed.
    #[error("run task request for {task} failed")]
    LaunchRequest {
        task: String,
        #[source]
        source: anyhow::Error,
    },

    /// The scheduler response is missing fields it must carry.
    #[error("invalid response from scheduler: {0}")]
    InvalidResponse(String),

    /// The task ARN does not have the `arn:aws:ecs:<region>:<account>:task/<id>` shape.
    #[error("unsupported task ARN: {0}")]
    UnsupportedArn(String),

    /// A log store read failed. Fatal to the affected stream only.
    #[error("failed to read log stream {log_stream}")]
    RemoteRead {
        log_stream: String,
        #[source]
        source: anyhow::Error,
    },

    /// Waiting for a task condition failed.
    #[error("waiting for task {task_id} to reach {condition} failed")]
    Wait {
        condition: TaskCondition,
        task_id: String,
        #[source]
        source: anyhow::Error,
    },
}
