//! Cluster scheduler interface.
//!
//! The [`Scheduler`] trait covers the two calls the core needs from ECS:
//! starting a task and waiting for it to reach a condition. Request and
//! response types mirror the ECS `RunTask` JSON shapes so the `aws` CLI
//! backend can (de)serialize them directly.

pub mod gate;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A task condition the scheduler can wait for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskCondition {
    Running,
    Stopped,
}

impl TaskCondition {
    /// Name of the matching `aws ecs wait` subcommand.
    pub fn waiter_name(&self) -> &'static str {
        match self {
            TaskCondition::Running => "tasks-running",
            TaskCondition::Stopped => "tasks-stopped",
        }
    }
}

impl std::fmt::Display for TaskCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskCondition::Running => f.write_str("running"),
            TaskCondition::Stopped => f.write_str("stopped"),
        }
    }
}

/// `awsvpcConfiguration` block of a run request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AwsVpcConfiguration {
    pub subnets: Vec<String>,
    pub security_groups: Vec<String>,
    /// `"ENABLED"` or `"DISABLED"`.
    pub assign_public_ip: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfiguration {
    pub awsvpc_configuration: AwsVpcConfiguration,
}

/// Command override for one container of the task definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerOverride {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskOverride {
    pub container_overrides: Vec<ContainerOverride>,
}

/// A single `RunTask` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunTaskRequest {
    pub cluster: String,
    pub task_definition: String,
    pub launch_type: String,
    pub network_configuration: NetworkConfiguration,
    pub overrides: TaskOverride,
}

/// A task entry in a `RunTask` response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchedTask {
    #[serde(default)]
    pub task_arn: Option<String>,
    #[serde(default)]
    pub last_status: Option<String>,
}

/// A failure entry in a `RunTask` response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunTaskFailure {
    #[serde(default)]
    pub arn: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
}

/// Parsed `RunTask` response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunTaskOutput {
    #[serde(default)]
    pub tasks: Vec<LaunchedTask>,
    #[serde(default)]
    pub failures: Vec<RunTaskFailure>,
}

/// Remote cluster scheduler.
///
/// Object-safe so it can be stored as `Arc<dyn Scheduler>` and shared by
/// the launcher, the gates, and background stop watchers.
#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Human-readable backend name (e.g. "aws-cli").
    fn name(&self) -> &str;

    /// Issue one run request. No retries.
    async fn run_task(&self, request: &RunTaskRequest) -> Result<RunTaskOutput>;

    /// Suspend until `task_id` in `cluster` reaches `condition`.
    ///
    /// Retry and timeout policy belong to the implementation.
    async fn wait_for(&self, condition: TaskCondition, cluster: &str, task_id: &str) -> Result<()>;
}

const _: () = {
    fn _assert_object_safe(_: &dyn Scheduler) {}
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_task_request_serializes_in_ecs_shape() {
        let request = RunTaskRequest {
            cluster: "default".to_string(),
            task_definition: "hello-world".to_string(),
            launch_type: "FARGATE".to_string(),
            network_configuration: NetworkConfiguration {
                awsvpc_configuration: AwsVpcConfiguration {
                    subnets: vec!["subnet-1".to_string()],
                    security_groups: vec!["sg-1".to_string()],
                    assign_public_ip: "DISABLED".to_string(),
                },
            },
            overrides: TaskOverride {
                container_overrides: vec![ContainerOverride {
                    name: "hello-world".to_string(),
                    command: None,
                }],
            },
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["taskDefinition"], "hello-world");
        assert_eq!(
            json["networkConfiguration"]["awsvpcConfiguration"]["assignPublicIp"],
            "DISABLED"
        );
        assert_eq!(
            json["overrides"]["containerOverrides"][0],
            serde_json::json!({"name": "hello-world"})
        );
    }

    #[test]
    fn run_task_output_tolerates_missing_fields() {
        let output: RunTaskOutput = serde_json::from_str(
            r#"{"tasks":[{"taskArn":"arn:aws:ecs:us-east-1:1:task/abc","cpu":"256"}]}"#,
        )
        .unwrap();
        assert_eq!(output.tasks.len(), 1);
        assert!(output.failures.is_empty());
        assert_eq!(
            output.tasks[0].task_arn.as_deref(),
            Some("arn:aws:ecs:us-east-1:1:task/abc")
        );
    }

    #[test]
    fn condition_waiter_names() {
        assert_eq!(TaskCondition::Running.waiter_name(), "tasks-running");
        assert_eq!(TaskCondition::Stopped.waiter_name(), "tasks-stopped");
        assert_eq!(TaskCondition::Stopped.to_string(), "stopped");
    }
}
