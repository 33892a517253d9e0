//! ECS scheduler over `aws ecs run-task` and `aws ecs wait`.

use anyhow::{Context, Result};
use async_trait::async_trait;

use super::AwsCli;
use crate::scheduler::{RunTaskOutput, RunTaskRequest, Scheduler, TaskCondition};

/// [`Scheduler`] backed by the `aws` CLI.
#[derive(Debug, Clone)]
pub struct AwsCliScheduler {
    cli: AwsCli,
}

impl AwsCliScheduler {
    pub fn new(cli: AwsCli) -> Self {
        Self { cli }
    }
}

/// Arguments for `aws ecs run-task`.
fn run_task_args(request: &RunTaskRequest) -> Result<Vec<String>> {
    let network = serde_json::to_string(&request.network_configuration)
        .context("failed to encode network configuration")?;
    let overrides =
        serde_json::to_string(&request.overrides).context("failed to encode task overrides")?;

    Ok(vec![
        "ecs".to_string(),
        "run-task".to_string(),
        "--cluster".to_string(),
        request.cluster.clone(),
        "--task-definition".to_string(),
        request.task_definition.clone(),
        "--launch-type".to_string(),
        request.launch_type.clone(),
        "--network-configuration".to_string(),
        network,
        "--overrides".to_string(),
        overrides,
    ])
}

/// Arguments for `aws ecs wait tasks-running|tasks-stopped`.
fn wait_args(condition: TaskCondition, cluster: &str, task_id: &str) -> Vec<String> {
    vec![
        "ecs".to_string(),
        "wait".to_string(),
        condition.waiter_name().to_string(),
        "--cluster".to_string(),
        cluster.to_string(),
        "--tasks".to_string(),
        task_id.to_string(),
    ]
}

#[async_trait]
impl Scheduler for AwsCliScheduler {
    fn name(&self) -> &str {
        "aws-cli"
    }

    async fn run_task(&self, request: &RunTaskRequest) -> Result<RunTaskOutput> {
        self.cli.run_json(&run_task_args(request)?).await
    }

    async fn wait_for(&self, condition: TaskCondition, cluster: &str, task_id: &str) -> Result<()> {
        self.cli
            .run(&wait_args(condition, cluster, task_id))
            .await
            .with_context(|| format!("task {task_id} did not become {condition}"))?;
        Ok(())
    }
}
