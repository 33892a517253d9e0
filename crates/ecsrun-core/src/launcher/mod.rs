//! One-shot task launch.
//!
//! [`TaskLauncher::launch`] turns [`LaunchOptions`] into a `RunTask`
//! request, validates the response, and returns a [`TaskHandle`]. Log
//! sessions for the launched task are opened with
//! [`TaskLauncher::open_logs`].

pub mod arn;

use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::TailError;
use crate::logs::tail::TailConfig;
use crate::logs::{LogRecordStream, LogStore, LogTarget};
use crate::scheduler::{
    AwsVpcConfiguration, ContainerOverride, NetworkConfiguration, RunTaskRequest, Scheduler,
    TaskOverride,
};
use crate::session::TaskLogSession;

/// Capacity provider for a launched task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LaunchType {
    #[default]
    Fargate,
    Ec2,
}

impl LaunchType {
    /// Value sent as `launchType` in the run request.
    pub fn as_str(&self) -> &'static str {
        match self {
            LaunchType::Fargate => "FARGATE",
            LaunchType::Ec2 => "EC2",
        }
    }
}

impl std::fmt::Display for LaunchType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LaunchType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fargate" => Ok(LaunchType::Fargate),
            "ec2" => Ok(LaunchType::Ec2),
            other => Err(format!(
                "unknown launch type {other:?} (expected \"fargate\" or \"ec2\")"
            )),
        }
    }
}

/// Where a task definition's awslogs driver writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    pub log_group_name: String,
    pub log_stream_prefix: String,
}

impl LogConfig {
    /// Log stream for a launched task: `<prefix>/<container>/<task id>`.
    ///
    /// The container is named after the task definition.
    pub fn target_for(&self, handle: &TaskHandle) -> LogTarget {
        LogTarget::new(
            self.log_group_name.clone(),
            format!(
                "{}/{}/{}",
                self.log_stream_prefix, handle.task_name, handle.task_id
            ),
        )
    }
}

/// Everything needed to launch one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchOptions {
    pub cluster: String,
    /// Task definition family; also the name of the overridden container.
    pub task_name: String,
    /// Command override. Empty keeps the task definition's command.
    pub args: Vec<String>,
    pub launch_type: LaunchType,
    pub region: String,
    pub subnet_id: String,
    pub security_group_id: String,
    pub assign_public_ip: bool,
    pub logs: Option<LogConfig>,
}

impl LaunchOptions {
    pub const DEFAULT_CLUSTER: &str = "default";

    pub fn new(
        task_name: impl Into<String>,
        region: impl Into<String>,
        subnet_id: impl Into<String>,
        security_group_id: impl Into<String>,
    ) -> Self {
        Self {
            cluster: Self::DEFAULT_CLUSTER.to_string(),
            task_name: task_name.into(),
            args: Vec::new(),
            launch_type: LaunchType::default(),
            region: region.into(),
            subnet_id: subnet_id.into(),
            security_group_id: security_group_id.into(),
            assign_public_ip: false,
            logs: None,
        }
    }

    /// Build the `RunTask` request for these options.
    pub fn to_request(&self) -> RunTaskRequest {
        RunTaskRequest {
            cluster: self.cluster.clone(),
            task_definition: self.task_name.clone(),
            launch_type: self.launch_type.as_str().to_string(),
            network_configuration: NetworkConfiguration {
                awsvpc_configuration: AwsVpcConfiguration {
                    subnets: vec![self.subnet_id.clone()],
                    security_groups: vec![self.security_group_id.clone()],
                    assign_public_ip: if self.assign_public_ip {
                        "ENABLED".to_string()
                    } else {
                        "DISABLED".to_string()
                    },
                },
            },
            overrides: TaskOverride {
                container_overrides: vec![ContainerOverride {
                    name: self.task_name.clone(),
                    command: (!self.args.is_empty()).then(|| self.args.clone()),
                }],
            },
        }
    }
}

/// A launched task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskHandle {
    pub task_id: String,
    pub task_url: String,
    pub task_arn: String,
    pub cluster: String,
    pub task_name: String,
    /// Log destination copied from [`LaunchOptions::logs`].
    pub logs: Option<LogConfig>,
}

/// Launches tasks and opens their log sessions.
#[derive(Clone)]
pub struct TaskLauncher {
    scheduler: Arc<dyn Scheduler>,
    store: Arc<dyn LogStore>,
    tail_config: TailConfig,
}

impl std::fmt::Debug for TaskLauncher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskLauncher")
            .field("scheduler", &self.scheduler.name())
            .field("store", &self.store.name())
            .field("tail_config", &self.tail_config)
            .finish()
    }
}

impl TaskLauncher {
    pub fn new(scheduler: Arc<dyn Scheduler>, store: Arc<dyn LogStore>) -> Self {
        Self {
            scheduler,
            store,
            tail_config: TailConfig::default(),
        }
    }

    pub fn with_tail_config(mut self, tail_config: TailConfig) -> Self {
        self.tail_config = tail_config;
        self
    }

    /// Issue one run request and validate the response.
    ///
    /// Fails with [`TailError::LaunchFailure`] when no task was started,
    /// [`TailError::InvalidResponse`] when the task carries no ARN, and
    /// [`TailError::UnsupportedArn`] when the ARN cannot be parsed.
    pub async fn launch(&self, options: &LaunchOptions) -> Result<TaskHandle, TailError> {
        let request = options.to_request();
        debug!(?request, "issuing run task");

        let output = self
            .scheduler
            .run_task(&request)
            .await
            .map_err(|source| TailError::LaunchRequest {
                task: options.task_name.clone(),
                source,
            })?;
        debug!(response = ?output, "run task returned");

        let Some(task) = output.tasks.first() else {
            return Err(TailError::LaunchFailure {
                task: options.task_name.clone(),
                failures: serde_json::to_string(&output.failures).unwrap_or_default(),
            });
        };

        let Some(task_arn) = task.task_arn.clone() else {
            return Err(TailError::InvalidResponse(
                serde_json::to_string_pretty(&output).unwrap_or_default(),
            ));
        };

        let task_id = arn::task_id_from_arn(&task_arn)?;
        let handle = TaskHandle {
            task_url: arn::task_console_url(&options.region, &options.cluster, &task_id),
            task_id,
            task_arn,
            cluster: options.cluster.clone(),
            task_name: options.task_name.clone(),
            logs: options.logs.clone(),
        };

        info!(
            task_id = %handle.task_id,
            task_name = %handle.task_name,
            cluster = %handle.cluster,
            "task launched"
        );
        Ok(handle)
    }

    /// Open a log session for a launched task.
    ///
    /// Without a log configuration on the handle there is nothing to tail
    /// and the stream is empty.
    pub fn open_logs(&self, handle: &TaskHandle) -> LogRecordStream {
        let Some(logs) = &handle.logs else {
            return Box::pin(futures::stream::empty());
        };

        TaskLogSession::open_for(
            Arc::clone(&self.scheduler),
            Arc::clone(&self.store),
            handle,
            logs.target_for(handle),
            &self.tail_config,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logs::LogPage;
    use crate::scheduler::{LaunchedTask, RunTaskFailure, RunTaskOutput, TaskCondition};
    use anyhow::{Result, bail};
    use async_trait::async_trait;
    use futures::StreamExt;

    /// Returns a fixed `RunTask` output; errors when it holds none.
    struct StaticScheduler {
        output: Option<RunTaskOutput>,
    }

    #[async_trait]
    impl Scheduler for StaticScheduler {
        fn name(&self) -> &str {
            "static"
        }

        async fn run_task(&self, _request: &RunTaskRequest) -> Result<RunTaskOutput> {
            match &self.output {
                Some(output) => Ok(output.clone()),
                None => bail!("AccessDeniedException"),
            }
        }

        async fn wait_for(&self, _c: TaskCondition, _cluster: &str, _task_id: &str) -> Result<()> {
            Ok(())
        }
    }

    struct EmptyStore;

    #[async_trait]
    impl LogStore for EmptyStore {
        fn name(&self) -> &str {
            "empty"
        }

        async fn get_events(&self, _target: &LogTarget, _cursor: Option<&str>) -> Result<LogPage> {
            Ok(LogPage::default())
        }
    }

    fn launcher(output: Option<RunTaskOutput>) -> TaskLauncher {
        TaskLauncher::new(Arc::new(StaticScheduler { output }), Arc::new(EmptyStore))
    }

    fn options() -> LaunchOptions {
        LaunchOptions::new("hello-world", "us-east-1", "subnet-1", "sg-1")
    }

    fn output_with_arn(arn: Option<&str>) -> RunTaskOutput {
        RunTaskOutput {
            tasks: vec![LaunchedTask {
                task_arn: arn.map(str::to_string),
                last_status: Some("PROVISIONING".to_string()),
            }],
            failures: vec![],
        }
    }

    #[tokio::test]
    async fn launch_returns_handle() {
        let handle = launcher(Some(output_with_arn(Some(
            "arn:aws:ecs:us-east-1:123456789012:task/abc123",
        ))))
        .launch(&options())
        .await
        .unwrap();

        assert_eq!(handle.task_id, "abc123");
        assert_eq!(handle.cluster, "default");
        assert_eq!(handle.task_name, "hello-world");
        assert_eq!(
            handle.task_url,
            "https://us-east-1.console.aws.amazon.com/ecs/home?region=us-east-1#/clusters/default/tasks/abc123/details"
        );
    }

    #[tokio::test]
    async fn launch_without_tasks_is_launch_failure() {
        let output = RunTaskOutput {
            tasks: vec![],
            failures: vec![RunTaskFailure {
                arn: None,
                reason: Some("MISSING".to_string()),
                detail: None,
            }],
        };

        let err = launcher(Some(output)).launch(&options()).await.unwrap_err();
        match err {
            TailError::LaunchFailure { task, failures } => {
                assert_eq!(task, "hello-world");
                assert!(failures.contains("MISSING"), "failures: {failures}");
            }
            other => panic!("expected LaunchFailure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn launch_without_arn_is_invalid_response() {
        let err = launcher(Some(output_with_arn(None)))
            .launch(&options())
            .await
            .unwrap_err();
        assert!(matches!(err, TailError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn launch_with_foreign_arn_is_unsupported() {
        let err = launcher(Some(output_with_arn(Some("arn:aws:ecs:us-east-1:1:service/web"))))
            .launch(&options())
            .await
            .unwrap_err();
        assert!(matches!(err, TailError::UnsupportedArn(_)));
    }

    #[tokio::test]
    async fn launch_request_error_is_wrapped() {
        let err = launcher(None).launch(&options()).await.unwrap_err();
        assert!(matches!(err, TailError::LaunchRequest { ref task, .. } if task == "hello-world"));
    }

    #[test]
    fn request_omits_command_when_no_args() {
        let request = options().to_request();
        assert_eq!(request.overrides.container_overrides[0].command, None);
        assert_eq!(request.launch_type, "FARGATE");
        assert_eq!(
            request.network_configuration.awsvpc_configuration.assign_public_ip,
            "DISABLED"
        );
    }

    #[test]
    fn request_carries_args_and_public_ip() {
        let mut opts = options();
        opts.args = vec!["echo".to_string(), "hi".to_string()];
        opts.assign_public_ip = true;
        opts.launch_type = LaunchType::Ec2;

        let request = opts.to_request();
        assert_eq!(
            request.overrides.container_overrides[0].command,
            Some(vec!["echo".to_string(), "hi".to_string()])
        );
        assert_eq!(request.overrides.container_overrides[0].name, "hello-world");
        assert_eq!(request.launch_type, "EC2");
        assert_eq!(
            request.network_configuration.awsvpc_configuration.assign_public_ip,
            "ENABLED"
        );
    }

    #[test]
    fn log_stream_name_follows_awslogs_convention() {
        let logs = LogConfig {
            log_group_name: "/ecs/hello".to_string(),
            log_stream_prefix: "ecs".to_string(),
        };
        let handle = TaskHandle {
            task_id: "abc123".to_string(),
            task_url: String::new(),
            task_arn: String::new(),
            cluster: "default".to_string(),
            task_name: "hello-world".to_string(),
            logs: Some(logs.clone()),
        };
        assert_eq!(
            logs.target_for(&handle),
            LogTarget::new("/ecs/hello", "ecs/hello-world/abc123")
        );
    }

    #[tokio::test]
    async fn open_logs_without_config_is_empty() {
        let launcher = launcher(None);
        let handle = TaskHandle {
            task_id: "abc123".to_string(),
            task_url: String::new(),
            task_arn: String::new(),
            cluster: "default".to_string(),
            task_name: "hello-world".to_string(),
            logs: None,
        };
        let items: Vec<_> = launcher.open_logs(&handle).collect().await;
        assert!(items.is_empty());
    }

    #[test]
    fn launch_type_parses_case_insensitively() {
        assert_eq!("FARGATE".parse::<LaunchType>().unwrap(), LaunchType::Fargate);
        assert_eq!("ec2".parse::<LaunchType>().unwrap(), LaunchType::Ec2);
        assert!("lambda".parse::<LaunchType>().is_err());
    }
}
