//! `ecsrun run`: launch tasks and stream their logs until they stop.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use ecsrun_core::aws::{AwsCli, AwsCliLogStore, AwsCliScheduler};
use ecsrun_core::{
    LaunchOptions, LaunchType, LogStore, Scheduler, TaggedRecord, TailConfig, TailError,
    TaskLauncher, interleave_sessions,
};

use crate::config::EcsrunConfig;
use crate::output::{self, Format};

#[derive(Debug, Clone)]
pub struct RunArgs {
    pub tasks: Vec<String>,
    pub count: usize,
    pub launch_type: LaunchType,
    pub public_ip: bool,
    pub no_logs: bool,
    pub interval: Duration,
    pub json: bool,
    pub command: Vec<String>,
}

/// One [`LaunchOptions`] per task to start, `count` per task definition.
pub fn launch_plan(config: &EcsrunConfig, args: &RunArgs) -> Vec<LaunchOptions> {
    let mut plan = Vec::with_capacity(args.tasks.len() * args.count);
    for task in &args.tasks {
        for _ in 0..args.count {
            let mut options = LaunchOptions::new(
                task.clone(),
                config.region.clone(),
                config.subnet_id.clone(),
                config.security_group_id.clone(),
            );
            options.cluster = config.cluster.clone();
            options.args = args.command.clone();
            options.launch_type = args.launch_type;
            options.assign_public_ip = args.public_ip;
            options.logs = config.logs.clone();
            plan.push(options);
        }
    }
    plan
}

pub async fn run_tasks(config: &EcsrunConfig, args: RunArgs) -> Result<()> {
    let cli = AwsCli::new(Some(config.region.clone()));
    let scheduler: Arc<dyn Scheduler> = Arc::new(AwsCliScheduler::new(cli.clone()));
    let store: Arc<dyn LogStore> = Arc::new(AwsCliLogStore::new(cli));
    let launcher =
        TaskLauncher::new(scheduler, store).with_tail_config(TailConfig::with_interval(args.interval));

    let plan = launch_plan(config, &args);
    if !args.no_logs && config.logs.is_none() {
        eprintln!("No log group configured; pass --log-group/--log-stream-prefix to tail logs.");
    }

    let mut sessions = Vec::new();
    for options in &plan {
        let handle = launcher
            .launch(options)
            .await
            .with_context(|| format!("failed to launch task {}", options.task_name))?;
        eprintln!("Started {} ({})", handle.task_id, handle.task_name);
        eprintln!("  {}", handle.task_url);

        if !args.no_logs {
            let stream = launcher.open_logs(&handle);
            sessions.push((handle.task_id, stream));
        }
    }

    if sessions.is_empty() {
        return Ok(());
    }

    let format = if args.json {
        Format::Json
    } else {
        Format::Text {
            tagged: sessions.len() > 1,
        }
    };
    let cancel = crate::shutdown::ctrl_c_token();
    let merged = interleave_sessions(sessions);
    let printed = print_records(merged, format, &cancel, &mut std::io::stdout()).await?;
    tracing::debug!(records = printed, "run finished");
    Ok(())
}

/// Write every record to `out` until the stream ends or `cancel` fires.
///
/// Returns the number of records written.
pub async fn print_records<S, W>(
    records: S,
    format: Format,
    cancel: &CancellationToken,
    out: &mut W,
) -> Result<u64>
where
    S: Stream<Item = Result<TaggedRecord, TailError>>,
    W: Write,
{
    let mut records = std::pin::pin!(records);
    let mut printed = 0;
    loop {
        let item = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            item = records.next() => item,
        };
        let Some(item) = item else {
            break;
        };
        let tagged = item.context("log stream failed")?;
        writeln!(out, "{}", output::format_tagged(&tagged, format)?)?;
        out.flush()?;
        printed += 1;
    }
    Ok(printed)
}
