//! CloudWatch Logs store over `aws logs get-log-events`.

use anyhow::{Result, bail};
use async_trait::async_trait;
use serde::Deserialize;

use super::{AwsCli, failure_message};
use crate::logs::{LogPage, LogRecord, LogStore, LogTarget};

/// Error code CloudWatch Logs returns for a missing group or stream.
const RESOURCE_NOT_FOUND: &str = "ResourceNotFoundException";
/// Message text that narrows [`RESOURCE_NOT_FOUND`] to the stream.
const STREAM_DOES_NOT_EXIST: &str = "log stream does not exist";

/// A stream the awslogs driver has not created yet. A missing log group is
/// not this case; it never appears on its own.
fn is_missing_stream(stderr: &str) -> bool {
    stderr.contains(RESOURCE_NOT_FOUND) && stderr.contains(STREAM_DOES_NOT_EXIST)
}

/// [`LogStore`] backed by the `aws` CLI.
///
/// Reads always start from the head of the stream. A stream that does not
/// exist yet reads as an empty page with no cursor. A missing log group is
/// an error.
#[derive(Debug, Clone)]
pub struct AwsCliLogStore {
    cli: AwsCli,
}

impl AwsCliLogStore {
    pub fn new(cli: AwsCli) -> Self {
        Self { cli }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetLogEventsOutput {
    #[serde(default)]
    events: Vec<OutputLogEvent>,
    #[serde(default)]
    next_forward_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OutputLogEvent {
    #[serde(default)]
    timestamp: i64,
    #[serde(default)]
    message: String,
}

impl From<GetLogEventsOutput> for LogPage {
    fn from(output: GetLogEventsOutput) -> Self {
        LogPage {
            records: output
                .events
                .into_iter()
                .map(|e| LogRecord::new(e.timestamp, e.message))
                .collect(),
            next_cursor: output.next_forward_token,
        }
    }
}

fn get_log_events_args(target: &LogTarget, cursor: Option<&str>) -> Vec<String> {
    let mut args = vec![
        "logs".to_string(),
        "get-log-events".to_string(),
        "--log-group-name".to_string(),
        target.log_group_name.clone(),
        "--log-stream-name".to_string(),
        target.log_stream_name.clone(),
        "--start-from-head".to_string(),
    ];
    if let Some(token) = cursor {
        args.push("--next-token".to_string());
        args.push(token.to_string());
    }
    args
}

#[async_trait]
impl LogStore for AwsCliLogStore {
    fn name(&self) -> &str {
        "aws-cli"
    }

    async fn get_events(&self, target: &LogTarget, cursor: Option<&str>) -> Result<LogPage> {
        let args = get_log_events_args(target, cursor);
        let output = self.cli.output(&args).await?;

        if !output.status.success() {
            if is_missing_stream(&String::from_utf8_lossy(&output.stderr)) {
                return Ok(LogPage::default());
            }
            bail!("{}", failure_message(&args, &output));
        }

        let parsed: GetLogEventsOutput = serde_json::from_slice(&output.stdout)
            .map_err(|e| anyhow::anyhow!("malformed JSON from aws logs get-log-events: {e}"))?;
        Ok(parsed.into())
    }
}
