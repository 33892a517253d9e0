//! Backends that drive ECS and CloudWatch Logs through the `aws` CLI.
//!
//! Credentials, profiles, and retry configuration are whatever the CLI
//! resolves from its own environment.

pub mod logs;
pub mod scheduler;

use std::process::{Output, Stdio};

use anyhow::{Context, Result, bail};
use serde::de::DeserializeOwned;
use tokio::process::Command;
use tracing::debug;

pub use logs::AwsCliLogStore;
pub use scheduler::AwsCliScheduler;

/// Thin wrapper around an `aws` binary invocation.
#[derive(Debug, Clone)]
pub struct AwsCli {
    /// Path to the `aws` binary. Defaults to `"aws"` (found via `$PATH`).
    binary: String,
    /// Passed as `--region` when set.
    region: Option<String>,
}

impl AwsCli {
    pub fn new(region: Option<String>) -> Self {
        Self::with_binary("aws", region)
    }

    /// Use a custom binary path (tests point this at a fake script).
    pub fn with_binary(path: impl Into<String>, region: Option<String>) -> Self {
        Self {
            binary: path.into(),
            region,
        }
    }

    /// Run `aws <args> [--region R] --output json` and return the raw output.
    ///
    /// The child is killed if the returned future is dropped, so cancelling
    /// a poll or a wait does not leave an orphaned CLI process.
    async fn output(&self, args: &[String]) -> Result<Output> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(args);
        if let Some(region) = &self.region {
            cmd.arg("--region").arg(region);
        }
        cmd.arg("--output").arg("json");
        cmd.stdin(Stdio::null());
        cmd.kill_on_drop(true);

        debug!(binary = %self.binary, ?args, "running aws cli");

        cmd.output().await.with_context(|| {
            format!(
                "failed to run aws binary at '{}' -- is it installed and on PATH?",
                self.binary
            )
        })
    }

    /// Run a command and require a zero exit status.
    async fn run(&self, args: &[String]) -> Result<Output> {
        let output = self.output(args).await?;
        if !output.status.success() {
            bail!("{}", failure_message(args, &output));
        }
        Ok(output)
    }

    /// Run a command and parse its stdout as JSON.
    async fn run_json<T: DeserializeOwned>(&self, args: &[String]) -> Result<T> {
        let output = self.run(args).await?;
        serde_json::from_slice(&output.stdout)
            .with_context(|| format!("malformed JSON from aws {}", subcommand(args)))
    }
}

/// `"ecs run-task"`-style label for error messages.
fn subcommand(args: &[String]) -> String {
    args.iter().take(2).cloned().collect::<Vec<_>>().join(" ")
}

fn failure_message(args: &[String], output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let code = output
        .status
        .code()
        .map(|c| c.to_string())
        .unwrap_or_else(|| "signal".to_string());
    format!("aws {} failed (exit {code}): {}", subcommand(args), stderr.trim())
}
