mod config;
mod output;
mod run_cmd;
mod shutdown;
mod tail_cmd;

#[cfg(test)]
mod test_util;

use std::time::Duration;

use clap::{Parser, Subcommand};

use ecsrun_core::{LaunchType, LogTarget, TailConfig};

use config::{EcsrunConfig, Overrides};

#[derive(Parser)]
#[command(name = "ecsrun", about = "Launch ECS tasks and stream their logs")]
struct Cli {
    /// AWS region (overrides ECSRUN_REGION / AWS_REGION)
    #[arg(long, global = true)]
    region: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write an ecsrun config file (requires --region)
    Init {
        #[arg(long)]
        subnet_id: String,
        #[arg(long)]
        security_group_id: String,
        /// Default cluster for launched tasks
        #[arg(long)]
        cluster: Option<String>,
        /// CloudWatch log group the task definitions write to
        #[arg(long, requires = "log_stream_prefix")]
        log_group: Option<String>,
        /// awslogs-stream-prefix of the task definitions
        #[arg(long, requires = "log_group")]
        log_stream_prefix: Option<String>,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Launch one or more task definitions and stream their logs
    Run {
        /// Task definition families to launch
        #[arg(required = true)]
        tasks: Vec<String>,
        #[arg(long)]
        cluster: Option<String>,
        #[arg(long, default_value = "fargate")]
        launch_type: LaunchType,
        /// Tasks to start per task definition
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u16).range(1..))]
        count: u16,
        #[arg(long)]
        subnet_id: Option<String>,
        #[arg(long)]
        security_group_id: Option<String>,
        /// Assign a public IP to the task's network interface
        #[arg(long)]
        public_ip: bool,
        #[arg(long, requires = "log_stream_prefix")]
        log_group: Option<String>,
        #[arg(long, requires = "log_group")]
        log_stream_prefix: Option<String>,
        /// Launch without tailing logs
        #[arg(long)]
        no_logs: bool,
        /// Log polling interval in milliseconds
        #[arg(long, default_value_t = default_interval_ms())]
        interval_ms: u64,
        /// Print records as JSON lines
        #[arg(long)]
        json: bool,
        /// Command override for the task's container
        #[arg(last = true)]
        command: Vec<String>,
    },
    /// Follow a single CloudWatch log stream
    Tail {
        #[arg(long)]
        log_group: String,
        #[arg(long)]
        log_stream: String,
        #[arg(long, default_value_t = default_interval_ms())]
        interval_ms: u64,
        #[arg(long)]
        json: bool,
    },
}

fn default_interval_ms() -> u64 {
    TailConfig::DEFAULT_POLLING_INTERVAL.as_millis() as u64
}

fn cmd_init(file: config::ConfigFile, force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let path = config::save_config(&file)?;

    println!("Config written to {}", path.display());
    println!("  aws.region = {}", file.aws.region);
    println!("  network.subnet_id = {}", file.network.subnet_id);
    println!("  network.security_group_id = {}", file.network.security_group_id);
    if let Some(logs) = &file.logs {
        println!("  logs.log_group = {}", logs.log_group);
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init {
            subnet_id,
            security_group_id,
            cluster,
            log_group,
            log_stream_prefix,
            force,
        } => {
            let Some(region) = cli.region else {
                anyhow::bail!("ecsrun init requires --region");
            };
            let logs = match (log_group, log_stream_prefix) {
                (Some(log_group), Some(log_stream_prefix)) => Some(config::LogsSection {
                    log_group,
                    log_stream_prefix,
                }),
                _ => None,
            };
            let file = config::ConfigFile {
                aws: config::AwsSection { region, cluster },
                network: config::NetworkSection {
                    subnet_id,
                    security_group_id,
                },
                logs,
            };
            cmd_init(file, force)?;
        }
        Commands::Run {
            tasks,
            cluster,
            launch_type,
            count,
            subnet_id,
            security_group_id,
            public_ip,
            log_group,
            log_stream_prefix,
            no_logs,
            interval_ms,
            json,
            command,
        } => {
            let resolved = EcsrunConfig::resolve(&Overrides {
                region: cli.region,
                cluster,
                subnet_id,
                security_group_id,
                log_group,
                log_stream_prefix,
            })?;
            let args = run_cmd::RunArgs {
                tasks,
                count: usize::from(count),
                launch_type,
                public_ip,
                no_logs,
                interval: Duration::from_millis(interval_ms),
                json,
                command,
            };
            run_cmd::run_tasks(&resolved, args).await?;
        }
        Commands::Tail {
            log_group,
            log_stream,
            interval_ms,
            json,
        } => {
            let region = cli
                .region
                .or_else(|| std::env::var("ECSRUN_REGION").ok())
                .or_else(|| config::load_config().ok().map(|c| c.aws.region));
            tail_cmd::run_tail(
                region,
                LogTarget::new(log_group, log_stream),
                Duration::from_millis(interval_ms),
                json,
            )
            .await?;
        }
    }

    Ok(())
}
