//! Configuration file management for ecsrun.
//!
//! Provides a TOML-based config file at `~/.config/ecsrun/config.toml` and a
//! resolution chain: CLI flag > env var > config file > default.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use ecsrun_core::{LaunchOptions, LogConfig};

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFile {
    pub aws: AwsSection,
    pub network: NetworkSection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logs: Option<LogsSection>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwsSection {
    pub region: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSection {
    pub subnet_id: String,
    pub security_group_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogsSection {
    pub log_group: String,
    pub log_stream_prefix: String,
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the ecsrun config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/ecsrun` or `~/.config/ecsrun`,
/// never the platform-specific `dirs::config_dir()`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("ecsrun");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("ecsrun")
}

pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file. Returns an error if it does not exist.
pub fn load_config() -> Result<ConfigFile> {
    let path = config_path();
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file at {}", path.display()))?;
    Ok(config)
}

/// Serialize and write the config file, creating parent dirs as needed.
/// Sets file permissions to 0600 on Unix.
pub fn save_config(config: &ConfigFile) -> Result<PathBuf> {
    let path = config_path();
    let dir = config_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create config directory {}", dir.display()))?;

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(&path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(path)
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Values given on the command line. `None` falls through to the env var,
/// then the config file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub region: Option<String>,
    pub cluster: Option<String>,
    pub subnet_id: Option<String>,
    pub security_group_id: Option<String>,
    pub log_group: Option<String>,
    pub log_stream_prefix: Option<String>,
}

/// Fully resolved configuration, ready for use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EcsrunConfig {
    pub region: String,
    pub cluster: String,
    pub subnet_id: String,
    pub security_group_id: String,
    pub logs: Option<LogConfig>,
}

fn env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

impl EcsrunConfig {
    /// Resolve against the config file on disk, if there is one.
    pub fn resolve(overrides: &Overrides) -> Result<Self> {
        let path = config_path();
        let file = if path.exists() {
            Some(load_config()?)
        } else {
            None
        };
        Self::resolve_with(overrides, file.as_ref())
    }

    /// Resolve using the chain: CLI flag > env var > config file > default.
    ///
    /// - Region: `--region` > `ECSRUN_REGION` > `AWS_REGION` > `aws.region` > error
    /// - Cluster: `--cluster` > `ECSRUN_CLUSTER` > `aws.cluster` > `"default"`
    /// - Subnet / security group: flag > `ECSRUN_SUBNET_ID` /
    ///   `ECSRUN_SECURITY_GROUP_ID` > `[network]` > error
    /// - Logs: both flags, else `[logs]`, else none
    pub fn resolve_with(overrides: &Overrides, file: Option<&ConfigFile>) -> Result<Self> {
        let region = overrides
            .region
            .clone()
            .or_else(|| env("ECSRUN_REGION"))
            .or_else(|| env("AWS_REGION"))
            .or_else(|| file.map(|f| f.aws.region.clone()));
        let Some(region) = region else {
            bail!(
                "region not set; pass --region, set ECSRUN_REGION or AWS_REGION, or run `ecsrun init`"
            );
        };

        let cluster = overrides
            .cluster
            .clone()
            .or_else(|| env("ECSRUN_CLUSTER"))
            .or_else(|| file.and_then(|f| f.aws.cluster.clone()))
            .unwrap_or_else(|| LaunchOptions::DEFAULT_CLUSTER.to_string());

        let subnet_id = overrides
            .subnet_id
            .clone()
            .or_else(|| env("ECSRUN_SUBNET_ID"))
            .or_else(|| file.map(|f| f.network.subnet_id.clone()));
        let Some(subnet_id) = subnet_id else {
            bail!("subnet not set; pass --subnet-id, set ECSRUN_SUBNET_ID, or run `ecsrun init`");
        };

        let security_group_id = overrides
            .security_group_id
            .clone()
            .or_else(|| env("ECSRUN_SECURITY_GROUP_ID"))
            .or_else(|| file.map(|f| f.network.security_group_id.clone()));
        let Some(security_group_id) = security_group_id else {
            bail!(
                "security group not set; pass --security-group-id, set ECSRUN_SECURITY_GROUP_ID, or run `ecsrun init`"
            );
        };

        let logs = match (&overrides.log_group, &overrides.log_stream_prefix) {
            (Some(group), Some(prefix)) => Some(LogConfig {
                log_group_name: group.clone(),
                log_stream_prefix: prefix.clone(),
            }),
            (None, None) => file.and_then(|f| f.logs.as_ref()).map(|l| LogConfig {
                log_group_name: l.log_group.clone(),
                log_stream_prefix: l.log_stream_prefix.clone(),
            }),
            _ => bail!("--log-group and --log-stream-prefix must be given together"),
        };

        Ok(Self {
            region,
            cluster,
            subnet_id,
            security_group_id,
            logs,
        })
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------
