//! Configuration loading for gridprobe.
//!
//! Loads the node set and run settings from gridprobe.toml.

use crate::types::{NodeConfig, NodeId};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default config directory name.
const CONFIG_DIR_NAME: &str = "gridprobe";

/// Default config file name.
const CONFIG_FILE_NAME: &str = "gridprobe.toml";

/// Top-level configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GridprobeConfig {
    /// Probe execution settings.
    #[serde(default)]
    pub probe: ProbeSettings,

    /// Uptime sampler settings.
    #[serde(default)]
    pub uptime: UptimeSettings,

    /// SSH credentials applied to every node's control channel.
    #[serde(default)]
    pub ssh: SshSettings,

    /// Placement lookup settings.
    #[serde(default)]
    pub placement: PlacementSettings,

    /// Archival sink settings.
    #[serde(default)]
    pub archive: ArchiveSettings,

    /// Chart sink settings.
    #[serde(default)]
    pub charts: ChartSettings,

    /// Node definitions.
    #[serde(default)]
    pub nodes: Vec<NodeEntry>,
}

/// Probe execution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeSettings {
    /// Timeout for establishing any outbound connection, in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Timeout for a single remote command or transfer, in seconds.
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,

    /// Size of the throughput test payload in megabytes.
    #[serde(default = "default_transfer_size_mb")]
    pub transfer_size_mb: u64,

    /// Number of node batteries allowed in flight at once (1 = sequential).
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            command_timeout_secs: default_command_timeout(),
            transfer_size_mb: default_transfer_size_mb(),
            concurrency: default_concurrency(),
        }
    }
}

impl ProbeSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

/// Uptime sampler settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UptimeSettings {
    /// Total sampling window in seconds.
    #[serde(default = "default_uptime_duration")]
    pub duration_secs: u64,

    /// Interval between ticks in seconds.
    #[serde(default = "default_uptime_interval")]
    pub interval_secs: u64,
}

impl Default for UptimeSettings {
    fn default() -> Self {
        Self {
            duration_secs: default_uptime_duration(),
            interval_secs: default_uptime_interval(),
        }
    }
}

impl UptimeSettings {
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// SSH credentials for the control channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshSettings {
    /// SSH username.
    #[serde(default = "default_user")]
    pub user: String,

    /// Path to SSH private key.
    #[serde(default = "default_identity_file")]
    pub identity_file: String,
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            user: default_user(),
            identity_file: default_identity_file(),
        }
    }
}

/// Placement lookup settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlacementSettings {
    /// Path to a MaxMind GeoLite2 City database file.
    ///
    /// When unset, the placement probe reports a lookup failure for every
    /// node rather than aborting the run.
    #[serde(default)]
    pub geodb_path: Option<PathBuf>,
}

/// Archival sink settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveSettings {
    /// Upload endpoint of the content-addressed storage gateway.
    #[serde(default = "default_archive_endpoint")]
    pub endpoint: String,

    /// Environment variable holding the gateway API key.
    #[serde(default = "default_archive_key_env")]
    pub api_key_env: String,
}

impl Default for ArchiveSettings {
    fn default() -> Self {
        Self {
            endpoint: default_archive_endpoint(),
            api_key_env: default_archive_key_env(),
        }
    }
}

/// Chart sink settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartSettings {
    /// Directory where rendered charts are written.
    #[serde(default = "default_chart_dir")]
    pub output_dir: PathBuf,
}

impl Default for ChartSettings {
    fn default() -> Self {
        Self {
            output_dir: default_chart_dir(),
        }
    }
}

/// Single node entry in configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeEntry {
    /// Unique identifier for this node.
    pub id: String,

    /// Public endpoint URI.
    pub endpoint_uri: String,

    /// Control-channel hostname or IP, if available.
    #[serde(default)]
    pub control_host: Option<String>,

    /// Control-channel SSH port.
    #[serde(default)]
    pub control_port: Option<u16>,

    /// Whether this node participates in the run.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl From<NodeEntry> for NodeConfig {
    fn from(entry: NodeEntry) -> Self {
        NodeConfig {
            id: NodeId::new(entry.id),
            endpoint_uri: entry.endpoint_uri,
            control_host: entry.control_host,
            control_port: entry.control_port,
        }
    }
}

// Default value functions
fn default_connect_timeout() -> u64 {
    10
}

fn default_command_timeout() -> u64 {
    10
}

fn default_transfer_size_mb() -> u64 {
    10
}

fn default_concurrency() -> usize {
    1
}

fn default_uptime_duration() -> u64 {
    60
}

fn default_uptime_interval() -> u64 {
    5
}

fn default_user() -> String {
    "root".to_string()
}

fn default_identity_file() -> String {
    "~/.ssh/id_rsa".to_string()
}

fn default_archive_endpoint() -> String {
    "https://node.lighthouse.storage/api/v0/add".to_string()
}

fn default_archive_key_env() -> String {
    "GRIDPROBE_ARCHIVE_API_KEY".to_string()
}

fn default_chart_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_true() -> bool {
    true
}

/// Get the configuration directory path.
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("com", "gridprobe", CONFIG_DIR_NAME)
        .map(|dirs| dirs.config_dir().to_path_buf())
}

/// Load configuration from a file, falling back to defaults when missing.
pub fn load_config(path: Option<&Path>) -> Result<GridprobeConfig> {
    let config_path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let dir = config_dir().context("Could not determine config directory")?;
            dir.join(CONFIG_FILE_NAME)
        }
    };

    if !config_path.exists() {
        warn!("Config not found at {:?}, using defaults", config_path);
        return Ok(GridprobeConfig::default());
    }

    info!("Loading config from {:?}", config_path);
    let contents = std::fs::read_to_string(&config_path)
        .with_context(|| format!("Failed to read config from {:?}", config_path))?;

    let config: GridprobeConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config from {:?}", config_path))?;

    info!("Loaded {} node definitions", config.nodes.len());
    Ok(config)
}

/// Load enabled nodes as NodeConfig instances.
pub fn load_nodes(config: &GridprobeConfig) -> Vec<NodeConfig> {
    let nodes: Vec<NodeConfig> = config
        .nodes
        .iter()
        .filter(|n| n.enabled)
        .cloned()
        .map(NodeConfig::from)
        .collect();

    debug!("Loaded {} enabled nodes", nodes.len());
    nodes
}

/// Generate an example gridprobe.toml configuration.
pub fn example_config() -> String {
    r#"# Gridprobe Configuration
# Place this file at ~/.config/gridprobe/gridprobe.toml

[probe]
connect_timeout_secs = 10
command_timeout_secs = 10
transfer_size_mb = 10
concurrency = 1

[uptime]
duration_secs = 60
interval_secs = 5

[ssh]
user = "root"
identity_file = "~/.ssh/id_rsa"

[placement]
geodb_path = "~/.config/gridprobe/GeoLite2-City.mmdb"

[archive]
endpoint = "https://node.lighthouse.storage/api/v0/add"
api_key_env = "GRIDPROBE_ARCHIVE_API_KEY"

[charts]
output_dir = "."

[[nodes]]
id = "node-east"
endpoint_uri = "https://provider-east.example.com:8443"
control_host = "203.0.113.10"
control_port = 22
enabled = true

# Node without a control channel: only liveness and placement probes apply
[[nodes]]
id = "node-west"
endpoint_uri = "https://provider-west.example.com:8443"
enabled = true
"#
    .to_string()
}
