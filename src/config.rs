//! Ringleader Configuration
//!
//! Configuration structures for a Ringleader coordination node.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::identity::NodeIdentity;

/// Main Ringleader configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RingleaderConfig {
    /// Node-specific configuration
    pub node: NodeConfig,

    /// Cluster configuration
    pub cluster: ClusterConfig,

    /// API configuration
    #[serde(default)]
    pub api: ApiConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Node-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// This node's rank (0..cluster_size)
    pub rank: u32,

    /// Total number of processes in the cluster
    pub cluster_size: u32,

    /// Address to bind for peer communication
    pub bind_address: String,
}

/// Cluster configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Peer addresses indexed by rank (including this node's own entry)
    pub peers: Vec<String>,

    /// Per-peer timeout for an election challenge in milliseconds
    #[serde(default = "default_election_timeout_ms")]
    pub election_timeout_ms: u64,

    /// Per-peer timeout for a coordinator announcement in milliseconds
    #[serde(default = "default_announce_timeout_ms")]
    pub announce_timeout_ms: u64,

    /// Timeout for a token transfer to the ring successor in milliseconds
    #[serde(default = "default_token_timeout_ms")]
    pub token_timeout_ms: u64,

    /// Delay before a challenged node starts its own election round
    #[serde(default = "default_election_retry_delay_ms")]
    pub election_retry_delay_ms: u64,

    /// Hold time of the simulated critical section in milliseconds
    #[serde(default = "default_critical_section_hold_ms")]
    pub critical_section_hold_ms: u64,

    /// TCP connect timeout in milliseconds
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

/// API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Enable HTTP API
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// HTTP API bind address
    #[serde(default = "default_api_address")]
    pub bind_address: String,

    /// Enable CORS
    #[serde(default)]
    pub cors_enabled: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (pretty, compact)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_election_timeout_ms() -> u64 {
    2000
}

fn default_announce_timeout_ms() -> u64 {
    3000
}

fn default_token_timeout_ms() -> u64 {
    5000
}

fn default_election_retry_delay_ms() -> u64 {
    500
}

fn default_critical_section_hold_ms() -> u64 {
    2000
}

fn default_connect_timeout_ms() -> u64 {
    1000
}

fn default_true() -> bool {
    true
}

fn default_api_address() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: default_api_address(),
            cors_enabled: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl RingleaderConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: RingleaderConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML string
    pub fn from_str(content: &str) -> crate::Result<Self> {
        let config: RingleaderConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.node.cluster_size == 0 {
            return Err(crate::Error::Config(
                "node.cluster_size must be at least 1".into(),
            ));
        }

        if self.node.rank >= self.node.cluster_size {
            return Err(crate::Error::Config(format!(
                "node.rank {} is out of range for a cluster of {}",
                self.node.rank, self.node.cluster_size
            )));
        }

        if self.node.bind_address.is_empty() {
            return Err(crate::Error::Config(
                "node.bind_address cannot be empty".into(),
            ));
        }

        if self.cluster.peers.len() != self.node.cluster_size as usize {
            return Err(crate::Error::Config(format!(
                "cluster.peers has {} entries, expected {} (one per rank)",
                self.cluster.peers.len(),
                self.node.cluster_size
            )));
        }

        if self.cluster.peers.iter().any(|p| p.is_empty()) {
            return Err(crate::Error::Config(
                "cluster.peers entries cannot be empty".into(),
            ));
        }

        Ok(())
    }

    /// Build the immutable node identity from this configuration
    pub fn identity(&self) -> crate::Result<NodeIdentity> {
        NodeIdentity::new(
            self.node.rank,
            self.node.cluster_size,
            self.cluster.peers.clone(),
        )
    }

    /// Get the election challenge timeout as Duration
    pub fn election_timeout(&self) -> Duration {
        Duration::from_millis(self.cluster.election_timeout_ms)
    }

    /// Get the coordinator announcement timeout as Duration
    pub fn announce_timeout(&self) -> Duration {
        Duration::from_millis(self.cluster.announce_timeout_ms)
    }

    /// Get the token transfer timeout as Duration
    pub fn token_timeout(&self) -> Duration {
        Duration::from_millis(self.cluster.token_timeout_ms)
    }

    /// Get the deferred re-election delay as Duration
    pub fn election_retry_delay(&self) -> Duration {
        Duration::from_millis(self.cluster.election_retry_delay_ms)
    }

    /// Get the simulated critical-section hold time as Duration
    pub fn critical_section_hold(&self) -> Duration {
        Duration::from_millis(self.cluster.critical_section_hold_ms)
    }

    /// Get the TCP connect timeout as Duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.cluster.connect_timeout_ms)
    }
}
