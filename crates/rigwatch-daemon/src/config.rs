//! Configuration loading and validation

use anyhow::{Context, Result};
use rigwatch_engine::DEFAULT_EXTRACT_TIMEOUT_MS;
use rigwatch_web::{DEFAULT_PORT, DEFAULT_TIMEOUT_MS};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::Path;
use tracing::info;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default, rename = "miner")]
    pub miners: Vec<MinerConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    /// Seconds between polling rounds
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
    /// Maximum miners polled at once
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Per-request timeout
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
    /// Bound on a single field extraction
    #[serde(default = "default_extract_timeout")]
    pub extract_timeout_ms: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
            concurrency: default_concurrency(),
            timeout_ms: default_timeout(),
            extract_timeout_ms: default_extract_timeout(),
        }
    }
}

fn default_interval() -> u64 {
    60
}

fn default_concurrency() -> usize {
    16
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_extract_timeout() -> u64 {
    DEFAULT_EXTRACT_TIMEOUT_MS
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinerConfig {
    pub ip: IpAddr,
    /// Model name, e.g. "S19 Pro"
    pub model: String,
    /// Web API password for privileged commands
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("parsing {}", path.display()))?;
        info!(path = %path.display(), miners = config.miners.len(), "Loaded configuration");
        Ok(config)
    } else {
        info!(
            path = %path.display(),
            "Configuration file not found, using defaults"
        );
        Ok(Config::default())
    }
}
