//! pingfold.toml configuration parser.

use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingfoldConfig {
    pub api: ApiConfig,
    pub store: StoreConfig,
    pub measure: MeasureConfig,
}

/// Measurement API connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base endpoint, e.g. `https://api.globalping.io/v1`.
    pub endpoint: String,
    /// Bearer token for authenticated submissions.
    pub token: Option<String>,
    /// Per-HTTP-call timeout in seconds.
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path of the redb database file.
    pub path: String,
}

/// Measurement cycle settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeasureConfig {
    /// Hostnames or addresses to measure each cycle.
    pub targets: Vec<String>,
    /// Upstream probe-selection magic (default `world`).
    pub probe_magic: Option<String>,
    /// Probe fan-out limit per measurement (default 10).
    pub probe_limit: Option<u32>,
    /// Ping packets per probe (default 16).
    pub packets: Option<u32>,
    /// Base completion-poll interval in seconds (default 1).
    pub poll_interval_secs: Option<u64>,
    /// Cap on the poll interval in seconds (default 8).
    pub poll_max_interval_secs: Option<u64>,
    /// Total poll budget in seconds before a job counts as stalled
    /// (default 120).
    pub poll_deadline_secs: Option<u64>,
}

impl PingfoldConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: PingfoldConfig = toml::from_str(&content)?;
        Ok(config)
    }
}
