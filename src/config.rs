// src/config.rs
//! File configuration: feed list, polling cadence, dedup retention, and
//! per-provider webhook secrets. Loaded once at startup from
//! `$STATUSWATCH_CONFIG_PATH` or `config/statuswatch.toml`; a missing file
//! means defaults (no feeds, no secrets).

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

const ENV_PATH: &str = "STATUSWATCH_CONFIG_PATH";
const DEFAULT_PATH: &str = "config/statuswatch.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    pub name: String,
    pub url: String,
}

/// A provider with a secret gets signature verification; one listed without
/// a secret is explicitly trusted (the tradeoff is logged at startup).
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    #[serde(default)]
    pub secret: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    #[serde(default)]
    pub feeds: Vec<FeedConfig>,
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_retention_hours")]
    pub dedup_retention_hours: u64,
    #[serde(default = "default_tolerance_secs")]
    pub webhook_tolerance_secs: i64,
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

fn default_poll_interval_secs() -> u64 {
    180
}
fn default_fetch_timeout_secs() -> u64 {
    30
}
fn default_retention_hours() -> u64 {
    48
}
fn default_tolerance_secs() -> i64 {
    300
}
fn default_bind_addr() -> String {
    "0.0.0.0:8000".to_string()
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            feeds: Vec::new(),
            providers: Vec::new(),
            poll_interval_secs: default_poll_interval_secs(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            dedup_retention_hours: default_retention_hours(),
            webhook_tolerance_secs: default_tolerance_secs(),
            bind_addr: default_bind_addr(),
        }
    }
}

impl MonitorConfig {
    /// Provider → secret map for the webhook verifier; providers without a
    /// secret are omitted.
    pub fn secrets_map(&self) -> HashMap<String, String> {
        self.providers
            .iter()
            .filter_map(|p| p.secret.clone().map(|s| (p.name.clone(), s)))
            .collect()
    }
}

/// Load config using env var + fallback:
/// 1) $STATUSWATCH_CONFIG_PATH (must exist if set)
/// 2) config/statuswatch.toml
/// 3) built-in defaults
pub fn load() -> Result<MonitorConfig> {
    if let Ok(p) = std::env::var(ENV_PATH) {
        let pb = PathBuf::from(p);
        return load_from(&pb);
    }
    let default = PathBuf::from(DEFAULT_PATH);
    if default.exists() {
        return load_from(&default);
    }
    tracing::info!("no config file found, using defaults");
    Ok(MonitorConfig::default())
}

pub fn load_from(path: &Path) -> Result<MonitorConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading config from {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("parsing config {}", path.display()))
}
