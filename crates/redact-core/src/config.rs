use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default service endpoint when neither config nor environment name one.
pub const DEFAULT_REDACT_URL: &str = "http://localhost:8787/";

/// Backoff parameters for transient network errors (`[retry]` in config.toml).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// First backoff delay in seconds; each further delay doubles.
    pub initial_delay_secs: f64,
    /// Total time budget for retries of one request.
    pub total_time_limit_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay_secs: 1.0,
            total_time_limit_secs: 600,
        }
    }
}

/// Client configuration loaded from `~/.config/redact/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedactConfig {
    pub redact_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_id: Option<String>,
    /// Timeout for status/delete calls and base of the upload timeout.
    pub base_timeout_secs: u64,
    /// Added to the upload timeout for every full GiB of payload.
    pub timeout_per_gb_secs: u64,
    /// Uploads in flight at once across all workers.
    pub max_concurrent_uploads: usize,
    pub connect_timeout_secs: u64,
    pub retry: RetryConfig,
}

impl Default for RedactConfig {
    fn default() -> Self {
        Self {
            redact_url: DEFAULT_REDACT_URL.to_string(),
            api_key: None,
            subscription_id: None,
            base_timeout_secs: 60,
            timeout_per_gb_secs: 10,
            max_concurrent_uploads: 2,
            connect_timeout_secs: 30,
            retry: RetryConfig::default(),
        }
    }
}

impl RedactConfig {
    /// Override fields from `REDACT_URL`, `REDACT_API_KEY` and
    /// `REDACT_SUBSCRIPTION_ID`. Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(url) = get("REDACT_URL") {
            self.redact_url = url;
        }
        if let Some(key) = get("REDACT_API_KEY") {
            self.api_key = Some(key);
        }
        if let Some(id) = get("REDACT_SUBSCRIPTION_ID") {
            self.subscription_id = Some(id);
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("redact")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Read a config file. Missing keys take their defaults.
pub fn load_from(path: &Path) -> Result<RedactConfig> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    toml::from_str(&data).with_context(|| format!("invalid config {}", path.display()))
}

/// Load configuration from disk, creating a default file if none exists,
/// then apply environment overrides.
pub fn load_or_init() -> Result<RedactConfig> {
    let path = config_path()?;
    let mut cfg = if path.exists() {
        load_from(&path)?
    } else {
        let default_cfg = RedactConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        default_cfg
    };
    cfg.apply_env(|k| std::env::var(k).ok());
    Ok(cfg)
}
