use crate::assistant::gemini::{DEFAULT_GEMINI_BASE_URL, DEFAULT_GEMINI_MODEL};
use crate::domain::constants::DEFAULT_API_BASE_URL;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::fs;

pub const CONFIG_DIR: &str = ".quantalab";
pub const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("poll_interval_ms must be greater than zero")]
    ZeroPollInterval,
    #[error("request_timeout_secs must be greater than zero")]
    ZeroTimeout,
    #[error("api_base_url '{0}' must start with http:// or https://")]
    InvalidBaseUrl(String),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct QuantaConfig {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_simulated_delay_ms")]
    pub simulated_delay_ms: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_demo_fallback")]
    pub demo_fallback: bool,
    #[serde(default = "default_gemini_model")]
    pub gemini_model: String,
    #[serde(default = "default_gemini_base_url")]
    pub gemini_base_url: String,
    /// Only ever read from the environment or an existing file; never written back.
    #[serde(default, skip_serializing)]
    pub gemini_api_key: Option<String>,
}

pub fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

pub fn default_poll_interval_ms() -> u64 {
    2000
}

pub fn default_simulated_delay_ms() -> u64 {
    2500
}

pub fn default_request_timeout_secs() -> u64 {
    30
}

pub fn default_demo_fallback() -> bool {
    true
}

pub fn default_gemini_model() -> String {
    DEFAULT_GEMINI_MODEL.to_string()
}

pub fn default_gemini_base_url() -> String {
    DEFAULT_GEMINI_BASE_URL.to_string()
}

impl Default for QuantaConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            poll_interval_ms: default_poll_interval_ms(),
            simulated_delay_ms: default_simulated_delay_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            demo_fallback: default_demo_fallback(),
            gemini_model: default_gemini_model(),
            gemini_base_url: default_gemini_base_url(),
            gemini_api_key: None,
        }
    }
}

impl QuantaConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::ZeroPollInterval);
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        let url = self.api_base_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::InvalidBaseUrl(self.api_base_url.clone()));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn simulated_delay(&self) -> Duration {
        Duration::from_millis(self.simulated_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Applies `QUANTA_API_URL`, `QUANTA_POLL_INTERVAL_MS` and
    /// `GEMINI_API_KEY` (or `API_KEY`) from `lookup`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty("QUANTA_API_URL") {
            self.api_base_url = url.trim().to_string();
        }
        if let Some(ms) = non_empty("QUANTA_POLL_INTERVAL_MS") {
            self.poll_interval_ms = ms
                .trim()
                .parse()
                .with_context(|| format!("QUANTA_POLL_INTERVAL_MS is not a number: {}", ms))?;
        }
        if let Some(key) = non_empty("GEMINI_API_KEY").or_else(|| non_empty("API_KEY")) {
            self.gemini_api_key = Some(key);
        }
        Ok(())
    }
}

pub fn config_path(work_dir: &Path) -> PathBuf {
    work_dir.join(CONFIG_DIR).join(CONFIG_FILE)
}

/// Reads the config file if one exists, without environment overrides.
pub async fn read_config_file(work_dir: &Path) -> Result<QuantaConfig> {
    let path = config_path(work_dir);
    if !path.exists() {
        return Ok(QuantaConfig::default());
    }
    let content = fs::read_to_string(&path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Loads `<work_dir>/.quantalab/config.json` (defaults when missing), applies
/// environment overrides and validates the result.
pub async fn load_config(work_dir: &Path) -> Result<QuantaConfig> {
    let mut config = read_config_file(work_dir).await?;
    config.apply_env_overrides(|key| std::env::var(key).ok())?;
    config
        .validate()
        .context("Failed to validate QuantaLab configuration")?;
    Ok(config)
}

/// Writes the default config file when none exists. Returns its path.
pub async fn ensure_config(work_dir: &Path) -> Result<PathBuf> {
    let dir = work_dir.join(CONFIG_DIR);
    if !dir.exists() {
        fs::create_dir_all(&dir).await?;
    }
    let path = config_path(work_dir);
    if !path.exists() {
        let content = serde_json::to_string_pretty(&QuantaConfig::default())?;
        fs::write(&path, content).await?;
    }
    Ok(path)
}
