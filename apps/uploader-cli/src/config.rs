//! CLI configuration.
//!
//! Read from `~/.config/clipdrop/config.json`. Every field is optional;
//! `CLIPDROP_API_URL` overrides the API base URL.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clipdrop_uploader::UploaderConfig;
use serde::{Deserialize, Serialize};

pub const API_URL_ENV: &str = "CLIPDROP_API_URL";
const DEFAULT_API_URL: &str = "http://localhost:8000";

/// On-disk config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    api_base_url: String,
    #[serde(default)]
    concurrency: Option<usize>,
    #[serde(default)]
    max_attempts: Option<u32>,
    #[serde(default)]
    attempt_timeout_secs: Option<u64>,
    #[serde(default)]
    initial_backoff_secs: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CliConfig {
    pub api_base_url: String,
    pub uploader: UploaderConfig,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.into(),
            uploader: UploaderConfig::default(),
        }
    }
}

impl CliConfig {
    /// Loads the user config file, then applies the environment override.
    pub fn load() -> anyhow::Result<Self> {
        let mut config = Self::load_from(&config_path()?)?;
        if let Ok(url) = std::env::var(API_URL_ENV) {
            config.apply_api_url(&url);
        }
        Ok(config)
    }

    /// Loads `path`. A missing file yields defaults; an unparsable one is
    /// reported and ignored.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let mut config = Self::default();
        if !path.exists() {
            return Ok(config);
        }

        let content = std::fs::read_to_string(path)?;
        let Ok(file) = serde_json::from_str::<ConfigFile>(&content) else {
            tracing::warn!(
                path = %path.display(),
                "failed to parse config, using defaults"
            );
            return Ok(config);
        };

        config.apply_api_url(&file.api_base_url);
        let uploader = &mut config.uploader;
        if let Some(n) = file.concurrency.filter(|n| *n > 0) {
            uploader.concurrency = n;
        }
        if let Some(n) = file.max_attempts.filter(|n| *n > 0) {
            uploader.retry.max_attempts = n;
        }
        if let Some(secs) = file.attempt_timeout_secs.filter(|s| *s > 0) {
            uploader.retry.attempt_timeout = Duration::from_secs(secs);
        }
        if let Some(delay) = file
            .initial_backoff_secs
            .and_then(|s| Duration::try_from_secs_f64(s).ok())
            .filter(|d| *d <= uploader.retry.max_delay)
        {
            uploader.retry.initial_delay = delay;
        }
        Ok(config)
    }

    fn apply_api_url(&mut self, url: &str) {
        let url = url.trim();
        if !url.is_empty() {
            self.api_base_url = url.trim_end_matches('/').to_string();
        }
    }
}

fn config_path() -> anyhow::Result<PathBuf> {
    Ok(config_base_dir()?.join("clipdrop").join("config.json"))
}

fn config_base_dir() -> anyhow::Result<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        let appdata = std::env::var("APPDATA")?;
        Ok(PathBuf::from(appdata))
    }

    #[cfg(not(target_os = "windows"))]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        Ok(PathBuf::from(home).join(".config"))
    }
}
