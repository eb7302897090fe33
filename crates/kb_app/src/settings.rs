use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use client_logging::client_info;
use kb_engine::{parse_base_url, ClientConfig, DEFAULT_BASE_URL};
use serde::{Deserialize, Serialize};

/// Contents of the optional RON settings file. Durations are in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub base_url: String,
    pub connect_timeout_ms: u64,
    pub poll_interval_ms: u64,
    pub poll_timeout_ms: Option<u64>,
    pub max_batch_files: usize,
    pub submit_concurrency: usize,
    pub credentials_path: PathBuf,
    pub log_file: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            connect_timeout_ms: 10_000,
            poll_interval_ms: 3_000,
            poll_timeout_ms: None,
            max_batch_files: 10,
            submit_concurrency: 1,
            credentials_path: PathBuf::from("./.kb_credentials.json"),
            log_file: PathBuf::from("./kb.log"),
        }
    }
}

impl Settings {
    /// Reads `path` when given; no path means built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading settings from {}", path.display()))?;
        let settings: Settings = ron::from_str(&content)
            .with_context(|| format!("parsing settings in {}", path.display()))?;
        client_info!("Loaded settings from {:?}", path);
        Ok(settings)
    }

    pub fn client_config(&self, base_url_override: Option<&str>) -> Result<ClientConfig> {
        let base_url = base_url_override.unwrap_or(&self.base_url);
        Ok(ClientConfig {
            base_url: parse_base_url(base_url)?,
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            poll_timeout: self.poll_timeout_ms.map(Duration::from_millis),
            max_batch_files: self.max_batch_files,
            submit_concurrency: self.submit_concurrency.max(1),
        })
    }
}
