//! CLI configuration.
//!
//! Configuration is stored as TOML:
//! - Linux: `~/.config/bulkload/config.toml`
//! - Windows: `%APPDATA%/bulkload/config.toml`

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use bulkload_transfer::{DEFAULT_CHUNK_SIZE, DEFAULT_MAX_CONCURRENCY, UploadOptions};

/// Uploader configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Bulk-upload endpoint URL.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Records per chunk.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Maximum simultaneously in-flight chunks.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Per-chunk request timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Progress report interval in milliseconds.
    #[serde(default = "default_report_interval_ms")]
    pub report_interval_ms: u64,
}

fn default_endpoint() -> String {
    "https://localhost:7164/api/BulkUpload".into()
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_max_concurrency() -> usize {
    DEFAULT_MAX_CONCURRENCY
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_report_interval_ms() -> u64 {
    500
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            chunk_size: default_chunk_size(),
            max_concurrency: default_max_concurrency(),
            request_timeout_secs: default_request_timeout_secs(),
            report_interval_ms: default_report_interval_ms(),
        }
    }
}

impl Config {
    /// Loads `path`, or the platform config file when `path` is `None`.
    ///
    /// A missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => config_path()?,
        };

        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Config =
            toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Applies command-line overrides on top of file values.
    pub fn apply_overrides(
        &mut self,
        endpoint: Option<String>,
        chunk_size: Option<usize>,
        max_concurrency: Option<usize>,
        request_timeout_secs: Option<u64>,
    ) {
        if let Some(endpoint) = endpoint {
            self.endpoint = endpoint;
        }
        if let Some(n) = chunk_size {
            self.chunk_size = n;
        }
        if let Some(n) = max_concurrency {
            self.max_concurrency = n;
        }
        if let Some(secs) = request_timeout_secs {
            self.request_timeout_secs = secs;
        }
    }

    pub fn upload_options(&self) -> UploadOptions {
        UploadOptions {
            chunk_size: self.chunk_size,
            max_concurrency: self.max_concurrency,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_millis(self.report_interval_ms)
    }
}

/// Returns the platform-specific configuration file path.
fn config_path() -> anyhow::Result<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        Ok(PathBuf::from(home)
            .join(".config")
            .join("bulkload")
            .join("config.toml"))
    }

    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        Ok(PathBuf::from(appdata).join("bulkload").join("config.toml"))
    }

    #[cfg(not(any(target_os = "linux", target_os = "windows")))]
    {
        Ok(PathBuf::from("/tmp/bulkload/config.toml"))
    }
}
