//! Configuration loading and per-user path resolution
//!
//! The config file is optional; every field has a default tuned for a
//! few-hundred-item inbox. The data directory holds the SQLite cache,
//! which is disposable (delete it and re-sync).

use crate::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;

const DEFAULT_MAX_NOTIFICATIONS: usize = 1000;
const DEFAULT_PRELOAD_COUNT: usize = 20;
const DEFAULT_COMMENT_CONCURRENCY: usize = 5;

/// Sync tuning configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Cap on notifications processed per sync pass
    pub max_notifications: usize,
    /// How many top-priority items get comments pre-loaded after a sync
    pub preload_count: usize,
    /// In-flight limit for concurrent comment fetches
    pub comment_concurrency: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_notifications: DEFAULT_MAX_NOTIFICATIONS,
            preload_count: DEFAULT_PRELOAD_COUNT,
            comment_concurrency: DEFAULT_COMMENT_CONCURRENCY,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// A missing file yields the defaults; a malformed file is an error.
    pub fn load(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Invalid TOML in {}: {}", path.display(), e)))
    }

    /// Load from the default per-user config path.
    pub fn load_default() -> Result<Self> {
        Self::load(&config_file_path())
    }
}

/// Default config file path: `$XDG_CONFIG_HOME/gh-triage/config.toml`
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("gh-triage").join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("./gh-triage/config.toml"))
}

/// Default database path: `$XDG_DATA_HOME/gh-triage/notifications.db`
pub fn db_file_path() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("gh-triage").join("notifications.db"))
        .unwrap_or_else(|| PathBuf::from("./gh-triage/notifications.db"))
}
