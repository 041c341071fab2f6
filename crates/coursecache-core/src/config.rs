//! Client configuration management.
//!
//! This module handles loading and saving the client configuration: where
//! the API lives, how long to wait for it, and the cache's sizing knobs.
//!
//! Configuration is stored at `~/.config/coursecache/config.json`; values
//! can be overridden from the environment.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Application name used for config directory paths
const APP_NAME: &str = "coursecache";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const DEFAULT_API_BASE_URL: &str = "http://localhost:5000";

/// Request timeout in seconds.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Number of recent activity entries kept, most recent first.
pub const DEFAULT_ACTIVITY_CAPACITY: usize = 20;

/// Maximum concurrent per-item progress requests when loading module content.
const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 5;

const ENV_API_URL: &str = "COURSECACHE_API_URL";
const ENV_TIMEOUT_SECS: &str = "COURSECACHE_TIMEOUT_SECS";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    pub activity_capacity: usize,
    pub max_concurrent_requests: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            activity_capacity: DEFAULT_ACTIVITY_CAPACITY,
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            let config = serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Apply `COURSECACHE_*` environment overrides on top of file values.
    pub fn apply_env(mut self) -> Result<Self> {
        self.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(self)
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = lookup(ENV_API_URL) {
            if !url.trim().is_empty() {
                self.api_base_url = url.trim().to_string();
            }
        }
        if let Some(secs) = lookup(ENV_TIMEOUT_SECS) {
            self.request_timeout_secs = secs
                .trim()
                .parse()
                .with_context(|| format!("{} must be a whole number of seconds", ENV_TIMEOUT_SECS))?;
        }
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"api_base_url": "https://lms.example.edu"}"#).expect("valid config");
        assert_eq!(config.api_base_url, "https://lms.example.edu");
        assert_eq!(config.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
        assert_eq!(config.activity_capacity, 20);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [(ENV_API_URL, " https://api.test "), (ENV_TIMEOUT_SECS, "30")]
            .into_iter()
            .collect();
        let mut config = Config::default();
        config
            .apply_overrides(|k| env.get(k).map(|v| v.to_string()))
            .expect("valid overrides");
        assert_eq!(config.api_base_url, "https://api.test");
        assert_eq!(config.request_timeout_secs, 30);
    }

    #[test]
    fn test_bad_timeout_override_is_an_error() {
        let mut config = Config::default();
        let result = config.apply_overrides(|k| (k == ENV_TIMEOUT_SECS).then(|| "soon".to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let path = std::env::temp_dir().join("coursecache-config-that-does-not-exist.json");
        let config = Config::load_from(&path).expect("defaults");
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
    }
}
