//! Application configuration management.
//!
//! This module handles loading and saving the application configuration,
//! which includes the backend base URL, request timeout, and last used login.
//!
//! Configuration is stored at `~/.config/moexdash/config.json`. The
//! `MOEXDASH_API_URL` and `MOEXDASH_TIMEOUT_SECS` environment variables
//! override the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Application name used for config/data directory paths
pub const APP_NAME: &str = "moexdash";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub const ENV_API_URL: &str = "MOEXDASH_API_URL";
pub const ENV_TIMEOUT_SECS: &str = "MOEXDASH_TIMEOUT_SECS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    pub last_login: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            last_login: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Apply environment overrides. Takes a lookup so tests need not touch
    /// the process environment.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_API_URL).filter(|url| !url.trim().is_empty()) {
            self.api_base_url = url.trim().to_string();
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => self.request_timeout_secs = secs,
                _ => warn!(value = %raw, "Ignoring invalid {}", ENV_TIMEOUT_SECS),
            }
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn data_dir(&self) -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api_base_url, "http://localhost:8000");
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert!(config.last_login.is_none());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: Config = serde_json::from_str(r#"{"last_login": "bob"}"#).unwrap();
        assert_eq!(config.last_login.as_deref(), Some("bob"));
        assert_eq!(config.api_base_url, "http://localhost:8000");
    }

    #[test]
    fn test_overrides() {
        let mut config = Config::default();
        config.apply_overrides(lookup(&[
            (ENV_API_URL, " https://moex.example.com "),
            (ENV_TIMEOUT_SECS, "5"),
        ]));
        assert_eq!(config.api_base_url, "https://moex.example.com");
        assert_eq!(config.request_timeout_secs, 5);
    }

    #[test]
    fn test_invalid_timeout_ignored() {
        let mut config = Config::default();
        config.apply_overrides(lookup(&[(ENV_TIMEOUT_SECS, "soon"), (ENV_API_URL, "  ")]));
        assert_eq!(config, Config::default());

        config.apply_overrides(lookup(&[(ENV_TIMEOUT_SECS, "0")]));
        assert_eq!(config.request_timeout_secs, 30);
    }

    #[test]
    fn test_save_and_load() {
        let dir = std::env::temp_dir().join(format!("moexdash-config-{}", std::process::id()));
        let path = dir.join(CONFIG_FILE);
        let config = Config {
            last_login: Some("bob".to_string()),
            ..Config::default()
        };

        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_missing_file_is_default() {
        let path = std::env::temp_dir().join("moexdash-config-missing").join(CONFIG_FILE);
        assert_eq!(Config::load_from(&path).unwrap(), Config::default());
    }
}
