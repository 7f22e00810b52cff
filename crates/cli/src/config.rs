//! Configuration management for the CLI

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// CLI configuration, stored at `~/.config/vmi/config.json`
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// API endpoint URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    /// Subscription used when `--subscription` is not given
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_subscription: Option<String>,
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from file; a missing file is an empty config
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).context("Failed to read config file")?;

        serde_json::from_str(&content).context("Failed to parse config file")
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::config_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content).context("Failed to write config file")?;

        Ok(())
    }

    /// Explicit subscription, else the configured default
    pub fn resolve_subscription(&self, explicit: Option<String>) -> Result<String> {
        explicit
            .or_else(|| self.default_subscription.clone())
            .context("No subscription given; pass --subscription or run `vmi config --subscription <id>`")
    }

    /// Get the configuration file path
    fn config_path() -> Result<PathBuf> {
        let home = dirs_next::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".config").join("vmi").join("config.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();

        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vmi").join("config.json");
        let config = Config {
            api_url: Some("http://insights.internal:8000".to_string()),
            default_subscription: Some("sub-1".to_string()),
        };

        config.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_resolve_subscription_prefers_explicit() {
        let config = Config {
            default_subscription: Some("sub-default".to_string()),
            ..Default::default()
        };

        assert_eq!(
            config.resolve_subscription(Some("sub-flag".to_string())).unwrap(),
            "sub-flag"
        );
        assert_eq!(config.resolve_subscription(None).unwrap(), "sub-default");
        assert!(Config::default().resolve_subscription(None).is_err());
    }
}
