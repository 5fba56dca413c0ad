//! CLI configuration, stored as TOML under the user config directory.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Configuration for the gridtext CLI.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub clock: ClockConfig,
}

/// Where the message database lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

/// How game time relates to the wall clock.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClockConfig {
    /// Seconds added to the wall clock to get game time
    #[serde(default)]
    pub offset_secs: i64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    data_dir().join("messages.db")
}

fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from(".local/share"))
        .join("gridtext")
}

fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from(".config"))
        .join("gridtext")
}

fn config_path() -> PathBuf {
    config_dir().join("cli.toml")
}

impl Config {
    /// Load the configuration, writing out the defaults on first run.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file at {}", path.display()))?;
            let config = toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file at {}", path.display()))?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    /// Write the configuration back to disk.
    pub fn save(&self) -> Result<()> {
        fs::create_dir_all(config_dir()).context("Failed to create config directory")?;
        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(config_path(), contents).context("Failed to write config file")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.storage.db_path.ends_with("gridtext/messages.db"));
        assert_eq!(config.clock.offset_secs, 0);
    }

    #[test]
    fn test_config_round_trip() {
        let mut config = Config::default();
        config.storage.db_path = PathBuf::from("/tmp/test/messages.db");
        config.clock.offset_secs = 86_400;

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let back: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(back.storage.db_path, config.storage.db_path);
        assert_eq!(back.clock.offset_secs, 86_400);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: Config = toml::from_str("[clock]\noffset_secs = 60\n").unwrap();
        assert_eq!(config.clock.offset_secs, 60);
        assert!(config.storage.db_path.ends_with("messages.db"));
    }
}
