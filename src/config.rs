//! Application configuration
//!
//! Loaded from a TOML file; every field has a default so a missing or
//! partial file still yields a usable configuration:
//!
//! ```toml
//! state_file = "/home/me/notes/.review-state.json"
//!
//! [scheduler]
//! request_retention = 0.9
//! maximum_interval = 365
//!
//! [scheduler.steps]
//! new_good = 15
//!
//! [store]
//! autosave = true
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::flashcards::{SchedulerConfig, StoreConfig};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Data directory not found")]
    DataDirNotFound,
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Review state file; defaults to the per-user data directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_file: Option<PathBuf>,
    pub scheduler: SchedulerConfig,
    pub store: StoreConfig,
}

impl AppConfig {
    /// Base directory for configuration and state
    pub fn default_data_dir() -> Result<PathBuf> {
        dirs::data_local_dir()
            .map(|p| p.join("mnemo"))
            .ok_or(ConfigError::DataDirNotFound)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        Ok(Self::default_data_dir()?.join("config.toml"))
    }

    pub fn default_state_file() -> Result<PathBuf> {
        Ok(Self::default_data_dir()?.join("review-state.json"))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content)?;
        config.scheduler.validate()?;
        Ok(config)
    }

    /// Load from `path`, falling back to defaults when the file is absent
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No config at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// State file from the config, or the default location
    pub fn resolve_state_file(&self) -> Result<PathBuf> {
        match &self.state_file {
            Some(path) => Ok(path.clone()),
            None => Self::default_state_file(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert!(config.store.autosave);
        assert_eq!(config.scheduler.request_retention, 0.9);
    }

    #[test]
    fn test_partial_config_overrides() {
        let config = AppConfig::from_toml_str(
            r#"
            state_file = "/tmp/cards.json"

            [scheduler]
            maximum_interval = 365

            [scheduler.steps]
            new_good = 15

            [store]
            autosave = false
            "#,
        )
        .unwrap();

        assert_eq!(config.state_file, Some(PathBuf::from("/tmp/cards.json")));
        assert_eq!(config.scheduler.maximum_interval, 365);
        assert_eq!(config.scheduler.steps.new_good, 15);
        assert_eq!(config.scheduler.steps.new_again, 1);
        assert_eq!(config.scheduler.request_retention, 0.9);
        assert!(!config.store.autosave);
    }

    #[test]
    fn test_invalid_scheduler_config_rejected() {
        let result = AppConfig::from_toml_str("[scheduler]\nrequest_retention = 1.5\n");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));

        let result = AppConfig::from_toml_str("[scheduler]\nweights = [1.0, 2.0]\n");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_load_missing_and_present_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config, AppConfig::default());

        fs::write(&path, "[scheduler]\nrequest_retention = 0.85\n").unwrap();
        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.scheduler.request_retention, 0.85);
    }

    #[test]
    fn test_malformed_toml_is_an_error() {
        let result = AppConfig::from_toml_str("[scheduler\n");
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }
}
