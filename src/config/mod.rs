//! Configuration management for mediafetch
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use mediafetch::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Downloads land in: {}", config.downloads.dir.display());
//! ```
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the pattern:
//! `MEDIAFETCH__<section>__<key>`
//!
//! Examples:
//! - `MEDIAFETCH__DOWNLOADS__DIR=/srv/media`
//! - `MEDIAFETCH__EXTRACTOR__WORKERS=8`
//! - `MEDIAFETCH__HTTP__CHUNK_SIZE=4MB`
//!
//! Secrets come from plain variables: `API_URL1`, `API_URL2` and `API_KEY` for
//! the proxy-API strategy, `COOKIES` for the credential refresh source.
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/mediafetch.toml`.
//! This can be overridden using the `MEDIAFETCH_CONFIG` environment variable.

mod models;
mod sources;
mod validation;

pub use crate::units::ByteSize;
pub use models::{
    Capability, Config, CredentialsConfig, DownloadsConfig, ExtractorConfig, HttpConfig,
    MetadataConfig, ServerConfig, SizeCeilings, StrategyConfig, StrategyType,
};
pub use validation::ValidationError;

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// # Errors
    ///
    /// Returns an error if the file is malformed or validation fails.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_secrets(sources::default_path())
    }

    /// Load from `path` (plus environment and secrets)
    pub fn load_with_secrets(path: PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load(path)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load from a specific path without reading secrets
    ///
    /// Useful for testing with custom configuration files.
    pub fn load_from_path(path: PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Strategies sorted into fallback order
    pub fn ordered_strategies(&self) -> Vec<&StrategyConfig> {
        let mut ordered: Vec<&StrategyConfig> = self.strategies.iter().collect();
        ordered.sort_by_key(|s| s.priority);
        ordered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_minimal_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[[strategies]]
name = "ytdlp"
type = "extractor"
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = Config::load_from_path(config_path).unwrap();
        assert_eq!(config.strategies.len(), 1);
        assert_eq!(config.strategies[0].strategy_type, StrategyType::Extractor);
    }

    #[test]
    fn test_validation_catches_duplicate_strategy() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[[strategies]]
name = "same"
type = "extractor"

[[strategies]]
name = "same"
type = "proxy_api"
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let result = Config::load_from_path(config_path);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::ValidationError(ValidationError::DuplicateStrategy(_))
        ));
    }

    #[test]
    fn test_ordered_strategies_follow_priority() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[[strategies]]
name = "late"
type = "extractor"
priority = 50

[[strategies]]
name = "early"
type = "proxy_api"
priority = 1
endpoints = ["https://api.example/dl"]
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = Config::load_from_path(config_path).unwrap();
        let names: Vec<&str> = config
            .ordered_strategies()
            .iter()
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(names, vec!["early", "late"]);
    }
}
