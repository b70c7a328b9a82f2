use super::models::{Config, StrategyConfig, StrategyType};
use config::{ConfigError, Environment, File};
use std::env;
use std::path::PathBuf;

const CONFIG_ENV_VAR: &str = "MEDIAFETCH_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/mediafetch.toml";
const ENV_PREFIX: &str = "MEDIAFETCH";
const ENV_SEPARATOR: &str = "__";

const PROXY_ENDPOINT_VARS: &[&str] = &["API_URL1", "API_URL2"];
const PROXY_KEY_VAR: &str = "API_KEY";
const COOKIES_URL_VAR: &str = "COOKIES";

/// Path the configuration is read from when none is given explicitly
pub fn default_path() -> PathBuf {
    env::var(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Load configuration from multiple sources with priority:
/// 1. Defaults (embedded in structs)
/// 2. TOML file (if exists)
/// 3. Environment variables from .env file (via dotenvy)
/// 4. System environment variables (highest priority)
pub fn load(config_path: PathBuf) -> Result<Config, ConfigError> {
    // Missing .env is fine
    let _ = dotenvy::dotenv();

    let mut config = load_from_sources(config_path)?;
    let secrets = Secrets::from_env();
    secrets.apply(&mut config);

    Ok(config)
}

/// Secrets are never stored in TOML files, only in environment
#[derive(Debug, Default)]
pub(crate) struct Secrets {
    pub proxy_endpoints: Vec<String>,
    pub proxy_key: Option<String>,
    pub cookies_url: Option<String>,
}

impl Secrets {
    fn from_env() -> Self {
        Self {
            proxy_endpoints: PROXY_ENDPOINT_VARS
                .iter()
                .filter_map(|var| env::var(var).ok())
                .map(|value| value.trim().trim_end_matches('/').to_string())
                .filter(|value| !value.is_empty())
                .collect(),
            proxy_key: env::var(PROXY_KEY_VAR).ok().filter(|v| !v.is_empty()),
            cookies_url: env::var(COOKIES_URL_VAR).ok().filter(|v| !v.is_empty()),
        }
    }

    pub(crate) fn apply(self, config: &mut Config) {
        if config.credentials.refresh_url.is_none() {
            config.credentials.refresh_url = self.cookies_url;
        }

        let mut has_proxy = false;
        for strategy in &mut config.strategies {
            if strategy.strategy_type != StrategyType::ProxyApi {
                continue;
            }
            has_proxy = true;
            if strategy.endpoints.is_empty() {
                strategy.endpoints = self.proxy_endpoints.clone();
            }
            if strategy.api_key.is_none() {
                strategy.api_key = self.proxy_key.clone();
            }
        }

        if !has_proxy && !self.proxy_endpoints.is_empty() {
            let priority = config
                .strategies
                .iter()
                .map(|s| s.priority)
                .min()
                .unwrap_or(0)
                - 10;
            let mut proxy = StrategyConfig::proxy_api("proxy", priority);
            proxy.endpoints = self.proxy_endpoints;
            proxy.api_key = self.proxy_key;
            config.strategies.push(proxy);
        }
    }
}

/// Load configuration from a specific path and environment
/// Useful for testing with custom config files
pub fn load_from_sources(config_path: PathBuf) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if config_path.exists() {
        tracing::info!("Loading configuration from: {}", config_path.display());
        builder = builder.add_source(File::from(config_path).required(false));
    } else {
        tracing::warn!(
            "Configuration file not found at {}, using defaults and environment overrides",
            config_path.display()
        );
    }

    // MEDIAFETCH__DOWNLOADS__DIR -> downloads.dir
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    );

    let config = builder.build()?;
    config.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::models::Capability;
    use crate::units::ByteSize;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_defaults_only() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nonexistent.toml");

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.server.bind_addr.to_string(), "0.0.0.0:8080");
        assert_eq!(config.strategies.len(), 2);
    }

    #[test]
    fn test_load_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[downloads]
dir = "/srv/media"
deadline_secs = 45

[credentials]
dir = "/srv/cookies"
random_start = false

[http]
chunk_size = "1MB"

[[strategies]]
name = "mirror"
type = "proxy_api"
priority = 1
endpoints = ["https://one.example/dl", "https://two.example/dl"]

[strategies.max_bytes]
video = "250MB"

[[strategies]]
name = "ytdlp"
type = "extractor"
priority = 2
kinds = ["audio", "video", "format"]
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.downloads.dir, PathBuf::from("/srv/media"));
        assert_eq!(config.downloads.deadline_secs, 45);
        assert!(!config.credentials.random_start);
        assert_eq!(config.http.chunk_size, ByteSize::mib(1));
        assert_eq!(config.strategies.len(), 2);
        assert_eq!(config.strategies[0].endpoints.len(), 2);
        assert_eq!(config.strategies[0].max_bytes.video, Some(ByteSize::mib(250)));
        assert!(config.strategies[1].kinds.contains(&Capability::FormatSpecific));
    }

    #[test]
    fn test_secrets_fill_empty_proxy_endpoints() {
        let mut config = Config::default();
        let secrets = Secrets {
            proxy_endpoints: vec!["https://api.example".to_string()],
            proxy_key: Some("k".to_string()),
            cookies_url: Some("https://paste.example/raw".to_string()),
        };

        secrets.apply(&mut config);

        let proxy = &config.strategies[0];
        assert_eq!(proxy.endpoints, vec!["https://api.example"]);
        assert_eq!(proxy.api_key.as_deref(), Some("k"));
        assert_eq!(
            config.credentials.refresh_url.as_deref(),
            Some("https://paste.example/raw")
        );
    }

    #[test]
    fn test_secrets_add_proxy_when_missing() {
        let mut config = Config::default();
        config.strategies.retain(|s| s.strategy_type == StrategyType::Extractor);

        let secrets = Secrets {
            proxy_endpoints: vec!["https://api.example".to_string()],
            ..Default::default()
        };
        secrets.apply(&mut config);

        assert_eq!(config.strategies.len(), 2);
        let proxy = config
            .strategies
            .iter()
            .find(|s| s.strategy_type == StrategyType::ProxyApi)
            .unwrap();
        assert!(proxy.priority < config.strategies[0].priority);
    }
}
