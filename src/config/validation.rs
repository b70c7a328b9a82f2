use super::models::{Config, StrategyType};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("No acquisition strategies configured")]
    NoStrategies,

    #[error("Duplicate strategy name '{0}'")]
    DuplicateStrategy(String),

    #[error("Strategy '{0}' declares no kinds")]
    NoKinds(String),

    #[error("Strategy '{strategy}' has invalid endpoint '{endpoint}' (must be http or https)")]
    InvalidEndpoint { strategy: String, endpoint: String },

    #[error("Strategy '{0}' must allow at least one attempt")]
    ZeroAttempts(String),

    #[error("Strategy '{0}' has a zero per-attempt timeout")]
    ZeroTimeout(String),

    #[error(
        "Strategy '{strategy}' allows {timeout_secs}s per attempt, but one extractor run may take {run_secs}s"
    )]
    AttemptShorterThanRun {
        strategy: String,
        timeout_secs: u64,
        run_secs: u64,
    },

    #[error("Strategy '{strategy}' has a zero byte ceiling for {kind}")]
    ZeroCeiling { strategy: String, kind: &'static str },

    #[error("extractor.workers must be greater than zero")]
    NoWorkers,

    #[error("http.chunk_size must be greater than zero")]
    ZeroChunkSize,

    #[error("downloads.deadline_secs must be greater than zero")]
    ZeroDeadline,

    #[error("credentials.refresh_url must be http or https, got '{0}'")]
    InvalidRefreshUrl(String),
}

pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_strategies(config)?;

    if config.extractor.workers == 0 {
        return Err(ValidationError::NoWorkers);
    }
    if config.http.chunk_size.as_u64() == 0 {
        return Err(ValidationError::ZeroChunkSize);
    }
    if config.downloads.deadline_secs == 0 {
        return Err(ValidationError::ZeroDeadline);
    }
    if let Some(url) = &config.credentials.refresh_url {
        if !is_http_url(url) {
            return Err(ValidationError::InvalidRefreshUrl(url.clone()));
        }
    }

    Ok(())
}

fn validate_strategies(config: &Config) -> Result<(), ValidationError> {
    if config.strategies.is_empty() {
        return Err(ValidationError::NoStrategies);
    }

    let mut names = HashSet::new();
    for strategy in &config.strategies {
        if !names.insert(strategy.name.as_str()) {
            return Err(ValidationError::DuplicateStrategy(strategy.name.clone()));
        }
        if strategy.kinds.is_empty() {
            return Err(ValidationError::NoKinds(strategy.name.clone()));
        }
        if strategy.max_attempts == 0 {
            return Err(ValidationError::ZeroAttempts(strategy.name.clone()));
        }
        if strategy.timeout_secs == 0 {
            return Err(ValidationError::ZeroTimeout(strategy.name.clone()));
        }

        let ceilings = [
            ("audio", strategy.max_bytes.audio),
            ("video", strategy.max_bytes.video),
            ("format", strategy.max_bytes.format),
        ];
        for (kind, ceiling) in ceilings {
            if ceiling.is_some_and(|c| c.as_u64() == 0) {
                return Err(ValidationError::ZeroCeiling {
                    strategy: strategy.name.clone(),
                    kind,
                });
            }
        }

        let run_secs = config.extractor.probe_timeout_secs + config.extractor.timeout_secs;
        if strategy.strategy_type == StrategyType::Extractor && strategy.timeout_secs < run_secs {
            return Err(ValidationError::AttemptShorterThanRun {
                strategy: strategy.name.clone(),
                timeout_secs: strategy.timeout_secs,
                run_secs,
            });
        }

        if strategy.strategy_type == StrategyType::ProxyApi {
            if let Some(bad) = strategy.endpoints.iter().find(|e| !is_http_url(e)) {
                return Err(ValidationError::InvalidEndpoint {
                    strategy: strategy.name.clone(),
                    endpoint: bad.clone(),
                });
            }
        }
    }

    Ok(())
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::models::StrategyConfig;
    use crate::units::ByteSize;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_rejects_empty_chain() {
        let mut config = Config::default();
        config.strategies.clear();
        assert!(matches!(validate(&config), Err(ValidationError::NoStrategies)));
    }

    #[test]
    fn test_rejects_duplicate_names() {
        let mut config = Config::default();
        config.strategies.push(StrategyConfig::extractor("extractor", 30));
        assert!(matches!(
            validate(&config),
            Err(ValidationError::DuplicateStrategy(name)) if name == "extractor"
        ));
    }

    #[test]
    fn test_rejects_bad_endpoint() {
        let mut config = Config::default();
        config.strategies[0].endpoints = vec!["ftp://nope".to_string()];
        assert!(matches!(
            validate(&config),
            Err(ValidationError::InvalidEndpoint { .. })
        ));
    }

    #[test]
    fn test_rejects_zero_ceiling() {
        let mut config = Config::default();
        config.strategies[1].max_bytes.video = Some(ByteSize(0));
        assert!(matches!(
            validate(&config),
            Err(ValidationError::ZeroCeiling { kind: "video", .. })
        ));
    }

    #[test]
    fn test_rejects_extractor_attempt_shorter_than_one_run() {
        let mut config = Config::default();
        let extractor = config
            .strategies
            .iter_mut()
            .find(|s| s.strategy_type == StrategyType::Extractor)
            .unwrap();
        extractor.timeout_secs = 45;

        assert!(matches!(
            validate(&config),
            Err(ValidationError::AttemptShorterThanRun { timeout_secs: 45, run_secs: 90, .. })
        ));

        config.extractor.timeout_secs = 10;
        config.extractor.probe_timeout_secs = 5;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_rejects_zero_workers() {
        let mut config = Config::default();
        config.extractor.workers = 0;
        assert!(matches!(validate(&config), Err(ValidationError::NoWorkers)));
    }

    #[test]
    fn test_rejects_non_http_refresh_url() {
        let mut config = Config::default();
        config.credentials.refresh_url = Some("file:///etc/passwd".to_string());
        assert!(matches!(
            validate(&config),
            Err(ValidationError::InvalidRefreshUrl(_))
        ));
    }
}
