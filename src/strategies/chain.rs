use std::sync::Arc;
use tracing::{info, warn};

use super::extractor::ExtractorStrategy;
use super::proxy_api::ProxyApiStrategy;
use super::traits::AcquisitionStrategy;
use super::types::AcquisitionResult;
use crate::config::{Config, StrategyType};
use crate::credentials::CredentialPool;
use crate::extractor::ExtractorTool;
use crate::observability::Metrics;
use crate::reference::MediaRef;
use crate::storage::DownloadTarget;
use crate::worker::{HttpClient, RetryPolicy, WorkerPool, run_with_retry};

struct ChainEntry {
    strategy: Arc<dyn AcquisitionStrategy>,
    policy: RetryPolicy,
}

/// Shared collaborators the built-in strategies are constructed from
#[derive(Clone)]
pub struct StrategyDeps {
    pub http: HttpClient,
    pub tool: Arc<dyn ExtractorTool>,
    pub workers: WorkerPool,
    pub credentials: Arc<CredentialPool>,
    pub metrics: Arc<Metrics>,
}

/// Priority-ordered strategies; the first success wins
pub struct StrategyChain {
    entries: Vec<ChainEntry>,
    metrics: Arc<Metrics>,
}

impl StrategyChain {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self {
            entries: Vec::new(),
            metrics,
        }
    }

    /// Build the configured strategies in priority order.
    ///
    /// Proxy strategies without endpoints are left out.
    pub fn from_config(config: &Config, deps: &StrategyDeps) -> Self {
        let mut chain = Self::new(deps.metrics.clone());

        for strategy_config in config.ordered_strategies() {
            let policy = RetryPolicy::from_config(strategy_config);
            let strategy: Arc<dyn AcquisitionStrategy> = match strategy_config.strategy_type {
                StrategyType::ProxyApi => {
                    if strategy_config.endpoints.is_empty() {
                        warn!(strategy = %strategy_config.name, "Proxy strategy has no endpoints, skipping");
                        continue;
                    }
                    Arc::new(ProxyApiStrategy::new(strategy_config, deps.http.clone()))
                }
                StrategyType::Extractor => Arc::new(ExtractorStrategy::new(
                    strategy_config,
                    config.extractor.clone(),
                    deps.tool.clone(),
                    deps.workers.clone(),
                    deps.credentials.clone(),
                    deps.metrics.clone(),
                )),
            };
            chain.push(strategy, policy);
        }

        info!(strategies = ?chain.names(), "Strategy chain ready");
        chain
    }

    /// Append a strategy, keeping priority order stable
    pub fn push(&mut self, strategy: Arc<dyn AcquisitionStrategy>, policy: RetryPolicy) {
        self.entries.push(ChainEntry { strategy, policy });
        self.entries
            .sort_by_key(|entry| entry.strategy.descriptor().priority);
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries
            .iter()
            .map(|e| e.strategy.descriptor().name.as_str())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Try each eligible strategy in order until one produces the file.
    ///
    /// Failures are logged and absorbed; only exhaustion of the whole chain
    /// yields an unsuccessful result.
    pub async fn acquire(&self, media: &MediaRef, target: &DownloadTarget) -> AcquisitionResult {
        let kind = &media.media_kind;

        for entry in &self.entries {
            let strategy = entry.strategy.as_ref();
            if !strategy.supports(kind) {
                continue;
            }
            let name = strategy.descriptor().name.as_str();
            info!(strategy = name, media_id = %media.canonical_id, %kind, "Trying strategy");

            match run_with_retry(strategy, &entry.policy, media, target).await {
                Ok(transfer) => {
                    self.metrics.acquisition_succeeded();
                    return AcquisitionResult::succeeded(
                        target.dest_path.clone(),
                        name,
                        transfer.bytes_written,
                    );
                }
                Err(e) => {
                    self.metrics.strategy_failed();
                    warn!(
                        strategy = name,
                        media_id = %media.canonical_id,
                        code = e.code(),
                        error = %e,
                        "Strategy failed, falling back"
                    );
                    target.discard().await;
                }
            }
        }

        self.metrics.acquisition_failed();
        warn!(media_id = %media.canonical_id, %kind, "All strategies exhausted");
        AcquisitionResult::failed()
    }
}
