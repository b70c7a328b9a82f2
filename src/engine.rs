//! Acquisition engine: resolve, dedup, then run the strategy chain under a deadline

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::Config;
use crate::credentials::{CredentialError, CredentialPool};
use crate::error::AcquireError;
use crate::extractor::{ExtractorTool, YtDlpTool};
use crate::metadata::{ExtractorInfoProvider, Metadata, MetadataFetcher};
use crate::observability::Metrics;
use crate::reference::{MediaKind, MediaRef};
use crate::storage::{DownloadStore, OutputFormats};
use crate::strategies::{AcquisitionResult, StrategyChain, StrategyDeps};
use crate::worker::{HttpClient, HttpError, WorkerPool};

pub struct Engine {
    store: DownloadStore,
    chain: StrategyChain,
    metadata: MetadataFetcher,
    credentials: Arc<CredentialPool>,
    http: HttpClient,
    refresh_url: Option<String>,
    metrics: Arc<Metrics>,
    default_deadline: Duration,
}

impl Engine {
    /// Engine backed by the `yt-dlp` binary
    pub fn from_config(config: &Config) -> Result<Self, HttpError> {
        let tool = Arc::new(YtDlpTool::new(&config.extractor, &config.http));
        Self::with_tool(config, tool)
    }

    pub fn with_tool(config: &Config, tool: Arc<dyn ExtractorTool>) -> Result<Self, HttpError> {
        let http = HttpClient::new(&config.http)?;
        let metrics = Arc::new(Metrics::new());
        let workers = WorkerPool::new(config.extractor.workers);

        let credentials = match CredentialPool::load(&config.credentials) {
            Ok(pool) => pool,
            Err(e @ CredentialError::NoCredentialsAvailable(_)) => {
                warn!(error = %e, "Extractor strategies will refuse until credentials are added");
                CredentialPool::empty(&config.credentials)
            }
            Err(e) => {
                warn!(error = %e, "Failed to load credentials, starting with an empty pool");
                CredentialPool::empty(&config.credentials)
            }
        };
        let credentials = Arc::new(credentials);

        let deps = StrategyDeps {
            http: http.clone(),
            tool: tool.clone(),
            workers: workers.clone(),
            credentials: credentials.clone(),
            metrics: metrics.clone(),
        };
        let chain = StrategyChain::from_config(config, &deps);

        let provider = ExtractorInfoProvider::new(tool, workers, credentials.clone(), &config.extractor);
        let metadata = MetadataFetcher::new(Arc::new(provider), &config.metadata);

        let store = DownloadStore::new(
            &config.downloads.dir,
            OutputFormats {
                audio: config.extractor.audio_codec.clone(),
                explicit_audio: config.extractor.explicit_audio_codec.clone(),
                ..OutputFormats::default()
            },
        );

        Ok(Self {
            store,
            chain,
            metadata,
            credentials,
            http,
            refresh_url: config.credentials.refresh_url.clone(),
            metrics,
            default_deadline: config.downloads.deadline(),
        })
    }

    /// Startup housekeeping: output directory, stale partials, credential bootstrap
    pub async fn prepare(&self) {
        if let Err(e) = self.store.ensure_root().await {
            warn!(dir = %self.store.root().display(), error = %e, "Failed to create downloads directory");
        }
        if let Err(e) = self.store.sweep_partials().await {
            warn!(error = %e, "Failed to sweep stale partial downloads");
        }
        if self.refresh_url.is_some() {
            self.ensure_credentials().await;
        }
    }

    /// Resolve `raw` and acquire it as `kind`.
    ///
    /// Only a malformed reference is an error; every other failure is folded
    /// into an unsuccessful [`AcquisitionResult`].
    pub async fn acquire(
        &self,
        raw: &str,
        kind: MediaKind,
        deadline: Option<Duration>,
    ) -> Result<AcquisitionResult, AcquireError> {
        let media = MediaRef::resolve(raw)?.with_kind(kind);
        Ok(self.acquire_ref(&media, deadline).await)
    }

    /// Acquire an already resolved reference; `None` uses the configured deadline
    pub async fn acquire_ref(&self, media: &MediaRef, deadline: Option<Duration>) -> AcquisitionResult {
        let kind = &media.media_kind;
        let deadline = deadline.unwrap_or(self.default_deadline);

        if let Some(path) = self.store.already_present(&media.canonical_id, kind).await {
            self.metrics.cache_hit();
            info!(media_id = %media.canonical_id, %kind, path = %path.display(), "Serving cached file");
            return AcquisitionResult::cached(path);
        }

        if let Err(e) = self.store.ensure_root().await {
            warn!(error = %e, "Downloads directory unavailable");
            self.metrics.acquisition_failed();
            return AcquisitionResult::failed();
        }

        let target = self.store.target_for(&media.canonical_id, kind);
        match tokio::time::timeout(deadline, self.chain.acquire(media, &target)).await {
            Ok(result) => result,
            Err(_) => {
                target.discard().await;
                self.metrics.acquisition_failed();
                warn!(media_id = %media.canonical_id, %kind, ?deadline, "Acquisition deadline expired");
                AcquisitionResult::failed()
            }
        }
    }

    /// Metadata for `raw`; an unresolvable reference is an error, a failed lookup is empty
    pub async fn info(&self, raw: &str) -> Result<Metadata, AcquireError> {
        let media = MediaRef::resolve(raw)?;
        Ok(self.metadata.fetch(&media).await)
    }

    /// Keep a valid refresh file or fetch one from the configured source
    pub async fn ensure_credentials(&self) -> bool {
        self.credentials
            .ensure(&self.http, self.refresh_url.as_deref())
            .await
    }

    /// Force a fresh credential download
    pub async fn refresh_credentials(&self) -> bool {
        match &self.refresh_url {
            Some(source) => self.credentials.refresh(&self.http, source).await,
            None => {
                warn!("No credential refresh source configured");
                false
            }
        }
    }

    pub fn metadata(&self) -> &MetadataFetcher {
        &self.metadata
    }

    pub fn credentials(&self) -> &CredentialPool {
        &self.credentials
    }

    pub fn store(&self) -> &DownloadStore {
        &self.store
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn strategy_names(&self) -> Vec<&str> {
        self.chain.names()
    }
}
