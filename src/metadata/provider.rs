use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

use crate::config::ExtractorConfig;
use crate::credentials::CredentialPool;
use crate::extractor::{ExtractorError, ExtractorTool, FormatInfo, SearchHit};
use crate::worker::WorkerPool;

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("lookup failed: {0}")]
    Lookup(String),

    #[error(transparent)]
    Extractor(#[from] ExtractorError),
}

/// Source of search results and descriptive info
#[async_trait]
pub trait InfoProvider: Send + Sync {
    /// Results for a free-text query, or a single lookup when `query` is a link
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, MetadataError>;

    async fn playlist(&self, url: &str, limit: usize) -> Result<Vec<String>, MetadataError>;

    async fn formats(&self, url: &str) -> Result<Vec<FormatInfo>, MetadataError>;

    async fn stream_url(&self, url: &str) -> Result<String, MetadataError>;
}

/// [`InfoProvider`] backed by the extractor tool, sharing its worker pool
pub struct ExtractorInfoProvider {
    tool: Arc<dyn ExtractorTool>,
    workers: WorkerPool,
    credentials: Arc<CredentialPool>,
    stream_format: String,
}

impl ExtractorInfoProvider {
    pub fn new(
        tool: Arc<dyn ExtractorTool>,
        workers: WorkerPool,
        credentials: Arc<CredentialPool>,
        settings: &ExtractorConfig,
    ) -> Self {
        Self {
            tool,
            workers,
            credentials,
            stream_format: format!(
                "best[height<=?{}][width<=?{}]",
                settings.max_height, settings.max_width
            ),
        }
    }

    /// Cookies are optional for lookups
    fn cookies(&self) -> Option<PathBuf> {
        self.credentials.current().ok().map(|c| c.path)
    }
}

#[async_trait]
impl InfoProvider for ExtractorInfoProvider {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, MetadataError> {
        let tool = self.tool.clone();
        let query = query.to_string();
        Ok(self.workers.run(move || tool.search(&query, limit)).await?)
    }

    async fn playlist(&self, url: &str, limit: usize) -> Result<Vec<String>, MetadataError> {
        let tool = self.tool.clone();
        let url = url.to_string();
        Ok(self.workers.run(move || tool.playlist(&url, limit)).await?)
    }

    async fn formats(&self, url: &str) -> Result<Vec<FormatInfo>, MetadataError> {
        let tool = self.tool.clone();
        let url = url.to_string();
        let cookies = self.cookies();
        Ok(self
            .workers
            .run(move || tool.formats(&url, cookies.as_deref()))
            .await?)
    }

    async fn stream_url(&self, url: &str) -> Result<String, MetadataError> {
        let tool = self.tool.clone();
        let url = url.to_string();
        let format = self.stream_format.clone();
        let cookies = self.cookies();
        Ok(self
            .workers
            .run(move || tool.stream_url(&url, &format, cookies.as_deref()))
            .await?)
    }
}
