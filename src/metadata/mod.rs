//! Descriptive metadata lookups
//!
//! Lookups are bounded by a hard timeout and never retried. A failed lookup
//! yields an empty [`Metadata`] instead of an error, since callers use it for
//! display only.

mod provider;

pub use provider::{ExtractorInfoProvider, InfoProvider, MetadataError};

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::MetadataConfig;
use crate::extractor::{FormatInfo, SearchHit};
use crate::reference::{self, MediaRef};
use crate::units::duration_to_seconds;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Metadata {
    pub title: String,
    pub duration_display: String,
    pub duration_seconds: u64,
    pub thumbnail_url: String,
    pub canonical_id: String,
}

impl Metadata {
    pub fn is_empty(&self) -> bool {
        self.canonical_id.is_empty() && self.title.is_empty()
    }

    fn from_hit(hit: SearchHit) -> Self {
        Self {
            duration_seconds: duration_to_seconds(&hit.duration_display).unwrap_or(0),
            thumbnail_url: strip_query(&hit.thumbnail_url),
            title: hit.title,
            duration_display: hit.duration_display,
            canonical_id: hit.id,
        }
    }
}

/// Compact record handed to playback queues
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Track {
    pub title: String,
    pub link: String,
    pub id: String,
    pub duration_display: String,
    pub thumbnail_url: String,
}

fn strip_query(url: &str) -> String {
    url.split('?').next().unwrap_or_default().to_string()
}

pub struct MetadataFetcher {
    provider: Arc<dyn InfoProvider>,
    timeout: Duration,
    max_results: usize,
}

impl MetadataFetcher {
    pub fn new(provider: Arc<dyn InfoProvider>, config: &MetadataConfig) -> Self {
        Self {
            provider,
            timeout: Duration::from_secs(config.timeout_secs),
            max_results: config.max_search_results.max(1),
        }
    }

    /// Metadata for `media`, or empty on failure or timeout
    pub async fn fetch(&self, media: &MediaRef) -> Metadata {
        self.first_hit(&media.canonical_url)
            .await
            .map(Metadata::from_hit)
            .unwrap_or_default()
    }

    pub async fn title(&self, media: &MediaRef) -> String {
        self.fetch(media).await.title
    }

    pub async fn duration(&self, media: &MediaRef) -> String {
        self.fetch(media).await.duration_display
    }

    pub async fn thumbnail(&self, media: &MediaRef) -> String {
        self.fetch(media).await.thumbnail_url
    }

    pub async fn track(&self, media: &MediaRef) -> Option<Track> {
        let hit = self.first_hit(&media.canonical_url).await?;
        Some(Track {
            link: hit.url,
            thumbnail_url: strip_query(&hit.thumbnail_url),
            title: hit.title,
            id: hit.id,
            duration_display: hit.duration_display,
        })
    }

    /// The `index`-th search result for `query` (0-based), or empty
    pub async fn search_nth(&self, query: &str, index: usize) -> Metadata {
        let limit = (index + 1).min(self.max_results);
        match self.bounded(self.provider.search(query, limit)).await {
            Some(hits) => hits
                .into_iter()
                .nth(index)
                .map(Metadata::from_hit)
                .unwrap_or_default(),
            None => Metadata::default(),
        }
    }

    pub async fn search(&self, query: &str, limit: usize) -> Vec<Metadata> {
        let limit = limit.clamp(1, self.max_results);
        self.bounded(self.provider.search(query, limit))
            .await
            .unwrap_or_default()
            .into_iter()
            .map(Metadata::from_hit)
            .collect()
    }

    /// Up to `limit` media ids from a playlist link or bare playlist id
    pub async fn playlist(&self, link_or_id: &str, limit: usize) -> Vec<String> {
        let url = reference::playlist_url(link_or_id);
        self.bounded(self.provider.playlist(&url, limit))
            .await
            .unwrap_or_default()
    }

    pub async fn formats(&self, media: &MediaRef) -> Vec<FormatInfo> {
        self.bounded(self.provider.formats(&media.canonical_url))
            .await
            .unwrap_or_default()
    }

    /// Direct stream URL for the bounded-resolution video format
    pub async fn stream_url(&self, media: &MediaRef) -> Option<String> {
        self.bounded(self.provider.stream_url(&media.canonical_url))
            .await
            .filter(|url| !url.is_empty())
    }

    async fn first_hit(&self, url: &str) -> Option<SearchHit> {
        self.bounded(self.provider.search(url, 1))
            .await?
            .into_iter()
            .next()
    }

    async fn bounded<T>(
        &self,
        lookup: impl Future<Output = Result<T, MetadataError>>,
    ) -> Option<T> {
        match tokio::time::timeout(self.timeout, lookup).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                warn!(error = %e, "Metadata lookup failed");
                None
            }
            Err(_) => {
                debug!(timeout = ?self.timeout, "Metadata lookup timed out");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct StubProvider {
        hits: Vec<SearchHit>,
        hang: bool,
        limits: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl InfoProvider for StubProvider {
        async fn search(&self, _query: &str, limit: usize) -> Result<Vec<SearchHit>, MetadataError> {
            self.limits.lock().unwrap().push(limit);
            if self.hang {
                std::future::pending::<()>().await;
            }
            Ok(self.hits.iter().take(limit).cloned().collect())
        }

        async fn playlist(&self, url: &str, limit: usize) -> Result<Vec<String>, MetadataError> {
            Ok(vec![url.to_string(); limit])
        }

        async fn formats(&self, _url: &str) -> Result<Vec<FormatInfo>, MetadataError> {
            Err(MetadataError::Lookup("no formats".to_string()))
        }

        async fn stream_url(&self, _url: &str) -> Result<String, MetadataError> {
            Ok("https://cdn.example/v.mp4".to_string())
        }
    }

    fn hit(id: &str, duration: &str) -> SearchHit {
        SearchHit {
            id: id.to_string(),
            title: format!("title {}", id),
            duration_display: duration.to_string(),
            thumbnail_url: format!("https://i.ytimg.com/vi/{}/hq.jpg?sqp=x", id),
            url: format!("https://www.youtube.com/watch?v={}", id),
        }
    }

    fn fetcher(provider: StubProvider, timeout_secs: u64) -> (Arc<StubProvider>, MetadataFetcher) {
        let provider = Arc::new(provider);
        let config = MetadataConfig {
            timeout_secs,
            max_search_results: 10,
        };
        (provider.clone(), MetadataFetcher::new(provider, &config))
    }

    fn media() -> MediaRef {
        MediaRef::resolve("dQw4w9WgXcQ").unwrap()
    }

    #[tokio::test]
    async fn test_fetch_normalizes_fields() {
        let (_, fetcher) = fetcher(
            StubProvider {
                hits: vec![hit("dQw4w9WgXcQ", "3:33")],
                ..Default::default()
            },
            5,
        );

        let metadata = fetcher.fetch(&media()).await;

        assert_eq!(metadata.canonical_id, "dQw4w9WgXcQ");
        assert_eq!(metadata.duration_seconds, 213);
        assert_eq!(
            metadata.thumbnail_url,
            "https://i.ytimg.com/vi/dQw4w9WgXcQ/hq.jpg"
        );
    }

    #[tokio::test]
    async fn test_field_views_and_track() {
        let (_, fetcher) = fetcher(
            StubProvider {
                hits: vec![hit("dQw4w9WgXcQ", "1:02:03")],
                ..Default::default()
            },
            5,
        );
        let media = media();

        assert_eq!(fetcher.title(&media).await, "title dQw4w9WgXcQ");
        assert_eq!(fetcher.duration(&media).await, "1:02:03");
        assert_eq!(
            fetcher.thumbnail(&media).await,
            "https://i.ytimg.com/vi/dQw4w9WgXcQ/hq.jpg"
        );

        let track = fetcher.track(&media).await.unwrap();
        assert_eq!(track.link, "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
        assert_eq!(track.thumbnail_url, "https://i.ytimg.com/vi/dQw4w9WgXcQ/hq.jpg");
    }

    #[tokio::test]
    async fn test_unknown_duration_is_zero() {
        let (_, fetcher) = fetcher(
            StubProvider {
                hits: vec![hit("dQw4w9WgXcQ", "None")],
                ..Default::default()
            },
            5,
        );

        let metadata = fetcher.fetch(&media()).await;
        assert_eq!(metadata.duration_seconds, 0);
        assert_eq!(metadata.duration_display, "None");
    }

    #[tokio::test]
    async fn test_no_results_is_empty() {
        let (_, fetcher) = fetcher(StubProvider::default(), 5);
        assert!(fetcher.fetch(&media()).await.is_empty());
        assert!(fetcher.track(&media()).await.is_none());
    }

    #[tokio::test]
    async fn test_timeout_is_empty() {
        let (_, fetcher) = fetcher(
            StubProvider {
                hits: vec![hit("dQw4w9WgXcQ", "3:33")],
                hang: true,
                ..Default::default()
            },
            0,
        );

        assert!(fetcher.fetch(&media()).await.is_empty());
    }

    #[tokio::test]
    async fn test_search_nth_bounds_limit() {
        let hits = (0..12).map(|i| hit(&format!("id{:09}", i), "1:00")).collect();
        let (provider, fetcher) = fetcher(
            StubProvider {
                hits,
                ..Default::default()
            },
            5,
        );

        let third = fetcher.search_nth("query", 2).await;
        assert_eq!(third.canonical_id, "id000000002");

        let out_of_range = fetcher.search_nth("query", 15).await;
        assert!(out_of_range.is_empty());

        assert_eq!(*provider.limits.lock().unwrap(), vec![3, 10]);
    }

    #[tokio::test]
    async fn test_playlist_expands_bare_id() {
        let (_, fetcher) = fetcher(StubProvider::default(), 5);
        let ids = fetcher.playlist("PL123", 1).await;
        assert_eq!(ids, vec!["https://www.youtube.com/playlist?list=PL123"]);
    }

    #[tokio::test]
    async fn test_failed_formats_are_empty() {
        let (_, fetcher) = fetcher(StubProvider::default(), 5);
        assert!(fetcher.formats(&media()).await.is_empty());
        assert_eq!(
            fetcher.stream_url(&media()).await.as_deref(),
            Some("https://cdn.example/v.mp4")
        );
    }
}
