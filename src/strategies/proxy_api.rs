use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use super::traits::AcquisitionStrategy;
use super::types::{StrategyDescriptor, Transfer};
use crate::config::{Capability, SizeCeilings, StrategyConfig};
use crate::error::AcquireError;
use crate::reference::{MediaKind, MediaRef};
use crate::storage::DownloadTarget;
use crate::worker::{HttpClient, race_first_ok};

const SHORT_LINK_BASE: &str = "https://youtu.be/";
const API_KEY_HEADER: &str = "X-API-Key";

/// Body returned by a proxy endpoint
#[derive(Debug, Deserialize)]
struct ProxyResponse {
    #[serde(default)]
    status: Value,
    #[serde(default)]
    download_url: Option<String>,
    #[serde(default)]
    filename: Option<String>,
}

impl ProxyResponse {
    fn is_success(&self) -> bool {
        match &self.status {
            Value::String(s) => s.eq_ignore_ascii_case("success"),
            Value::Bool(b) => *b,
            _ => false,
        }
    }
}

/// Third-party HTTP endpoints that hand back a direct download link.
///
/// All endpoints are asked at once and the first usable answer wins; the
/// losing requests are dropped. The link is size-probed before the body is
/// streamed into the temp file.
pub struct ProxyApiStrategy {
    descriptor: StrategyDescriptor,
    endpoints: Vec<String>,
    api_key: Option<String>,
    audio_format: String,
    video_format: String,
    ceilings: SizeCeilings,
    http: HttpClient,
}

impl ProxyApiStrategy {
    pub fn new(config: &StrategyConfig, http: HttpClient) -> Self {
        let mut descriptor = StrategyDescriptor::from_config(config);
        descriptor
            .capabilities
            .retain(|c| *c != Capability::FormatSpecific);

        Self {
            descriptor,
            endpoints: config
                .endpoints
                .iter()
                .map(|e| e.trim_end_matches('/').to_string())
                .collect(),
            api_key: config.api_key.clone(),
            audio_format: config.audio_format.clone(),
            video_format: config.video_format.clone(),
            ceilings: config.max_bytes.clone(),
            http,
        }
    }

    fn format_token(&self, kind: &MediaKind) -> Result<&str, AcquireError> {
        match kind {
            MediaKind::Audio => Ok(&self.audio_format),
            MediaKind::Video => Ok(&self.video_format),
            MediaKind::ExplicitFormat(_) => Err(AcquireError::UpstreamUnavailable(
                "proxy endpoints cannot serve explicit formats".to_string(),
            )),
        }
    }

    fn headers_for(&self, endpoint: &str) -> Vec<(String, String)> {
        let mut headers = vec![
            ("Origin".to_string(), endpoint.to_string()),
            ("Referer".to_string(), format!("{}/", endpoint)),
        ];
        if let Some(key) = &self.api_key {
            headers.push((API_KEY_HEADER.to_string(), key.clone()));
        }
        headers
    }

    /// Ask one endpoint for a download link
    async fn resolve_link(
        &self,
        endpoint: &str,
        media_url: &str,
        format: &str,
    ) -> Result<String, AcquireError> {
        let query = [("url", media_url), ("format", format)];
        let response: ProxyResponse = self
            .http
            .get_json(endpoint, &query, &self.headers_for(endpoint))
            .await?;

        if !response.is_success() {
            return Err(AcquireError::UpstreamUnavailable(format!(
                "{} reported status {}",
                endpoint, response.status
            )));
        }

        let link = response
            .download_url
            .filter(|u| !u.is_empty())
            .ok_or_else(|| {
                AcquireError::UpstreamUnavailable(format!("{} returned no download link", endpoint))
            })?;

        debug!(endpoint, filename = ?response.filename, "Proxy endpoint resolved link");
        Ok(link)
    }
}

#[async_trait]
impl AcquisitionStrategy for ProxyApiStrategy {
    fn descriptor(&self) -> &StrategyDescriptor {
        &self.descriptor
    }

    async fn attempt(
        &self,
        media: &MediaRef,
        target: &DownloadTarget,
    ) -> Result<Transfer, AcquireError> {
        let format = self.format_token(&media.media_kind)?;
        if self.endpoints.is_empty() {
            return Err(AcquireError::UpstreamUnavailable(
                "no proxy endpoints configured".to_string(),
            ));
        }

        let media_url = format!("{}{}", SHORT_LINK_BASE, media.canonical_id);
        let link = race_first_ok(
            self.endpoints
                .iter()
                .map(|endpoint| self.resolve_link(endpoint, &media_url, format)),
        )
        .await
        .map_err(|errors| {
            let reasons: Vec<String> = errors.iter().map(ToString::to_string).collect();
            AcquireError::UpstreamUnavailable(reasons.join("; "))
        })?;

        let ceiling = self.ceilings.for_capability(media.media_kind.capability());

        match self.http.probe_length(&link).await {
            Ok(Some(declared)) => {
                if let Some(ceiling) = ceiling.filter(|c| c.is_exceeded_by(declared)) {
                    return Err(AcquireError::SizeLimitExceeded {
                        declared,
                        ceiling: ceiling.as_u64(),
                    });
                }
            }
            Ok(None) => debug!("Proxy link declared no length"),
            Err(e) => debug!(error = %e, "Size probe failed, continuing with transfer"),
        }

        if let Some(parent) = target.temp_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        self.http
            .stream_to_file(&link, &target.temp_path, ceiling.map(|c| c.as_u64()))
            .await?;
        let bytes_written = target.commit().await?;

        info!(
            strategy = %self.descriptor.name,
            media_id = %media.canonical_id,
            bytes = bytes_written,
            "Proxy transfer completed"
        );
        Ok(Transfer { bytes_written })
    }
}
