//! Request and response bodies for the HTTP surface

use serde::{Deserialize, Serialize};

use crate::metadata::Metadata;
use crate::reference::{FormatRequest, MediaKind};
use crate::strategies::AcquisitionResult;

/// `GET /acquire?input=...&kind=video`
///
/// Passing `format_id` selects an explicit format and requires `title`.
#[derive(Debug, Clone, Deserialize)]
pub struct AcquireQuery {
    pub input: String,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub format_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub audio: bool,
    #[serde(default)]
    pub deadline_secs: Option<u64>,
}

impl AcquireQuery {
    pub fn media_kind(&self) -> Result<MediaKind, String> {
        if let Some(format_id) = self.format_id.as_deref().filter(|f| !f.is_empty()) {
            let title = self
                .title
                .as_deref()
                .filter(|t| !t.trim().is_empty())
                .ok_or_else(|| "title is required with format_id".to_string())?;
            return Ok(MediaKind::ExplicitFormat(FormatRequest {
                format_id: format_id.to_string(),
                title: title.to_string(),
                audio: self.audio,
            }));
        }

        match self.kind.as_deref().unwrap_or("audio") {
            "audio" => Ok(MediaKind::Audio),
            "video" => Ok(MediaKind::Video),
            other => Err(format!("unknown kind '{}'", other)),
        }
    }
}

/// `GET /info?input=...` and `GET /formats?input=...`
#[derive(Debug, Clone, Deserialize)]
pub struct LookupQuery {
    pub input: String,
}

#[derive(Debug, Serialize)]
pub struct AcquireResponse {
    pub media_id: String,
    pub kind: String,
    #[serde(flatten)]
    pub result: AcquisitionResult,
}

#[derive(Debug, Serialize)]
pub struct InfoResponse {
    pub found: bool,
    #[serde(flatten)]
    pub metadata: Metadata,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub strategies: Vec<String>,
    pub credentials: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub refreshed: bool,
    pub credentials: usize,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(kind: Option<&str>, format_id: Option<&str>, title: Option<&str>) -> AcquireQuery {
        AcquireQuery {
            input: "dQw4w9WgXcQ".to_string(),
            kind: kind.map(str::to_string),
            format_id: format_id.map(str::to_string),
            title: title.map(str::to_string),
            audio: false,
            deadline_secs: None,
        }
    }

    #[test]
    fn test_kind_defaults_to_audio() {
        assert_eq!(query(None, None, None).media_kind(), Ok(MediaKind::Audio));
        assert_eq!(query(Some("video"), None, None).media_kind(), Ok(MediaKind::Video));
        assert!(query(Some("gif"), None, None).media_kind().is_err());
    }

    #[test]
    fn test_format_id_needs_title() {
        assert!(query(None, Some("137"), None).media_kind().is_err());
        let kind = query(Some("video"), Some("137"), Some("Song")).media_kind().unwrap();
        assert!(matches!(kind, MediaKind::ExplicitFormat(ref r) if r.format_id == "137"));
    }
}
