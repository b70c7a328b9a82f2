//! Identifier resolution: arbitrary link shapes -> canonical 11-character media id

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

use crate::config::Capability;
use crate::error::AcquireError;

pub const WATCH_BASE: &str = "https://www.youtube.com/watch?v=";
pub const PLAYLIST_BASE: &str = "https://www.youtube.com/playlist?list=";

/// Shape-specific patterns, tried in order; the first match wins
static LINK_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // youtu.be/<id>
        r"(?i)(?:^|[/.])youtu\.be/([A-Za-z0-9_-]{11})(?:$|[^A-Za-z0-9_-])",
        // youtube.com/watch?...v=<id>, music.youtube.com/watch?v=<id>
        r"(?i)youtube(?:-nocookie)?\.com/watch\?(?:[^#]*&)?v=([A-Za-z0-9_-]{11})(?:$|[^A-Za-z0-9_-])",
        // youtube.com/{embed,shorts,live,v,e}/<id>
        r"(?i)youtube(?:-nocookie)?\.com/(?:embed|shorts|live|v|e)/([A-Za-z0-9_-]{11})(?:$|[^A-Za-z0-9_-])",
    ]
    .iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
});

static BARE_TOKEN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").ok());

static KNOWN_HOST: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)(?:youtube\.com|youtu\.be|music\.youtube\.com)").ok());

/// Requested output family for an acquisition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MediaKind {
    Audio,
    Video,
    /// Caller-picked format id written under a caller-picked title
    ExplicitFormat(FormatRequest),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatRequest {
    pub format_id: String,
    pub title: String,
    /// Transcode to audio instead of merging into a video container
    #[serde(default)]
    pub audio: bool,
}

impl MediaKind {
    pub fn label(&self) -> &'static str {
        match self {
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
            MediaKind::ExplicitFormat(_) => "explicit_format",
        }
    }

    /// Strategy capability needed to serve this kind
    pub fn capability(&self) -> Capability {
        match self {
            MediaKind::Audio => Capability::Audio,
            MediaKind::Video => Capability::Video,
            MediaKind::ExplicitFormat(_) => Capability::FormatSpecific,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A resolved, immutable request target
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaRef {
    pub raw_input: String,
    pub canonical_id: String,
    pub canonical_url: String,
    pub media_kind: MediaKind,
}

impl MediaRef {
    /// Resolve `raw` into a reference for audio; see [`MediaRef::with_kind`]
    pub fn resolve(raw: &str) -> Result<Self, AcquireError> {
        let canonical_id = extract_id(raw)?;
        Ok(Self {
            raw_input: raw.to_string(),
            canonical_url: format!("{}{}", WATCH_BASE, canonical_id),
            canonical_id,
            media_kind: MediaKind::Audio,
        })
    }

    pub fn with_kind(mut self, kind: MediaKind) -> Self {
        self.media_kind = kind;
        self
    }
}

/// Strip surrounding whitespace and angle brackets chat clients wrap links in
pub fn clean_input(raw: &str) -> &str {
    raw.trim().trim_matches(|c| c == '<' || c == '>').trim()
}

/// Extract the canonical id from a link or bare token
pub fn extract_id(raw: &str) -> Result<String, AcquireError> {
    let link = clean_input(raw);

    for pattern in LINK_PATTERNS.iter() {
        if let Some(id) = pattern.captures(link).and_then(|c| c.get(1)) {
            return Ok(id.as_str().to_string());
        }
    }

    if is_bare_token(link) {
        return Ok(link.to_string());
    }

    Err(AcquireError::InvalidReference(link.to_string()))
}

pub fn is_bare_token(text: &str) -> bool {
    BARE_TOKEN.as_ref().is_some_and(|re| re.is_match(text))
}

/// Whether the text mentions a recognized media host
pub fn is_supported_link(raw: &str) -> bool {
    KNOWN_HOST
        .as_ref()
        .is_some_and(|re| re.is_match(clean_input(raw)))
}

/// Expand a bare playlist id to its canonical URL; links pass through
pub fn playlist_url(link_or_id: &str) -> String {
    let cleaned = clean_input(link_or_id);
    if cleaned.contains("://") || is_supported_link(cleaned) {
        cleaned.to_string()
    } else {
        format!("{}{}", PLAYLIST_BASE, cleaned)
    }
}
