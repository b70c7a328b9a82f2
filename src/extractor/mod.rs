//! External extractor tool boundary
//!
//! The tool is synchronous and may block for minutes, so every call goes
//! through [`crate::worker::WorkerPool`]. [`YtDlpTool`] is the production
//! implementation; tests substitute their own.

mod ytdlp;

pub use ytdlp::YtDlpTool;

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::error::AcquireError;

/// Stderr fragments meaning the upstream refused this credential identity
const CREDENTIAL_BLOCK_MARKERS: &[&str] = &[
    "sign in to confirm",
    "not a bot",
    "cookies are no longer valid",
    "cookies have expired",
    "http error 429",
    "too many requests",
    "content isn't available, try again later",
];

/// Stderr fragments meaning the asset itself cannot be served
const UNAVAILABLE_MARKERS: &[&str] = &[
    "video unavailable",
    "private video",
    "this video is not available",
    "has been removed",
    "not available in your country",
    "requested format is not available",
    "members-only content",
];

#[derive(Debug, Error)]
pub enum ExtractorError {
    #[error("extractor binary not found: {0}")]
    ToolNotFound(String),

    #[error("asset unavailable: {message}")]
    Unavailable {
        message: String,
        credential_blocked: bool,
    },

    #[error("extractor timed out after {0:?}")]
    Timeout(Duration),

    #[error("extractor failed: {0}")]
    Failed(String),

    #[error("could not parse extractor output: {0}")]
    Parse(String),

    #[error("worker pool closed")]
    PoolClosed,
}

impl ExtractorError {
    /// Whether a different credential file might succeed
    pub fn is_credential_block(&self) -> bool {
        matches!(
            self,
            Self::Unavailable {
                credential_blocked: true,
                ..
            }
        )
    }

    /// Classify a failed run from its stderr
    pub fn from_stderr(stderr: &str) -> Self {
        let message = last_error_line(stderr);
        let lowered = stderr.to_lowercase();

        if CREDENTIAL_BLOCK_MARKERS.iter().any(|m| lowered.contains(m)) {
            return Self::Unavailable {
                message,
                credential_blocked: true,
            };
        }
        if UNAVAILABLE_MARKERS.iter().any(|m| lowered.contains(m)) {
            return Self::Unavailable {
                message,
                credential_blocked: false,
            };
        }
        Self::Failed(message)
    }
}

impl From<ExtractorError> for AcquireError {
    fn from(err: ExtractorError) -> Self {
        match err {
            ExtractorError::Timeout(after) => AcquireError::Timeout(after),
            other => AcquireError::UpstreamUnavailable(other.to_string()),
        }
    }
}

fn last_error_line(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    lines
        .iter()
        .rev()
        .find(|l| l.starts_with("ERROR"))
        .or(lines.last())
        .map(|l| l.to_string())
        .unwrap_or_else(|| "no output".to_string())
}

/// Post-processing for audio output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioTranscode {
    pub codec: String,
    pub bitrate: String,
}

/// Everything one download run needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionRequest {
    pub url: String,
    pub format: String,
    pub cookies: Option<PathBuf>,
    /// Output path without extension; the tool appends the real one
    pub output_stem: PathBuf,
    pub transcode: Option<AudioTranscode>,
    /// Container to merge separate audio and video streams into
    pub merge_format: Option<String>,
}

/// One downloadable format as listed by the tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormatInfo {
    pub format: String,
    pub format_id: String,
    pub ext: String,
    pub filesize: Option<u64>,
    pub format_note: String,
    pub url: String,
}

/// One search or lookup result
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    pub id: String,
    pub title: String,
    pub duration_display: String,
    pub thumbnail_url: String,
    pub url: String,
}

/// Synchronous extractor capability. Implementations may block.
pub trait ExtractorTool: Send + Sync + 'static {
    /// Download per `request`; returns the file the tool produced
    fn download(&self, request: &ExtractionRequest) -> Result<PathBuf, ExtractorError>;

    /// Total declared size for `format` without downloading, when known
    fn declared_size(
        &self,
        url: &str,
        format: &str,
        cookies: Option<&Path>,
    ) -> Result<Option<u64>, ExtractorError>;

    fn formats(&self, url: &str, cookies: Option<&Path>) -> Result<Vec<FormatInfo>, ExtractorError>;

    /// Direct media URL for `format`, for callers that stream instead of download
    fn stream_url(
        &self,
        url: &str,
        format: &str,
        cookies: Option<&Path>,
    ) -> Result<String, ExtractorError>;

    /// Search results, or a single lookup when `query` is a link
    fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, ExtractorError>;

    /// Media ids of a playlist, at most `limit`
    fn playlist(&self, url: &str, limit: usize) -> Result<Vec<String>, ExtractorError>;
}
