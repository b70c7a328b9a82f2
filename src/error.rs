use std::time::Duration;
use thiserror::Error;

/// Failure taxonomy for one acquisition attempt.
///
/// Strategy and attempt failures are absorbed by the chain and drive fallback;
/// only chain exhaustion reaches the caller, as an unsuccessful result.
#[derive(Debug, Error)]
pub enum AcquireError {
    #[error("invalid media reference: {0}")]
    InvalidReference(String),

    #[error("no credential files available")]
    NoCredentialsAvailable,

    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("declared size {declared} bytes exceeds ceiling of {ceiling} bytes")]
    SizeLimitExceeded { declared: u64, ceiling: u64 },

    #[error("attempt timed out after {0:?}")]
    Timeout(Duration),

    #[error("transfer integrity failure: {0}")]
    TransferIntegrityFailure(String),

    #[error("all {tried} credential files reported the asset as blocked")]
    CredentialsExhausted { tried: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AcquireError {
    /// Whether the retry controller may run the same strategy again
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::UpstreamUnavailable(_)
                | Self::Timeout(_)
                | Self::TransferIntegrityFailure(_)
                | Self::Io(_)
        )
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidReference(_) => "INVALID_REFERENCE",
            Self::NoCredentialsAvailable => "NO_CREDENTIALS_AVAILABLE",
            Self::UpstreamUnavailable(_) => "UPSTREAM_UNAVAILABLE",
            Self::SizeLimitExceeded { .. } => "SIZE_LIMIT_EXCEEDED",
            Self::Timeout(_) => "TIMEOUT",
            Self::TransferIntegrityFailure(_) => "TRANSFER_INTEGRITY_FAILURE",
            Self::CredentialsExhausted { .. } => "CREDENTIALS_EXHAUSTED",
            Self::Io(_) => "IO_ERROR",
        }
    }
}
