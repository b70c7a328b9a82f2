//! Cookie-file credentials for the extractor
//!
//! Files live in one directory and are rotated round-robin when the upstream
//! starts blocking the current one. Malformed or cloned files are deleted on
//! sight, and a fresh file can be pulled from a remote source.

mod pool;
mod refresh;
pub mod validation;

pub use pool::{CredentialFile, CredentialPool};
pub use validation::{CookieFileIssue, validate};

use std::path::PathBuf;
use thiserror::Error;

use crate::error::AcquireError;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("no credential files in {0}")]
    NoCredentialsAvailable(PathBuf),

    #[error("failed to scan credential directory: {0}")]
    Io(#[from] std::io::Error),
}

impl From<CredentialError> for AcquireError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::NoCredentialsAvailable(_) => AcquireError::NoCredentialsAvailable,
            CredentialError::Io(e) => AcquireError::Io(e),
        }
    }
}
