use async_trait::async_trait;

use super::types::{StrategyDescriptor, Transfer};
use crate::error::AcquireError;
use crate::reference::{MediaKind, MediaRef};
use crate::storage::DownloadTarget;

/// One way of turning a [`MediaRef`] into a file on disk.
///
/// `attempt` writes only to `target.temp_path` (or paths derived from it) and
/// renames onto `target.dest_path` as its last step, so a failed or cancelled
/// attempt never leaves a partial file at the destination.
#[async_trait]
pub trait AcquisitionStrategy: Send + Sync {
    fn descriptor(&self) -> &StrategyDescriptor;

    fn supports(&self, kind: &MediaKind) -> bool {
        self.descriptor().supports(kind.capability())
    }

    async fn attempt(
        &self,
        media: &MediaRef,
        target: &DownloadTarget,
    ) -> Result<Transfer, AcquireError>;
}
