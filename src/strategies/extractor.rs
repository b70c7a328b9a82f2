use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::traits::AcquisitionStrategy;
use super::types::{StrategyDescriptor, Transfer};
use crate::config::{ExtractorConfig, SizeCeilings, StrategyConfig};
use crate::credentials::{CredentialFile, CredentialPool};
use crate::error::AcquireError;
use crate::extractor::{AudioTranscode, ExtractionRequest, ExtractorError, ExtractorTool};
use crate::observability::Metrics;
use crate::reference::{MediaKind, MediaRef};
use crate::storage::DownloadTarget;
use crate::units::ByteSize;
use crate::worker::WorkerPool;

/// Format selection and post-processing for one kind
#[derive(Debug, Clone, PartialEq, Eq)]
struct Plan {
    format: String,
    transcode: Option<AudioTranscode>,
    merge_format: Option<String>,
}

/// Local extractor tool authenticated with rotating cookie files.
///
/// When the tool reports a credential-tied block, the next file not yet
/// blocked in this request is used. Blocked files are recorded on the
/// request's [`DownloadTarget`], so retries never come back to them.
/// Every tool run writes under its own stem, so a run orphaned by an attempt
/// timeout cannot collide with the retry that follows it.
pub struct ExtractorStrategy {
    descriptor: StrategyDescriptor,
    tool: Arc<dyn ExtractorTool>,
    pool: WorkerPool,
    credentials: Arc<CredentialPool>,
    settings: ExtractorConfig,
    ceilings: SizeCeilings,
    metrics: Arc<Metrics>,
}

impl ExtractorStrategy {
    pub fn new(
        config: &StrategyConfig,
        settings: ExtractorConfig,
        tool: Arc<dyn ExtractorTool>,
        pool: WorkerPool,
        credentials: Arc<CredentialPool>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            descriptor: StrategyDescriptor::from_config(config),
            tool,
            pool,
            credentials,
            settings,
            ceilings: config.max_bytes.clone(),
            metrics,
        }
    }

    fn plan(&self, kind: &MediaKind) -> Plan {
        let bounded = format!(
            "[height<=?{}][width<=?{}]",
            self.settings.max_height, self.settings.max_width
        );
        match kind {
            MediaKind::Audio => Plan {
                format: "bestaudio/best".to_string(),
                transcode: Some(AudioTranscode {
                    codec: self.settings.audio_codec.clone(),
                    bitrate: self.settings.audio_bitrate.clone(),
                }),
                merge_format: None,
            },
            MediaKind::Video => Plan {
                format: format!("best{bounded}[ext=mp4]/best{bounded}"),
                transcode: None,
                merge_format: Some("mp4".to_string()),
            },
            MediaKind::ExplicitFormat(request) if request.audio => Plan {
                format: request.format_id.clone(),
                transcode: Some(AudioTranscode {
                    codec: self.settings.explicit_audio_codec.clone(),
                    bitrate: self.settings.audio_bitrate.clone(),
                }),
                merge_format: None,
            },
            MediaKind::ExplicitFormat(request) => Plan {
                format: format!("{}+140", request.format_id),
                transcode: None,
                merge_format: Some("mp4".to_string()),
            },
        }
    }

    /// Refuse when the tool declares more bytes than the ceiling allows
    async fn check_declared_size(
        &self,
        media: &MediaRef,
        plan: &Plan,
        credential: &CredentialFile,
        ceiling: ByteSize,
    ) -> Result<(), ExtractorOutcome> {
        let tool = self.tool.clone();
        let url = media.canonical_url.clone();
        let format = plan.format.clone();
        let cookies = credential.path.clone();

        let declared = self
            .pool
            .run(move || tool.declared_size(&url, &format, Some(&cookies)))
            .await
            .map_err(ExtractorOutcome::Tool)?;

        match declared {
            Some(declared) if ceiling.is_exceeded_by(declared) => {
                Err(ExtractorOutcome::Refused(AcquireError::SizeLimitExceeded {
                    declared,
                    ceiling: ceiling.as_u64(),
                }))
            }
            Some(declared) => {
                debug!(declared, ceiling = %ceiling, "Declared size within ceiling");
                Ok(())
            }
            None => {
                debug!("Extractor declared no size, continuing");
                Ok(())
            }
        }
    }

    async fn download_with(
        &self,
        media: &MediaRef,
        plan: &Plan,
        credential: &CredentialFile,
        target: &DownloadTarget,
    ) -> Result<PathBuf, ExtractorOutcome> {
        let request = ExtractionRequest {
            url: media.canonical_url.clone(),
            format: plan.format.clone(),
            cookies: Some(credential.path.clone()),
            output_stem: target.run_stem(),
            transcode: plan.transcode.clone(),
            merge_format: plan.merge_format.clone(),
        };
        let tool = self.tool.clone();

        self.pool
            .run(move || tool.download(&request))
            .await
            .map_err(ExtractorOutcome::Tool)
    }

    /// Next credential this request has not already seen blocked
    fn next_unspent(&self, target: &DownloadTarget) -> Result<Option<CredentialFile>, AcquireError> {
        for _ in 0..self.credentials.len() {
            let candidate = self.credentials.rotate()?;
            if !target.is_spent(&candidate.path) {
                self.metrics.credential_rotated();
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }
}

/// Failure inside one credential's run
enum ExtractorOutcome {
    Tool(ExtractorError),
    Refused(AcquireError),
}

#[async_trait]
impl AcquisitionStrategy for ExtractorStrategy {
    fn descriptor(&self) -> &StrategyDescriptor {
        &self.descriptor
    }

    async fn attempt(
        &self,
        media: &MediaRef,
        target: &DownloadTarget,
    ) -> Result<Transfer, AcquireError> {
        let plan = self.plan(&media.media_kind);
        let ceiling = self.ceilings.for_capability(media.media_kind.capability());

        let mut credential = self.credentials.current()?;
        if target.is_spent(&credential.path) {
            credential = match self.next_unspent(target)? {
                Some(next) => next,
                None => {
                    return Err(AcquireError::CredentialsExhausted {
                        tried: target.spent_count(),
                    });
                }
            };
        }
        let mut size_checked = ceiling.is_none();

        loop {
            let mut outcome = Ok(());
            if !size_checked {
                if let Some(ceiling) = ceiling {
                    outcome = self
                        .check_declared_size(media, &plan, &credential, ceiling)
                        .await;
                }
            }

            let produced = match outcome {
                Ok(()) => {
                    size_checked = true;
                    self.download_with(media, &plan, &credential, target).await
                }
                Err(e) => Err(e),
            };

            let err = match produced {
                Ok(path) => {
                    let bytes_written = target.commit_file(&path).await?;
                    info!(
                        strategy = %self.descriptor.name,
                        media_id = %media.canonical_id,
                        credential = %credential.path.display(),
                        bytes = bytes_written,
                        "Extractor download completed"
                    );
                    return Ok(Transfer { bytes_written });
                }
                Err(ExtractorOutcome::Refused(refusal)) => return Err(refusal),
                Err(ExtractorOutcome::Tool(err)) => err,
            };

            if !err.is_credential_block() {
                return Err(err.into());
            }

            self.credentials.record_failure(&credential.path);
            target.mark_spent(&credential.path);
            target.discard().await;

            match self.next_unspent(target)? {
                Some(next) => {
                    warn!(
                        media_id = %media.canonical_id,
                        from = %credential.path.display(),
                        to = %next.path.display(),
                        "Credential blocked, rotating"
                    );
                    credential = next;
                }
                None => {
                    return Err(AcquireError::CredentialsExhausted {
                        tried: target.spent_count(),
                    });
                }
            }
        }
    }
}
