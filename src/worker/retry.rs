//! Bounded retry with exponential backoff and a hard per-attempt timeout

use std::time::Duration;
use tracing::{debug, warn};

use crate::config::StrategyConfig;
use crate::error::AcquireError;
use crate::reference::MediaRef;
use crate::storage::DownloadTarget;
use crate::strategies::{AcquisitionStrategy, Transfer};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    pub attempt_timeout: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &StrategyConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_backoff: Duration::from_millis(config.retry_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
            attempt_timeout: config.attempt_timeout(),
        }
    }

    /// Single attempt, no backoff
    pub fn once(attempt_timeout: Duration) -> Self {
        Self {
            max_attempts: 1,
            base_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            attempt_timeout,
        }
    }

    /// Delay after the `attempt`-th failure (1-based): base * 2^(attempt-1), capped
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// Run `strategy` under `policy`.
///
/// Each attempt is bounded by the policy timeout; a timed-out attempt is
/// dropped, which cancels any in-flight transfer. Temp artifacts are discarded
/// after every failure. Only retryable errors get another attempt.
pub async fn run_with_retry(
    strategy: &dyn AcquisitionStrategy,
    policy: &RetryPolicy,
    media: &MediaRef,
    target: &DownloadTarget,
) -> Result<Transfer, AcquireError> {
    let name = strategy.descriptor().name.as_str();
    let mut attempt = 0;

    loop {
        attempt += 1;

        let outcome =
            match tokio::time::timeout(policy.attempt_timeout, strategy.attempt(media, target))
                .await
            {
                Ok(outcome) => outcome,
                Err(_) => Err(AcquireError::Timeout(policy.attempt_timeout)),
            };

        let err = match outcome {
            Ok(transfer) => {
                if attempt > 1 {
                    debug!(strategy = name, attempt, "Attempt succeeded after retry");
                }
                return Ok(transfer);
            }
            Err(err) => err,
        };

        target.discard().await;

        if !err.is_retryable() || attempt >= policy.max_attempts {
            warn!(
                strategy = name,
                media_id = %media.canonical_id,
                attempt,
                error = %err,
                "Strategy attempt failed"
            );
            return Err(err);
        }

        let delay = policy.backoff(attempt);
        warn!(
            strategy = name,
            media_id = %media.canonical_id,
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "Strategy attempt failed, retrying"
        );
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::MediaKind;
    use crate::storage::{DownloadStore, OutputFormats};
    use crate::strategies::StrategyDescriptor;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tempfile::TempDir;

    struct Scripted {
        descriptor: StrategyDescriptor,
        calls: AtomicU32,
        script: Mutex<Vec<Result<Transfer, AcquireError>>>,
        hang: bool,
    }

    impl Scripted {
        fn new(script: Vec<Result<Transfer, AcquireError>>) -> Self {
            Self {
                descriptor: StrategyDescriptor {
                    name: "scripted".to_string(),
                    capabilities: vec![crate::config::Capability::Audio],
                    priority: 0,
                    per_attempt_timeout: Duration::from_secs(1),
                },
                calls: AtomicU32::new(0),
                script: Mutex::new(script),
                hang: false,
            }
        }
    }

    #[async_trait]
    impl AcquisitionStrategy for Scripted {
        fn descriptor(&self) -> &StrategyDescriptor {
            &self.descriptor
        }

        async fn attempt(
            &self,
            _media: &MediaRef,
            target: &DownloadTarget,
        ) -> Result<Transfer, AcquireError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::fs::write(&target.temp_path, b"partial").await?;
            if self.hang {
                std::future::pending::<()>().await;
            }
            self.script.lock().unwrap().remove(0)
        }
    }

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(4),
            attempt_timeout: Duration::from_millis(200),
        }
    }

    fn fixture() -> (TempDir, MediaRef, DownloadTarget) {
        let dir = TempDir::new().unwrap();
        let media = MediaRef::resolve("dQw4w9WgXcQ").unwrap();
        let target = DownloadStore::new(dir.path(), OutputFormats::default())
            .target_for(&media.canonical_id, &MediaKind::Audio);
        (dir, media, target)
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_millis(1500),
            attempt_timeout: Duration::from_secs(1),
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(500));
        assert_eq!(policy.backoff(2), Duration::from_millis(1000));
        assert_eq!(policy.backoff(3), Duration::from_millis(1500));
        assert_eq!(policy.backoff(40), Duration::from_millis(1500));
    }

    #[tokio::test]
    async fn test_retries_transient_failures() {
        let (_dir, media, target) = fixture();
        let strategy = Scripted::new(vec![
            Err(AcquireError::UpstreamUnavailable("502".to_string())),
            Ok(Transfer { bytes_written: 7 }),
        ]);

        let result = run_with_retry(&strategy, &policy(3), &media, &target).await;

        assert_eq!(result.unwrap().bytes_written, 7);
        assert_eq!(strategy.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_refusal_is_not_retried() {
        let (_dir, media, target) = fixture();
        let strategy = Scripted::new(vec![
            Err(AcquireError::SizeLimitExceeded {
                declared: 10,
                ceiling: 5,
            }),
            Ok(Transfer { bytes_written: 1 }),
        ]);

        let result = run_with_retry(&strategy, &policy(3), &media, &target).await;

        assert!(matches!(result, Err(AcquireError::SizeLimitExceeded { .. })));
        assert_eq!(strategy.calls.load(Ordering::SeqCst), 1);
        assert!(!target.temp_path.exists());
    }

    #[tokio::test]
    async fn test_attempts_are_bounded() {
        let (_dir, media, target) = fixture();
        let strategy = Scripted::new(vec![
            Err(AcquireError::UpstreamUnavailable("a".to_string())),
            Err(AcquireError::UpstreamUnavailable("b".to_string())),
            Ok(Transfer { bytes_written: 1 }),
        ]);

        let result = run_with_retry(&strategy, &policy(2), &media, &target).await;

        assert!(matches!(result, Err(AcquireError::UpstreamUnavailable(m)) if m == "b"));
        assert_eq!(strategy.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_timeout_cancels_and_cleans_up() {
        let (_dir, media, target) = fixture();
        let mut strategy = Scripted::new(Vec::new());
        strategy.hang = true;

        let result = run_with_retry(&strategy, &policy(1), &media, &target).await;

        assert!(matches!(result, Err(AcquireError::Timeout(_))));
        assert!(!target.temp_path.exists());
        assert!(!target.dest_path.exists());
    }
}
