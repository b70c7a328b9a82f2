//! Tracing setup and acquisition counters

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info";

/// Install the global fmt subscriber, honouring `RUST_LOG`
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Counters for the acquisition engine
#[derive(Debug, Default)]
pub struct Metrics {
    cache_hits: AtomicU64,
    acquisitions_succeeded: AtomicU64,
    acquisitions_failed: AtomicU64,
    strategy_failures: AtomicU64,
    credential_rotations: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "cache_hits", "Metric incremented");
    }

    pub fn acquisition_succeeded(&self) {
        self.acquisitions_succeeded.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "acquisitions_succeeded", "Metric incremented");
    }

    pub fn acquisition_failed(&self) {
        self.acquisitions_failed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "acquisitions_failed", "Metric incremented");
    }

    pub fn strategy_failed(&self) {
        self.strategy_failures.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "strategy_failures", "Metric incremented");
    }

    pub fn credential_rotated(&self) {
        self.credential_rotations.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "credential_rotations", "Metric incremented");
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            acquisitions_succeeded: self.acquisitions_succeeded.load(Ordering::Relaxed),
            acquisitions_failed: self.acquisitions_failed.load(Ordering::Relaxed),
            strategy_failures: self.strategy_failures.load(Ordering::Relaxed),
            credential_rotations: self.credential_rotations.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub cache_hits: u64,
    pub acquisitions_succeeded: u64,
    pub acquisitions_failed: u64,
    pub strategy_failures: u64,
    pub credential_rotations: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_increments() {
        let metrics = Metrics::new();
        metrics.cache_hit();
        metrics.cache_hit();
        metrics.acquisition_failed();
        metrics.credential_rotated();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.cache_hits, 2);
        assert_eq!(snapshot.acquisitions_failed, 1);
        assert_eq!(snapshot.acquisitions_succeeded, 0);
        assert_eq!(snapshot.credential_rotations, 1);
    }
}
