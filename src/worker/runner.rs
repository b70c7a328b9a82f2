//! Blocking-work pool and first-success racing

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::extractor::ExtractorError;

/// Bounded pool for blocking extractor calls.
///
/// Each job holds a permit for its whole run, so at most `workers` extractor
/// processes exist at once no matter how many requests are in flight.
#[derive(Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    workers: usize,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            permits: Arc::new(Semaphore::new(workers)),
            workers,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Run `job` on the blocking thread pool once a permit is free
    pub async fn run<T, F>(&self, job: F) -> Result<T, ExtractorError>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T, ExtractorError> + Send + 'static,
    {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ExtractorError::PoolClosed)?;

        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            job()
        })
        .await
        .map_err(|e| ExtractorError::Failed(format!("worker panicked: {}", e)))?
    }
}

/// Poll all futures concurrently and return the first `Ok`.
///
/// Remaining futures are dropped (cancelled) as soon as one succeeds. If every
/// future fails, all errors are returned in completion order.
pub async fn race_first_ok<T, E, Fut>(futures: impl IntoIterator<Item = Fut>) -> Result<T, Vec<E>>
where
    Fut: Future<Output = Result<T, E>>,
{
    let mut pending: FuturesUnordered<Fut> = futures.into_iter().collect();
    let mut errors = Vec::new();

    while let Some(outcome) = pending.next().await {
        match outcome {
            Ok(value) => return Ok(value),
            Err(e) => errors.push(e),
        }
    }

    Err(errors)
}
