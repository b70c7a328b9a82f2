//! Execution plumbing shared by the strategies
//!
//! - [`http`]: reqwest client for proxy calls, size probes and streamed transfers
//! - [`retry`]: per-attempt timeout plus bounded exponential backoff
//! - [`runner`]: semaphore-gated blocking pool and first-success racing

pub mod http;
pub mod retry;
pub mod runner;

pub use http::{HttpClient, HttpError};
pub use retry::{RetryPolicy, run_with_retry};
pub use runner::{WorkerPool, race_first_ok};
