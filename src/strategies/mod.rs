//! Acquisition strategies and the fallback chain that runs them

mod chain;
mod extractor;
mod proxy_api;
mod traits;
mod types;

pub use chain::{StrategyChain, StrategyDeps};
pub use extractor::ExtractorStrategy;
pub use proxy_api::ProxyApiStrategy;
pub use traits::AcquisitionStrategy;
pub use types::{AcquisitionResult, StrategyDescriptor, Transfer};
