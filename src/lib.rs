pub mod api;
pub mod config;
pub mod credentials;
pub mod engine;
pub mod error;
pub mod extractor;
pub mod metadata;
pub mod observability;
pub mod reference;
pub mod storage;
pub mod strategies;
pub mod units;
pub mod worker;
