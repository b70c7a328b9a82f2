use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::{Capability, StrategyConfig};

/// Static description of a strategy's place in the chain
#[derive(Debug, Clone)]
pub struct StrategyDescriptor {
    pub name: String,
    pub capabilities: Vec<Capability>,
    /// Lower runs first
    pub priority: i32,
    pub per_attempt_timeout: Duration,
}

impl StrategyDescriptor {
    pub fn from_config(config: &StrategyConfig) -> Self {
        Self {
            name: config.name.clone(),
            capabilities: config.kinds.clone(),
            priority: config.priority,
            per_attempt_timeout: config.attempt_timeout(),
        }
    }

    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}

/// Outcome of one successful attempt; the file is already at its destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transfer {
    pub bytes_written: u64,
}

/// What the caller gets back from an acquisition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AcquisitionResult {
    pub file_path: Option<PathBuf>,
    pub success: bool,
    pub strategy_used: Option<String>,
    pub bytes_written: u64,
}

impl AcquisitionResult {
    pub const CACHE: &'static str = "cache";

    pub fn succeeded(file_path: PathBuf, strategy: impl Into<String>, bytes_written: u64) -> Self {
        Self {
            file_path: Some(file_path),
            success: true,
            strategy_used: Some(strategy.into()),
            bytes_written,
        }
    }

    /// Existing file served without any transfer
    pub fn cached(file_path: PathBuf) -> Self {
        Self::succeeded(file_path, Self::CACHE, 0)
    }

    pub fn failed() -> Self {
        Self {
            file_path: None,
            success: false,
            strategy_used: None,
            bytes_written: 0,
        }
    }
}
