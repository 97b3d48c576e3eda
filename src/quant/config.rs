//! Sampler configuration

use crate::error::AtlasResult;
use serde::{Deserialize, Serialize};

/// Controls read batching and concurrency of weight sampling
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Tensors sampled concurrently
    pub fan_out: usize,

    /// Maximum units (blocks or elements) fetched by one read
    pub max_batch_blocks: u64,

    /// Unneeded units tolerated inside one read before splitting it
    pub max_gap_blocks: u64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            fan_out: 8,
            max_batch_blocks: 4096,
            max_gap_blocks: 8,
        }
    }
}

impl SamplerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fan_out(mut self, fan_out: usize) -> Self {
        self.fan_out = fan_out;
        self
    }

    pub fn with_max_batch_blocks(mut self, blocks: u64) -> Self {
        self.max_batch_blocks = blocks;
        self
    }

    pub fn with_max_gap_blocks(mut self, blocks: u64) -> Self {
        self.max_gap_blocks = blocks;
        self
    }

    pub fn validate(&self) -> AtlasResult<()> {
        if self.fan_out == 0 {
            return Err(crate::config_error!("fan_out must be > 0"));
        }
        if self.max_batch_blocks == 0 {
            return Err(crate::config_error!("max_batch_blocks must be > 0"));
        }
        Ok(())
    }
}
