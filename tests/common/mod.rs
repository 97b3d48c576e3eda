//! Common test utilities
//!
//! - [`fixtures`]: synthetic GGUF writer and ready-made dense / MoE models
//! - [`tempfile_helpers`]: temp files holding synthetic models
//! - [`SlowSource`]: a range source that sleeps on every read

#![allow(dead_code)]

pub mod fixtures;
pub mod tempfile_helpers;

// Each test binary uses a different subset
#[allow(unused_imports)]
pub use fixtures::{dense_model, moe_model, GgufBuilder};
#[allow(unused_imports)]
pub use tempfile_helpers::write_temp_gguf;

use gguf_atlas::loader::{MemorySource, RangeReader};
use gguf_atlas::AtlasResult;
use std::borrow::Cow;
use std::time::Duration;

/// In-memory source with an artificial delay per read
pub struct SlowSource {
    inner: MemorySource,
    delay: Duration,
}

impl SlowSource {
    pub fn new(bytes: Vec<u8>, delay: Duration) -> Self {
        Self {
            inner: MemorySource::new(bytes),
            delay,
        }
    }
}

impl RangeReader for SlowSource {
    fn len(&self) -> u64 {
        self.inner.len()
    }

    fn read_range(&self, offset: u64, len: usize) -> AtlasResult<Cow<'_, [u8]>> {
        std::thread::sleep(self.delay);
        self.inner.read_range(offset, len)
    }
}
