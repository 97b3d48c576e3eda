//! Header read configuration

use crate::error::AtlasResult;
use serde::{Deserialize, Serialize};

/// Initial header read size (10 MiB)
///
/// Large enough for most tokenizer vocabularies in a single read.
pub const DEFAULT_INITIAL_READ_BYTES: u64 = 10 * 1024 * 1024;

/// Multiplier applied to the read size after each insufficient-data failure
pub const DEFAULT_GROWTH_FACTOR: u64 = 4;

/// How much of the file the header parser reads per attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeaderConfig {
    pub initial_read_bytes: u64,
    pub growth_factor: u64,
}

impl Default for HeaderConfig {
    fn default() -> Self {
        Self {
            initial_read_bytes: DEFAULT_INITIAL_READ_BYTES,
            growth_factor: DEFAULT_GROWTH_FACTOR,
        }
    }
}

impl HeaderConfig {
    pub fn with_initial_read_bytes(mut self, bytes: u64) -> Self {
        self.initial_read_bytes = bytes;
        self
    }

    pub fn with_growth_factor(mut self, factor: u64) -> Self {
        self.growth_factor = factor;
        self
    }

    pub fn validate(&self) -> AtlasResult<()> {
        if self.initial_read_bytes == 0 {
            return Err(crate::config_error!("initial_read_bytes must be > 0"));
        }
        if self.growth_factor < 2 {
            return Err(crate::config_error!(
                "growth_factor must be >= 2, got {}",
                self.growth_factor
            ));
        }
        Ok(())
    }

    /// Next read size after `current` proved too small, capped at `file_len`
    pub fn next_read_size(&self, current: u64, file_len: u64) -> u64 {
        current.saturating_mul(self.growth_factor).min(file_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HeaderConfig::default();
        assert_eq!(config.initial_read_bytes, 10 * 1024 * 1024);
        assert_eq!(config.growth_factor, 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_growth_is_capped() {
        let config = HeaderConfig::default().with_initial_read_bytes(16);
        assert_eq!(config.next_read_size(16, 1000), 64);
        assert_eq!(config.next_read_size(512, 1000), 1000);
        assert_eq!(config.next_read_size(u64::MAX, u64::MAX), u64::MAX);
    }

    #[test]
    fn test_invalid_config() {
        assert!(HeaderConfig::default().with_growth_factor(1).validate().is_err());
        assert!(HeaderConfig::default().with_initial_read_bytes(0).validate().is_err());
    }

    #[test]
    fn test_deserialize_partial() {
        let config: HeaderConfig = serde_json::from_str(r#"{"growth_factor": 8}"#).unwrap();
        assert_eq!(config.growth_factor, 8);
        assert_eq!(config.initial_read_bytes, DEFAULT_INITIAL_READ_BYTES);
    }
}
