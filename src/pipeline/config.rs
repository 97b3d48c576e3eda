//! Pipeline configuration
//!
//! [`PipelineConfig`] bundles the per-stage configurations with the
//! generation parameters. Every field has a default so a JSON file only
//! needs the values it changes:
//!
//! ```json
//! { "target_points": 50000, "color_mode": "depth", "sampler": { "fan_out": 4 } }
//! ```

use crate::connections::ConnectionConfig;
use crate::error::{io_context, AtlasResult};
use crate::layout::{ColorMode, LayoutConfig};
use crate::loader::gguf::HeaderConfig;
use crate::quant::SamplerConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Total points across all tensors
    pub target_points: usize,

    /// Seed for positions, colors and connections
    pub seed: u64,

    pub color_mode: ColorMode,

    pub connections_enabled: bool,

    /// Budget for the background header parse before falling back to a
    /// synchronous parse
    pub parse_timeout_ms: u64,

    pub header: HeaderConfig,
    pub sampler: SamplerConfig,
    pub layout: LayoutConfig,
    pub connections: ConnectionConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            target_points: 200_000,
            seed: 42,
            color_mode: ColorMode::default(),
            connections_enabled: true,
            parse_timeout_ms: 30_000,
            header: HeaderConfig::default(),
            sampler: SamplerConfig::default(),
            layout: LayoutConfig::default(),
            connections: ConnectionConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a JSON configuration file; missing fields take their defaults
    pub fn from_json_file(path: &Path) -> AtlasResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| io_context(e, &format!("reading config {}", path.display())))?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> AtlasResult<Self> {
        let config: Self = serde_json::from_str(text)
            .map_err(|e| crate::config_error!("invalid pipeline config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_target_points(mut self, points: usize) -> Self {
        self.target_points = points;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_color_mode(mut self, mode: ColorMode) -> Self {
        self.color_mode = mode;
        self
    }

    pub fn with_connections(mut self, enabled: bool) -> Self {
        self.connections_enabled = enabled;
        self
    }

    pub fn with_density(mut self, density: f32) -> Self {
        self.connections.density = density;
        self
    }

    pub fn with_parse_timeout(mut self, timeout: Duration) -> Self {
        self.parse_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_header(mut self, header: HeaderConfig) -> Self {
        self.header = header;
        self
    }

    pub fn with_sampler(mut self, sampler: SamplerConfig) -> Self {
        self.sampler = sampler;
        self
    }

    pub fn with_layout(mut self, layout: LayoutConfig) -> Self {
        self.layout = layout;
        self
    }

    pub fn parse_timeout(&self) -> Duration {
        Duration::from_millis(self.parse_timeout_ms)
    }

    pub fn validate(&self) -> AtlasResult<()> {
        if self.target_points == 0 {
            return Err(crate::config_error!("target_points must be > 0"));
        }
        if self.parse_timeout_ms == 0 {
            return Err(crate::config_error!("parse_timeout_ms must be > 0"));
        }
        self.header.validate()?;
        self.sampler.validate()?;
        self.layout.validate()?;
        self.connections.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_pipeline_config_default() {
        let config = PipelineConfig::default();
        assert_eq!(config.target_points, 200_000);
        assert_eq!(config.color_mode, ColorMode::Weights);
        assert!(config.connections_enabled);
        assert_eq!(config.parse_timeout(), Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_pipeline_config_builder() {
        let config = PipelineConfig::new()
            .with_target_points(1000)
            .with_seed(7)
            .with_color_mode(ColorMode::Depth)
            .with_connections(false)
            .with_density(2.5)
            .with_parse_timeout(Duration::from_millis(250));

        assert_eq!(config.target_points, 1000);
        assert_eq!(config.seed, 7);
        assert_eq!(config.color_mode, ColorMode::Depth);
        assert!(!config.connections_enabled);
        assert_eq!(config.connections.density, 2.5);
        assert_eq!(config.parse_timeout_ms, 250);
    }

    #[test]
    fn test_partial_json() {
        let config = PipelineConfig::from_json_str(
            r#"{ "target_points": 5000, "color_mode": "role", "sampler": { "fan_out": 2 } }"#,
        )
        .unwrap();
        assert_eq!(config.target_points, 5000);
        assert_eq!(config.color_mode, ColorMode::Role);
        assert_eq!(config.sampler.fan_out, 2);
        assert_eq!(config.sampler.max_gap_blocks, SamplerConfig::default().max_gap_blocks);
        assert_eq!(config.layout, LayoutConfig::default());
    }

    #[test]
    fn test_invalid_json() {
        assert!(PipelineConfig::from_json_str("{ not json").is_err());
        assert!(PipelineConfig::from_json_str(r#"{ "target_points": 0 }"#).is_err());
        assert!(PipelineConfig::from_json_str(r#"{ "color_mode": "plaid" }"#).is_err());
    }

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "seed": 99 }}"#).unwrap();
        let config = PipelineConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.seed, 99);

        assert!(PipelineConfig::from_json_file(Path::new("/nonexistent/atlas.json")).is_err());
    }
}
