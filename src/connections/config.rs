//! Connection sampling configuration

use crate::error::AtlasResult;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Multiplier on the per-edge segment count
    pub density: f32,

    /// Brightness factor for edges within a layer
    pub intra_dim: f32,

    /// Brightness factor for cross-layer and boundary edges
    pub cross_dim: f32,

    /// Clamp range for the segment count before the density multiplier
    pub min_segments: usize,
    pub max_segments: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            density: 1.0,
            intra_dim: 0.6,
            cross_dim: 0.35,
            min_segments: 8,
            max_segments: 100,
        }
    }
}

impl ConnectionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_density(mut self, density: f32) -> Self {
        self.density = density;
        self
    }

    /// Segments drawn between two ranges of the given sizes
    pub fn segment_count(&self, source_points: usize, target_points: usize) -> usize {
        let base = (source_points.min(target_points) as f32)
            .sqrt()
            .clamp(self.min_segments as f32, self.max_segments as f32);
        (base * self.density).round().max(0.0) as usize
    }

    pub fn validate(&self) -> AtlasResult<()> {
        if !(self.density.is_finite() && self.density >= 0.0) {
            return Err(crate::config_error!(
                "density must be >= 0, got {}",
                self.density
            ));
        }
        for (name, value) in [("intra_dim", self.intra_dim), ("cross_dim", self.cross_dim)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(crate::config_error!("{} must be in [0, 1], got {}", name, value));
            }
        }
        if self.min_segments > self.max_segments {
            return Err(crate::config_error!(
                "min_segments ({}) must be <= max_segments ({})",
                self.min_segments,
                self.max_segments
            ));
        }
        Ok(())
    }
}
