//! Layout geometry configuration

use crate::error::AtlasResult;
use serde::{Deserialize, Serialize};

/// Geometry constants for the 3D layout
///
/// All distances are in scene units. The depth (z) axis follows the forward
/// pass; x spans matrix columns and y spans matrix rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Width of attention-sized regions (Q, attention output, norms, globals)
    pub model_width: f32,

    /// Depth distance between consecutive layers
    pub layer_spacing: f32,

    /// Height of matrix regions
    pub matrix_height: f32,

    /// Height of norm slabs, routers and 1-D tensors
    pub slab_height: f32,

    /// Depth thickness of every stage region
    pub stage_depth: f32,

    /// Clamp range for the FFN width ratio (ffn / embedding)
    pub min_ffn_ratio: f32,
    pub max_ffn_ratio: f32,

    /// Fraction of an expert column occupied by its region
    pub expert_fill: f32,

    /// Floor on points allocated to any tensor
    pub min_points_per_tensor: usize,

    /// Edge length of the cube holding unclassified tensors
    pub fallback_size: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            model_width: 8.0,
            layer_spacing: 10.0,
            matrix_height: 4.0,
            slab_height: 0.25,
            stage_depth: 1.0,
            min_ffn_ratio: 0.5,
            max_ffn_ratio: 6.0,
            expert_fill: 0.9,
            min_points_per_tensor: 20,
            fallback_size: 4.0,
        }
    }
}

impl LayoutConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model_width(mut self, width: f32) -> Self {
        self.model_width = width;
        self
    }

    pub fn with_layer_spacing(mut self, spacing: f32) -> Self {
        self.layer_spacing = spacing;
        self
    }

    pub fn with_min_points_per_tensor(mut self, min: usize) -> Self {
        self.min_points_per_tensor = min;
        self
    }

    pub fn validate(&self) -> AtlasResult<()> {
        let positive = [
            ("model_width", self.model_width),
            ("layer_spacing", self.layer_spacing),
            ("matrix_height", self.matrix_height),
            ("slab_height", self.slab_height),
            ("stage_depth", self.stage_depth),
            ("min_ffn_ratio", self.min_ffn_ratio),
            ("fallback_size", self.fallback_size),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(crate::config_error!("{} must be > 0, got {}", name, value));
            }
        }
        if self.max_ffn_ratio < self.min_ffn_ratio {
            return Err(crate::config_error!(
                "max_ffn_ratio ({}) must be >= min_ffn_ratio ({})",
                self.max_ffn_ratio,
                self.min_ffn_ratio
            ));
        }
        if !(self.expert_fill > 0.0 && self.expert_fill <= 1.0) {
            return Err(crate::config_error!(
                "expert_fill must be in (0, 1], got {}",
                self.expert_fill
            ));
        }
        // Stages must fit inside one layer
        if self.layer_spacing < super::region::LAST_STAGE_OFFSET + self.stage_depth {
            return Err(crate::config_error!(
                "layer_spacing {} is too small for the stage layout",
                self.layer_spacing
            ));
        }
        Ok(())
    }
}
