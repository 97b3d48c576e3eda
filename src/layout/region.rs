//! Region geometry
//!
//! Every tensor gets an axis-aligned box derived only from the architecture
//! and its classification. Along the depth (z) axis each layer occupies
//! `layer_spacing` units, split into stages that follow the forward pass:
//!
//! ```text
//! attn_norm  q/k/v  attn_output  ffn_norm  gate/up(+router)  down
//!   0.0       1.5       3.5         5.0          6.5          8.5
//! ```

use super::config::LayoutConfig;
use crate::loader::gguf::TensorDescriptor;
use crate::model::{ArchitectureDescriptor, TensorClassification, TensorRole};
use serde::Serialize;

/// Depth offset of the last stage within a layer
pub const LAST_STAGE_OFFSET: f32 = 8.5;

/// Horizontal gap between the Q, K and V regions
const ATTN_GAP: f32 = 0.5;

/// Vertical gap between a matrix region and a slab placed on top of it
const SLAB_GAP: f32 = 0.1;

/// Distance between the fallback cube and the model
const FALLBACK_MARGIN: f32 = 20.0;

/// Forward-pass stage within one layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    AttnNorm,
    Qkv,
    AttnOutput,
    FfnNorm,
    GateUp,
    Down,
}

impl Stage {
    pub fn offset(&self) -> f32 {
        match self {
            Stage::AttnNorm => 0.0,
            Stage::Qkv => 1.5,
            Stage::AttnOutput => 3.5,
            Stage::FfnNorm => 5.0,
            Stage::GateUp => 6.5,
            Stage::Down => LAST_STAGE_OFFSET,
        }
    }
}

/// Axis-aligned box; (x, y, z) is the minimum corner
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Region {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub width: f32,
    pub height: f32,
    pub depth: f32,
}

impl Region {
    pub fn new(x: f32, y: f32, z: f32, width: f32, height: f32, depth: f32) -> Self {
        Self {
            x,
            y,
            z,
            width,
            height,
            depth,
        }
    }

    pub fn max_x(&self) -> f32 {
        self.x + self.width
    }

    pub fn max_y(&self) -> f32 {
        self.y + self.height
    }

    pub fn max_z(&self) -> f32 {
        self.z + self.depth
    }

    pub fn center(&self) -> [f32; 3] {
        [
            self.x + self.width / 2.0,
            self.y + self.height / 2.0,
            self.z + self.depth / 2.0,
        ]
    }

    /// Point inside the box (inclusive, with float tolerance)
    pub fn contains(&self, p: [f32; 3]) -> bool {
        const EPS: f32 = 1e-4;
        p[0] >= self.x - EPS
            && p[0] <= self.max_x() + EPS
            && p[1] >= self.y - EPS
            && p[1] <= self.max_y() + EPS
            && p[2] >= self.z - EPS
            && p[2] <= self.max_z() + EPS
    }

    /// Interiors intersect on the x axis
    pub fn overlaps_x(&self, other: &Region) -> bool {
        self.x < other.max_x() && other.x < self.max_x()
    }

    /// Interiors intersect on all three axes
    pub fn overlaps(&self, other: &Region) -> bool {
        self.overlaps_x(other)
            && self.y < other.max_y()
            && other.y < self.max_y()
            && self.z < other.max_z()
            && other.z < self.max_z()
    }
}

fn is_matrix_role(role: TensorRole) -> bool {
    matches!(
        role,
        TensorRole::AttnQ
            | TensorRole::AttnK
            | TensorRole::AttnV
            | TensorRole::AttnOutput
            | TensorRole::FfnGate
            | TensorRole::FfnUp
            | TensorRole::FfnDown
            | TensorRole::MoeGate
            | TensorRole::MoeUp
            | TensorRole::MoeDown
            | TensorRole::Attention
            | TensorRole::FeedForward
    )
}

/// Which half of the matrix height a tensor occupies
#[derive(Debug, Clone, Copy)]
enum Rows {
    Full,
    Upper,
    Lower,
}

/// Maps classified tensors to regions for one architecture
#[derive(Debug, Clone)]
pub struct LayoutEngine {
    config: LayoutConfig,
    layer_count: u64,
    unit: f32,
    q_width: f32,
    kv_width: f32,
    ffn_width: f32,
    experts: u64,
    col_width: f32,
}

impl LayoutEngine {
    pub fn new(arch: &ArchitectureDescriptor, config: &LayoutConfig) -> Self {
        let width = config.model_width;

        let heads = arch.head_count.max(1);
        let unit = width / heads as f32;
        let kv_heads = arch.effective_kv_heads().max(1);

        let ratio = if arch.embedding_length > 0 && arch.feed_forward_length > 0 {
            (arch.feed_forward_length as f32 / arch.embedding_length as f32)
                .clamp(config.min_ffn_ratio, config.max_ffn_ratio)
        } else {
            1.0
        };
        let ffn_width = width * ratio;

        let experts = if arch.is_moe() { arch.expert_count } else { 0 };
        let col_width = if experts > 0 {
            ffn_width / experts as f32
        } else {
            ffn_width
        };

        Self {
            config: config.clone(),
            layer_count: arch.block_count,
            unit,
            q_width: heads as f32 * unit,
            kv_width: kv_heads as f32 * unit,
            ffn_width,
            experts,
            col_width,
        }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn layer_count(&self) -> u64 {
        self.layer_count
    }

    /// Width contributed by one attention head
    pub fn unit_width(&self) -> f32 {
        self.unit
    }

    pub fn q_width(&self) -> f32 {
        self.q_width
    }

    pub fn kv_width(&self) -> f32 {
        self.kv_width
    }

    pub fn ffn_width(&self) -> f32 {
        self.ffn_width
    }

    /// Expert columns (0 for dense models)
    pub fn expert_count(&self) -> u64 {
        self.experts
    }

    pub fn expert_column_width(&self) -> f32 {
        self.col_width
    }

    /// Depth of a stage within a layer
    pub fn stage_depth(&self, layer: i32, stage: Stage) -> f32 {
        layer as f32 * self.config.layer_spacing + stage.offset()
    }

    /// Depth where the post-layer globals start
    fn end_depth(&self) -> f32 {
        self.layer_count as f32 * self.config.layer_spacing
    }

    fn matrix(&self, x: f32, width: f32, z: f32, rows: Rows) -> Region {
        let h = self.config.matrix_height;
        let (y, height) = match rows {
            Rows::Full => (-h / 2.0, h),
            Rows::Upper => (0.0, h / 2.0),
            Rows::Lower => (-h / 2.0, h / 2.0),
        };
        Region::new(x, y, z, width, height, self.config.stage_depth)
    }

    fn slab(&self, x: f32, width: f32, y: f32, z: f32) -> Region {
        Region::new(x, y, z, width, self.config.slab_height, self.config.stage_depth)
    }

    fn centered_slab(&self, z: f32) -> Region {
        let w = self.config.model_width;
        self.slab(-w / 2.0, w, -self.config.slab_height / 2.0, z)
    }

    /// Fixed cube off to the side for tensors with no place in the model
    pub fn fallback_region(&self) -> Region {
        let s = self.config.fallback_size;
        Region::new(
            -(self.config.model_width + FALLBACK_MARGIN),
            -s / 2.0,
            0.0,
            s,
            s,
            s,
        )
    }

    /// Left edge of Q, K and V in their shared row
    fn qkv_x(&self) -> [f32; 3] {
        let total = self.q_width + 2.0 * self.kv_width + 2.0 * ATTN_GAP;
        let q = -total / 2.0;
        let k = q + self.q_width + ATTN_GAP;
        let v = k + self.kv_width + ATTN_GAP;
        [q, k, v]
    }

    fn ffn_x0(&self) -> f32 {
        -self.ffn_width / 2.0
    }

    /// Column of expert `e` (clamped to the last column)
    fn expert_column(&self, expert: i32) -> (f32, f32) {
        let e = (expert as u64).min(self.experts.saturating_sub(1));
        let x = self.ffn_x0() + e as f32 * self.col_width;
        (x, self.col_width * self.config.expert_fill)
    }

    /// Extra column right of the experts for shared-expert tensors
    fn shared_column(&self) -> (f32, f32) {
        let gap = self.col_width * (1.0 - self.config.expert_fill);
        let x = self.ffn_x0() + self.experts as f32 * self.col_width + gap;
        (x, self.col_width * self.config.expert_fill)
    }

    fn ffn_rows(role: TensorRole) -> Rows {
        match role {
            TensorRole::FfnGate | TensorRole::MoeGate => Rows::Upper,
            TensorRole::FfnUp | TensorRole::MoeUp => Rows::Lower,
            _ => Rows::Full,
        }
    }

    fn ffn_stage(role: TensorRole) -> Stage {
        match role {
            TensorRole::FfnDown | TensorRole::MoeDown => Stage::Down,
            _ => Stage::GateUp,
        }
    }

    /// Region for a classified tensor
    ///
    /// 1-D tensors of matrix roles (biases, per-channel scales) become a
    /// thin slab on top of their matrix region.
    pub fn region(&self, c: &TensorClassification, tensor: &TensorDescriptor) -> Region {
        let region = self.base_region(c);
        if tensor.dims.len() == 1 && is_matrix_role(c.role) && c.layer >= 0 {
            return self.slab(region.x, region.width, region.max_y() + SLAB_GAP, region.z);
        }
        region
    }

    /// One region per expert for a packed `*_exps` tensor
    ///
    /// Packed tensors hold every routed expert of a layer with the expert
    /// index on `dims[2]`. Returns `None` for any other tensor, and when the
    /// model has no expert columns.
    pub fn expert_regions(
        &self,
        c: &TensorClassification,
        tensor: &TensorDescriptor,
    ) -> Option<Vec<Region>> {
        let packed = tensor.dims.get(2).copied().unwrap_or(1);
        if !c.role.is_routed() || c.expert >= 0 || c.layer < 0 || packed < 2 || self.experts == 0 {
            return None;
        }
        let columns = packed.min(self.experts) as i32;
        Some(
            (0..columns)
                .map(|expert| self.region(&TensorClassification { expert, ..*c }, tensor))
                .collect(),
        )
    }

    fn base_region(&self, c: &TensorClassification) -> Region {
        let w = self.config.model_width;
        let layer = c.layer;

        match c.role {
            TensorRole::TokenEmbedding => {
                let z = -(self.config.stage_depth + 2.0);
                return self.matrix(-w / 2.0, w, z, Rows::Full);
            }
            TensorRole::OutputNorm => return self.centered_slab(self.end_depth()),
            TensorRole::OutputEmbedding => {
                let z = self.end_depth() + Stage::Qkv.offset();
                return self.matrix(-w / 2.0, w, z, Rows::Full);
            }
            TensorRole::Unknown => return self.fallback_region(),
            _ if layer < 0 => return self.fallback_region(),
            _ => {}
        }

        let [q_x, k_x, v_x] = self.qkv_x();
        match c.role {
            TensorRole::AttnNorm | TensorRole::Norm => {
                self.centered_slab(self.stage_depth(layer, Stage::AttnNorm))
            }
            TensorRole::AttnQ => {
                self.matrix(q_x, self.q_width, self.stage_depth(layer, Stage::Qkv), Rows::Full)
            }
            TensorRole::AttnK => {
                self.matrix(k_x, self.kv_width, self.stage_depth(layer, Stage::Qkv), Rows::Full)
            }
            TensorRole::AttnV => {
                self.matrix(v_x, self.kv_width, self.stage_depth(layer, Stage::Qkv), Rows::Full)
            }
            TensorRole::Attention => {
                let span = v_x + self.kv_width - q_x;
                self.matrix(q_x, span, self.stage_depth(layer, Stage::Qkv), Rows::Full)
            }
            TensorRole::AttnOutput => {
                self.matrix(-w / 2.0, w, self.stage_depth(layer, Stage::AttnOutput), Rows::Full)
            }
            TensorRole::FfnNorm => self.centered_slab(self.stage_depth(layer, Stage::FfnNorm)),
            TensorRole::FfnGate | TensorRole::FfnUp | TensorRole::FfnDown => {
                let z = self.stage_depth(layer, Self::ffn_stage(c.role));
                let (x, width) = if self.experts > 0 {
                    self.shared_column()
                } else {
                    (self.ffn_x0(), self.ffn_width)
                };
                self.matrix(x, width, z, Self::ffn_rows(c.role))
            }
            TensorRole::MoeGate | TensorRole::MoeUp | TensorRole::MoeDown => {
                let z = self.stage_depth(layer, Self::ffn_stage(c.role));
                let (x, width) = if self.experts > 0 && c.expert >= 0 {
                    self.expert_column(c.expert)
                } else {
                    (self.ffn_x0(), self.ffn_width)
                };
                self.matrix(x, width, z, Self::ffn_rows(c.role))
            }
            TensorRole::MoeRouter => {
                let y = self.config.matrix_height / 2.0 + SLAB_GAP;
                let z = self.stage_depth(layer, Stage::GateUp);
                let span = self.col_width * self.experts.max(1) as f32;
                self.slab(self.ffn_x0(), span, y, z)
            }
            TensorRole::FeedForward => self.matrix(
                self.ffn_x0(),
                self.ffn_width,
                self.stage_depth(layer, Stage::GateUp),
                Rows::Full,
            ),
            TensorRole::TokenEmbedding
            | TensorRole::OutputNorm
            | TensorRole::OutputEmbedding
            | TensorRole::Unknown => self.fallback_region(),
        }
    }
}
