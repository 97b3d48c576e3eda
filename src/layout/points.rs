//! Point cloud construction and coloring

use super::palette::{self, ColorMode};
use super::region::{LayoutEngine, Region};
use crate::error::AtlasResult;
use crate::loader::gguf::TensorDescriptor;
use crate::model::TensorClassification;
use crate::quant::TensorSamples;
use rand::Rng;
use serde::Serialize;

/// Contiguous slice of the point buffers belonging to one tensor
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TensorRange {
    /// First point index (inclusive)
    pub start: usize,
    /// One past the last point index
    pub end: usize,
    /// Index into the parsed tensor list
    pub tensor_index: usize,
    pub name: String,
    pub classification: TensorClassification,
    pub region: Region,
}

impl TensorRange {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, point: usize) -> bool {
        point >= self.start && point < self.end
    }
}

/// Renderer-facing point buffers
///
/// `positions` and `colors` hold three floats per point. Ranges are sorted
/// by `start` and cover the buffers without gaps.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PointCloud {
    pub positions: Vec<f32>,
    pub colors: Vec<f32>,
    pub ranges: Vec<TensorRange>,
    pub generation: u64,
}

impl PointCloud {
    pub fn len(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn position(&self, point: usize) -> Option<[f32; 3]> {
        let p = self.positions.get(point * 3..point * 3 + 3)?;
        Some([p[0], p[1], p[2]])
    }

    pub fn color(&self, point: usize) -> Option<[f32; 3]> {
        let c = self.colors.get(point * 3..point * 3 + 3)?;
        Some([c[0], c[1], c[2]])
    }

    /// Range owning a point index (used for picking)
    pub fn range_for_point(&self, point: usize) -> Option<&TensorRange> {
        let idx = self.ranges.partition_point(|r| r.end <= point);
        self.ranges.get(idx).filter(|r| r.contains(point))
    }

    /// Range of a tensor by name
    pub fn range_for_tensor(&self, name: &str) -> Option<&TensorRange> {
        self.ranges.iter().find(|r| r.name == name)
    }
}

/// Element that point `i` of `n` stands for
fn element_index(i: usize, n: usize, tensor: &TensorDescriptor) -> u64 {
    if n == 0 {
        return 0;
    }
    (i as u128 * tensor.element_count as u128 / n as u128) as u64
}

/// Column of a packed expert tensor holding `element`
///
/// Elements run expert by expert, `dims[0] * dims[1]` at a time. When the
/// tensor packs more experts than there are columns, neighbours share one.
fn packed_column(element: u64, tensor: &TensorDescriptor, columns: usize) -> usize {
    let packed = tensor.dims.get(2).copied().unwrap_or(1).max(1);
    let slice = (element / (tensor.cols() * tensor.rows())).min(packed - 1);
    let column = (slice as u128 * columns as u128 / packed as u128) as usize;
    column.min(columns.saturating_sub(1))
}

/// Position of `element` of a tensor inside its region
///
/// The element is viewed as (row, col) over `dims[1] x dims[0]`. Jitter
/// spans half a cell each way on x and y; depth is drawn independently
/// over the region's depth.
fn place_point<R: Rng + ?Sized>(
    element: u64,
    tensor: &TensorDescriptor,
    region: &Region,
    rng: &mut R,
) -> [f32; 3] {
    let cols = tensor.cols();
    let rows = tensor.rows();
    let col = element % cols;
    let row = (element / cols) % rows;

    let u = if cols == 1 { 0.5 } else { col as f32 / (cols - 1) as f32 };
    let v = if rows == 1 { 0.5 } else { row as f32 / (rows - 1) as f32 };

    let cell_w = region.width / cols as f32;
    let cell_h = region.height / rows as f32;
    let jx = rng.gen_range(-0.5f32..=0.5) * cell_w;
    let jy = rng.gen_range(-0.5f32..=0.5) * cell_h;
    let jz = rng.gen_range(0.0f32..=1.0);

    [
        (region.x + u * region.width + jx).clamp(region.x, region.max_x()),
        (region.y + v * region.height + jy).clamp(region.y, region.max_y()),
        (region.z + jz * region.depth).clamp(region.z, region.max_z()),
    ]
}

/// Lay out every tensor's points in its region
///
/// `classifications` and `allocation` are parallel to `tensors`. Packed
/// expert tensors spread their points over the expert columns while their
/// range keeps the spanning region. Colors are left black; call
/// [`apply_colors`] afterwards.
pub fn build_point_cloud<R: Rng + ?Sized>(
    engine: &LayoutEngine,
    tensors: &[TensorDescriptor],
    classifications: &[TensorClassification],
    allocation: &[usize],
    rng: &mut R,
    generation: u64,
) -> AtlasResult<PointCloud> {
    if classifications.len() != tensors.len() || allocation.len() != tensors.len() {
        return Err(crate::internal_error!(
            "layout inputs disagree: {} tensors, {} classifications, {} allocations",
            tensors.len(),
            classifications.len(),
            allocation.len()
        ));
    }

    let total: usize = allocation.iter().sum();
    let mut positions = Vec::with_capacity(total * 3);
    let mut ranges = Vec::with_capacity(tensors.len());

    for (index, ((tensor, class), &n)) in tensors
        .iter()
        .zip(classifications)
        .zip(allocation)
        .enumerate()
    {
        let region = engine.region(class, tensor);
        let experts = engine.expert_regions(class, tensor);
        let start = positions.len() / 3;
        for i in 0..n {
            let element = element_index(i, n, tensor);
            let target = match experts.as_deref() {
                Some(columns) if !columns.is_empty() => {
                    &columns[packed_column(element, tensor, columns.len())]
                }
                _ => &region,
            };
            positions.extend_from_slice(&place_point(element, tensor, target, rng));
        }
        ranges.push(TensorRange {
            start,
            end: start + n,
            tensor_index: index,
            name: tensor.name.clone(),
            classification: *class,
            region,
        });
    }

    tracing::debug!(
        points = total,
        tensors = tensors.len(),
        generation,
        "Built point cloud"
    );

    Ok(PointCloud {
        colors: vec![0.0; positions.len()],
        positions,
        ranges,
        generation,
    })
}

/// Rewrite the color buffer in place; positions are untouched
///
/// In weights mode a tensor without samples (sampling failed or was skipped)
/// falls back to its role color.
pub fn apply_colors<R: Rng + ?Sized>(
    cloud: &mut PointCloud,
    mode: ColorMode,
    samples: Option<&TensorSamples>,
    layer_count: u64,
    rng: &mut R,
) {
    let len = cloud.positions.len();
    cloud.colors.resize(len, 0.0);

    let mut fallbacks = 0usize;
    for range in &cloud.ranges {
        let n = range.len();
        let role = range.classification.role;

        let tensor_samples = match mode {
            ColorMode::Weights => samples
                .and_then(|s| s.get(range.tensor_index))
                .and_then(Option::as_ref)
                .filter(|s| !s.is_empty()),
            _ => None,
        };
        if mode == ColorMode::Weights && tensor_samples.is_none() && n > 0 {
            fallbacks += 1;
        }
        let max_abs = tensor_samples.map_or(0.0, |s| palette::max_abs_finite(s));

        for i in 0..n {
            let color = match (mode, tensor_samples) {
                (ColorMode::Weights, Some(values)) => {
                    let m = values.len();
                    let idx = (i * m / n).min(m - 1);
                    palette::weight_color(values[idx], max_abs)
                }
                (ColorMode::Depth, _) => {
                    palette::depth_color(range.classification.layer, layer_count)
                }
                _ => palette::jittered_role_color(role, rng),
            };
            let at = (range.start + i) * 3;
            cloud.colors[at..at + 3].copy_from_slice(&color);
        }
    }

    if fallbacks > 0 {
        tracing::debug!(fallbacks, "Tensors colored by role for lack of samples");
    }
}
