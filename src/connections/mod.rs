//! Dataflow connection lines between tensor regions
//!
//! Edges come from a fixed rule table ([`rules`]); each edge is summarized by
//! a handful of line segments between random points of its two ranges.

pub mod config;
pub mod rules;

pub use config::ConnectionConfig;
pub use rules::{plan_edges, ConnectionEdge, ConnectionRule, EdgeClass, INTRA_LAYER_RULES};

use crate::layout::{palette, PointCloud};
use rand::Rng;
use serde::Serialize;

/// Renderer-facing line buffers
///
/// `positions` and `colors` hold six floats per segment (two endpoints).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConnectionGraph {
    pub positions: Vec<f32>,
    pub colors: Vec<f32>,
    pub edges: Vec<ConnectionEdge>,
    /// Generation of the point cloud the segments were drawn from
    pub generation: u64,
}

impl ConnectionGraph {
    pub fn segment_count(&self) -> usize {
        self.positions.len() / 6
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Whether this graph still belongs to `cloud`
    pub fn is_current_for(&self, cloud: &PointCloud) -> bool {
        self.generation == cloud.generation
    }
}

/// Sample connection segments for a completed point cloud
pub fn build_connections<R: Rng + ?Sized>(
    cloud: &PointCloud,
    config: &ConnectionConfig,
    rng: &mut R,
) -> ConnectionGraph {
    let edges = plan_edges(&cloud.ranges);
    let mut positions = Vec::new();
    let mut colors = Vec::new();

    for edge in &edges {
        let src = &cloud.ranges[edge.source];
        let dst = &cloud.ranges[edge.target];
        let dim = match edge.class {
            EdgeClass::Intra => config.intra_dim,
            EdgeClass::CrossLayer | EdgeClass::Boundary => config.cross_dim,
        };
        let src_color = palette::scale(palette::role_color(src.classification.role), dim);
        let dst_color = palette::scale(palette::role_color(dst.classification.role), dim);

        for _ in 0..config.segment_count(src.len(), dst.len()) {
            let a = rng.gen_range(src.start..src.end);
            let b = rng.gen_range(dst.start..dst.end);
            positions.extend_from_slice(&cloud.positions[a * 3..a * 3 + 3]);
            positions.extend_from_slice(&cloud.positions[b * 3..b * 3 + 3]);
            colors.extend_from_slice(&src_color);
            colors.extend_from_slice(&dst_color);
        }
    }

    tracing::debug!(
        edges = edges.len(),
        segments = positions.len() / 6,
        generation = cloud.generation,
        "Built connections"
    );

    ConnectionGraph {
        positions,
        colors,
        edges,
        generation: cloud.generation,
    }
}
