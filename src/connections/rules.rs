//! Dataflow rule table and edge planning

use crate::layout::TensorRange;
use crate::model::TensorRole;
use serde::Serialize;
use std::collections::BTreeMap;

/// Kind of edge; each kind has its own dim factor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeClass {
    /// Between stages of one layer
    Intra,
    /// From one layer's output to the next layer's input
    CrossLayer,
    /// Between the globals and the first/last layer
    Boundary,
}

/// Source role feeding a set of target roles within one layer
#[derive(Debug, Clone, Copy)]
pub struct ConnectionRule {
    pub from: TensorRole,
    pub to: &'static [TensorRole],
    /// Routed endpoints must share the expert index
    pub expert_matched: bool,
}

const fn rule(from: TensorRole, to: &'static [TensorRole]) -> ConnectionRule {
    ConnectionRule {
        from,
        to,
        expert_matched: false,
    }
}

const fn matched(from: TensorRole, to: &'static [TensorRole]) -> ConnectionRule {
    ConnectionRule {
        from,
        to,
        expert_matched: true,
    }
}

use TensorRole::*;

/// Intra-layer dataflow
pub static INTRA_LAYER_RULES: &[ConnectionRule] = &[
    rule(AttnNorm, &[AttnQ, AttnK, AttnV]),
    rule(AttnQ, &[AttnOutput]),
    rule(AttnK, &[AttnOutput]),
    rule(AttnV, &[AttnOutput]),
    rule(AttnOutput, &[FfnNorm]),
    rule(FfnNorm, &[FfnGate, FfnUp, MoeRouter, MoeGate, MoeUp]),
    rule(MoeRouter, &[MoeGate, MoeUp]),
    rule(FfnGate, &[FfnDown]),
    rule(FfnUp, &[FfnDown]),
    matched(MoeGate, &[MoeDown]),
    matched(MoeUp, &[MoeDown]),
];

const LAYER_OUTPUTS: &[TensorRole] = &[FfnDown, MoeDown];

/// One (source range, target range) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConnectionEdge {
    /// Index into `PointCloud::ranges`
    pub source: usize,
    pub target: usize,
    pub class: EdgeClass,
}

fn with_role<'a>(
    ranges: &'a [TensorRange],
    members: &'a [usize],
    roles: &'a [TensorRole],
) -> impl Iterator<Item = usize> + 'a {
    members
        .iter()
        .copied()
        .filter(move |&i| roles.contains(&ranges[i].classification.role))
}

/// Entry ranges of a layer: its attention norm, else its Q/K/V
fn layer_entry(ranges: &[TensorRange], members: &[usize]) -> Vec<usize> {
    let norms: Vec<usize> = with_role(ranges, members, &[AttnNorm]).collect();
    if !norms.is_empty() {
        return norms;
    }
    with_role(ranges, members, &[AttnQ, AttnK, AttnV]).collect()
}

/// All edges implied by the rule table for a set of ranges
///
/// Ranges without points never take part.
pub fn plan_edges(ranges: &[TensorRange]) -> Vec<ConnectionEdge> {
    let mut layers: BTreeMap<i32, Vec<usize>> = BTreeMap::new();
    let mut globals = Vec::new();
    for (i, range) in ranges.iter().enumerate() {
        if range.is_empty() {
            continue;
        }
        if range.classification.layer >= 0 {
            layers.entry(range.classification.layer).or_default().push(i);
        } else {
            globals.push(i);
        }
    }

    let mut edges = Vec::new();
    let mut push = |source: usize, target: usize, class: EdgeClass| {
        edges.push(ConnectionEdge {
            source,
            target,
            class,
        })
    };

    for members in layers.values() {
        for rule in INTRA_LAYER_RULES {
            for src in with_role(ranges, members, &[rule.from]) {
                for dst in with_role(ranges, members, rule.to) {
                    let (a, b) = (
                        ranges[src].classification.expert,
                        ranges[dst].classification.expert,
                    );
                    if rule.expert_matched && a >= 0 && b >= 0 && a != b {
                        continue;
                    }
                    push(src, dst, EdgeClass::Intra);
                }
            }
        }
    }

    let ordered: Vec<(&i32, &Vec<usize>)> = layers.iter().collect();
    for pair in ordered.windows(2) {
        let ((&layer, members), (&next, next_members)) = (pair[0], pair[1]);
        if next != layer + 1 {
            continue;
        }
        let entry = layer_entry(ranges, next_members);
        for src in with_role(ranges, members, LAYER_OUTPUTS) {
            for &dst in &entry {
                push(src, dst, EdgeClass::CrossLayer);
            }
        }
    }

    let output_norms: Vec<usize> = with_role(ranges, &globals, &[OutputNorm]).collect();
    let outputs: Vec<usize> = with_role(ranges, &globals, &[OutputEmbedding]).collect();

    if let Some((_, first)) = layers.iter().next() {
        let entry = layer_entry(ranges, first);
        for src in with_role(ranges, &globals, &[TokenEmbedding]) {
            for &dst in &entry {
                push(src, dst, EdgeClass::Boundary);
            }
        }
    }
    if let Some((_, last)) = layers.iter().next_back() {
        let sinks = if output_norms.is_empty() {
            &outputs
        } else {
            &output_norms
        };
        for src in with_role(ranges, last, LAYER_OUTPUTS) {
            for &dst in sinks {
                push(src, dst, EdgeClass::Boundary);
            }
        }
    }
    for &src in &output_norms {
        for &dst in &outputs {
            push(src, dst, EdgeClass::Boundary);
        }
    }

    edges
}
