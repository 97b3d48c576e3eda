//! Tensor name classification
//!
//! Maps a dotted tensor name such as `blk.3.ffn_down_exps.weight` or
//! `model.layers.3.self_attn.q_proj.weight` to a semantic role plus layer
//! and expert indices. Matching works on lowercase dot-separated segments.
//! More specific patterns are tried first: norms before everything else,
//! the MoE router before routed projections, routed projections before
//! their dense counterparts.

use serde::Serialize;
use std::fmt;

/// Semantic role of a tensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TensorRole {
    TokenEmbedding,
    OutputEmbedding,
    OutputNorm,
    AttnNorm,
    AttnQ,
    AttnK,
    AttnV,
    AttnOutput,
    FfnNorm,
    FfnGate,
    FfnUp,
    FfnDown,
    MoeGate,
    MoeUp,
    MoeDown,
    MoeRouter,
    Attention,
    FeedForward,
    Norm,
    Unknown,
}

impl TensorRole {
    pub const ALL: [TensorRole; 20] = [
        TensorRole::TokenEmbedding,
        TensorRole::OutputEmbedding,
        TensorRole::OutputNorm,
        TensorRole::AttnNorm,
        TensorRole::AttnQ,
        TensorRole::AttnK,
        TensorRole::AttnV,
        TensorRole::AttnOutput,
        TensorRole::FfnNorm,
        TensorRole::FfnGate,
        TensorRole::FfnUp,
        TensorRole::FfnDown,
        TensorRole::MoeGate,
        TensorRole::MoeUp,
        TensorRole::MoeDown,
        TensorRole::MoeRouter,
        TensorRole::Attention,
        TensorRole::FeedForward,
        TensorRole::Norm,
        TensorRole::Unknown,
    ];

    /// Per-expert projections
    pub fn is_routed(&self) -> bool {
        matches!(self, TensorRole::MoeGate | TensorRole::MoeUp | TensorRole::MoeDown)
    }

    pub fn is_qkv(&self) -> bool {
        matches!(self, TensorRole::AttnQ | TensorRole::AttnK | TensorRole::AttnV)
    }

    pub fn name(&self) -> &'static str {
        match self {
            TensorRole::TokenEmbedding => "token_embedding",
            TensorRole::OutputEmbedding => "output_embedding",
            TensorRole::OutputNorm => "output_norm",
            TensorRole::AttnNorm => "attn_norm",
            TensorRole::AttnQ => "attn_q",
            TensorRole::AttnK => "attn_k",
            TensorRole::AttnV => "attn_v",
            TensorRole::AttnOutput => "attn_output",
            TensorRole::FfnNorm => "ffn_norm",
            TensorRole::FfnGate => "ffn_gate",
            TensorRole::FfnUp => "ffn_up",
            TensorRole::FfnDown => "ffn_down",
            TensorRole::MoeGate => "moe_gate",
            TensorRole::MoeUp => "moe_up",
            TensorRole::MoeDown => "moe_down",
            TensorRole::MoeRouter => "moe_router",
            TensorRole::Attention => "attention",
            TensorRole::FeedForward => "feed_forward",
            TensorRole::Norm => "norm",
            TensorRole::Unknown => "unknown",
        }
    }
}

impl fmt::Display for TensorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Role plus layer and expert coordinates (−1 when absent)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TensorClassification {
    pub role: TensorRole,
    pub layer: i32,
    pub expert: i32,
}

impl TensorClassification {
    pub fn new(role: TensorRole, layer: i32, expert: i32) -> Self {
        Self {
            role,
            layer,
            expert,
        }
    }

    /// Not tied to a transformer block
    pub fn is_global(&self) -> bool {
        self.layer < 0
    }
}

const LAYER_MARKERS: &[&str] = &["blk", "layers"];
const EMBEDDING_SEGMENTS: &[&str] = &[
    "token_embd",
    "embed_tokens",
    "wte",
    "tok_embeddings",
    "word_embeddings",
];
const OUTPUT_NORM_SEGMENTS: &[&str] = &["output_norm", "norm", "ln_f", "norm_f", "final_layernorm"];

fn parse_index(segment: Option<&&str>) -> Option<i32> {
    segment.and_then(|s| s.parse::<i32>().ok()).filter(|n| *n >= 0)
}

fn layer_index(segments: &[&str]) -> i32 {
    segments
        .iter()
        .position(|s| LAYER_MARKERS.contains(s))
        .and_then(|i| parse_index(segments.get(i + 1)))
        .unwrap_or(-1)
}

/// `experts.<N>` or `<..gate|..up|..down>.<N>`
fn expert_index(segments: &[&str]) -> i32 {
    for (i, seg) in segments.iter().enumerate() {
        let marker = *seg == "experts"
            || seg.ends_with("gate")
            || seg.ends_with("up")
            || seg.ends_with("down");
        if marker {
            if let Some(n) = parse_index(segments.get(i + 1)) {
                return n;
            }
        }
    }
    -1
}

fn has(segments: &[&str], pred: impl Fn(&str) -> bool) -> bool {
    segments.iter().any(|s| pred(s))
}

fn router(segments: &[&str]) -> bool {
    segments.iter().enumerate().any(|(i, seg)| {
        *seg == "ffn_gate_inp"
            || *seg == "router"
            || (*seg == "gate"
                && i > 0
                && matches!(segments[i - 1], "block_sparse_moe" | "mlp" | "moe")
                && parse_index(segments.get(i + 1)).is_none())
    })
}

fn routed_role(segments: &[&str]) -> Option<TensorRole> {
    for (i, seg) in segments.iter().enumerate() {
        let numbered = parse_index(segments.get(i + 1)).is_some();
        match *seg {
            "ffn_gate_exps" => return Some(TensorRole::MoeGate),
            "ffn_up_exps" => return Some(TensorRole::MoeUp),
            "ffn_down_exps" => return Some(TensorRole::MoeDown),
            "ffn_gate" if numbered => return Some(TensorRole::MoeGate),
            "ffn_up" if numbered => return Some(TensorRole::MoeUp),
            "ffn_down" if numbered => return Some(TensorRole::MoeDown),
            "experts" => {
                // experts.<N>.<proj> or experts.<proj>
                let rest = &segments[i + 1..];
                for proj in rest {
                    match *proj {
                        "w1" | "gate_proj" => return Some(TensorRole::MoeGate),
                        "w3" | "up_proj" => return Some(TensorRole::MoeUp),
                        "w2" | "down_proj" => return Some(TensorRole::MoeDown),
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }
    None
}

fn projection_role(seg: &str) -> Option<TensorRole> {
    let role = match seg {
        "attn_q" | "q_proj" | "wq" => TensorRole::AttnQ,
        "attn_k" | "k_proj" | "wk" => TensorRole::AttnK,
        "attn_v" | "v_proj" | "wv" => TensorRole::AttnV,
        "attn_output" | "attn_out" | "o_proj" | "out_proj" | "wo" => TensorRole::AttnOutput,
        _ => return None,
    };
    Some(role)
}

/// Dense FFN; `ffn_gate_shexp` (shared expert) lands here too
fn dense_ffn_role(seg: &str) -> Option<TensorRole> {
    if seg.starts_with("ffn_gate") || seg == "gate_proj" || seg == "w1" {
        Some(TensorRole::FfnGate)
    } else if seg.starts_with("ffn_up") || seg == "up_proj" || seg == "w3" {
        Some(TensorRole::FfnUp)
    } else if seg.starts_with("ffn_down") || seg == "down_proj" || seg == "w2" {
        Some(TensorRole::FfnDown)
    } else {
        None
    }
}

/// Classify a tensor by name
pub fn classify(name: &str) -> TensorClassification {
    let lower = name.to_ascii_lowercase();
    let segments: Vec<&str> = lower.split('.').collect();
    let layer = layer_index(&segments);
    let segs = segments.as_slice();

    let role = if layer < 0 && has(segs, |s| OUTPUT_NORM_SEGMENTS.contains(&s)) {
        TensorRole::OutputNorm
    } else if has(segs, |s| matches!(s, "attn_norm" | "input_layernorm" | "ln_1" | "attention_norm")) {
        TensorRole::AttnNorm
    } else if has(segs, |s| matches!(s, "ffn_norm" | "post_attention_layernorm" | "ln_2")) {
        TensorRole::FfnNorm
    } else if has(segs, |s| s.contains("norm")) {
        TensorRole::Norm
    } else if router(segs) {
        TensorRole::MoeRouter
    } else if let Some(role) = routed_role(segs) {
        role
    } else if let Some(role) = segs.iter().find_map(|s| projection_role(s)) {
        role
    } else if let Some(role) = segs.iter().find_map(|s| dense_ffn_role(s)) {
        role
    } else if has(segs, |s| EMBEDDING_SEGMENTS.contains(&s)) {
        TensorRole::TokenEmbedding
    } else if layer < 0 && has(segs, |s| matches!(s, "output" | "lm_head")) {
        TensorRole::OutputEmbedding
    } else if has(segs, |s| s.contains("attn") || s.contains("attention")) {
        TensorRole::Attention
    } else if has(segs, |s| s.contains("ffn") || s.contains("mlp") || s.contains("feed_forward")) {
        TensorRole::FeedForward
    } else {
        TensorRole::Unknown
    };

    let expert = if role.is_routed() {
        expert_index(segs)
    } else {
        -1
    };

    TensorClassification::new(role, layer, expert)
}
