//! Color modes and palettes
//!
//! All palettes are fixed lookup tables; colors are linear RGB in [0, 1].

use crate::model::TensorRole;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type Rgb = [f32; 3];

const NEGATIVE: Rgb = [0.0, 0.3, 1.0];
const ZERO: Rgb = [1.0, 1.0, 1.0];
const POSITIVE: Rgb = [1.0, 0.15, 0.1];

const DEPTH_START: Rgb = [0.1, 0.8, 0.3];
const DEPTH_MID: Rgb = [0.15, 0.35, 0.95];
const DEPTH_END: Rgb = [0.6, 0.2, 0.85];

/// Color used for global tensors in depth mode
pub const GLOBAL_GREY: Rgb = [0.6, 0.6, 0.6];

/// Maximum relative brightness change in role mode
const BRIGHTNESS_JITTER: f32 = 0.1;

/// How points are colored; one mode per generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    /// Diverging colormap over sampled weight values
    #[default]
    Weights,
    /// Fixed palette keyed by tensor role
    Role,
    /// Gradient keyed by layer index
    Depth,
}

impl ColorMode {
    pub fn name(&self) -> &'static str {
        match self {
            ColorMode::Weights => "weights",
            ColorMode::Role => "role",
            ColorMode::Depth => "depth",
        }
    }

    /// Whether this mode needs weight samples
    pub fn needs_samples(&self) -> bool {
        matches!(self, ColorMode::Weights)
    }
}

impl fmt::Display for ColorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ColorMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "weights" | "weight" | "values" => Ok(ColorMode::Weights),
            "role" | "roles" => Ok(ColorMode::Role),
            "depth" | "layer" => Ok(ColorMode::Depth),
            other => Err(format!(
                "unknown color mode '{}' (expected weights, role or depth)",
                other
            )),
        }
    }
}

/// Base palette color of a role
pub fn role_color(role: TensorRole) -> Rgb {
    match role {
        TensorRole::TokenEmbedding => [0.95, 0.75, 0.2],
        TensorRole::OutputEmbedding => [0.95, 0.55, 0.15],
        TensorRole::OutputNorm => [0.8, 0.8, 0.8],
        TensorRole::AttnNorm => [0.7, 0.7, 0.75],
        TensorRole::FfnNorm => [0.75, 0.7, 0.7],
        TensorRole::Norm => [0.65, 0.65, 0.65],
        TensorRole::AttnQ => [0.25, 0.55, 1.0],
        TensorRole::AttnK => [0.2, 0.8, 0.9],
        TensorRole::AttnV => [0.45, 0.35, 0.95],
        TensorRole::AttnOutput => [0.3, 0.4, 0.85],
        TensorRole::Attention => [0.35, 0.5, 0.9],
        TensorRole::FfnGate => [0.95, 0.35, 0.35],
        TensorRole::FfnUp => [0.95, 0.55, 0.3],
        TensorRole::FfnDown => [0.85, 0.25, 0.5],
        TensorRole::MoeGate => [0.9, 0.3, 0.6],
        TensorRole::MoeUp => [0.95, 0.45, 0.7],
        TensorRole::MoeDown => [0.75, 0.25, 0.75],
        TensorRole::MoeRouter => [1.0, 0.9, 0.3],
        TensorRole::FeedForward => [0.9, 0.4, 0.4],
        TensorRole::Unknown => [0.5, 0.5, 0.5],
    }
}

fn lerp(a: Rgb, b: Rgb, t: f32) -> Rgb {
    [
        a[0] + (b[0] - a[0]) * t,
        a[1] + (b[1] - a[1]) * t,
        a[2] + (b[2] - a[2]) * t,
    ]
}

pub fn scale(color: Rgb, factor: f32) -> Rgb {
    color.map(|c| (c * factor).clamp(0.0, 1.0))
}

/// Role color with a random brightness change of up to ±10 %
pub fn jittered_role_color<R: Rng + ?Sized>(role: TensorRole, rng: &mut R) -> Rgb {
    let factor = 1.0 + rng.gen_range(-BRIGHTNESS_JITTER..=BRIGHTNESS_JITTER);
    scale(role_color(role), factor)
}

/// Diverging blue / white / red map over [-1, 1]; NaN maps to white
pub fn diverging(value: f32) -> Rgb {
    if value.is_nan() {
        return ZERO;
    }
    let t = value.clamp(-1.0, 1.0);
    if t < 0.0 {
        lerp(ZERO, NEGATIVE, -t)
    } else {
        lerp(ZERO, POSITIVE, t)
    }
}

/// Largest finite magnitude in a sample, 0 when there is none
pub fn max_abs_finite(samples: &[f32]) -> f32 {
    samples
        .iter()
        .filter(|v| v.is_finite())
        .fold(0.0f32, |acc, v| acc.max(v.abs()))
}

/// Color of one weight value normalized by the tensor's largest magnitude
pub fn weight_color(value: f32, max_abs: f32) -> Rgb {
    if max_abs <= 0.0 {
        return ZERO;
    }
    diverging(value / max_abs)
}

/// Depth gradient by normalized layer index; globals are grey
pub fn depth_color(layer: i32, layer_count: u64) -> Rgb {
    if layer < 0 {
        return GLOBAL_GREY;
    }
    let t = if layer_count <= 1 {
        0.0
    } else {
        (layer as f32 / (layer_count - 1) as f32).clamp(0.0, 1.0)
    };
    if t < 0.5 {
        lerp(DEPTH_START, DEPTH_MID, t * 2.0)
    } else {
        lerp(DEPTH_MID, DEPTH_END, (t - 0.5) * 2.0)
    }
}
