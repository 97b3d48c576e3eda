//! Weight sampling and dequantization
//!
//! Decodes a bounded, evenly strided subsample of a tensor straight from the
//! backing file. Supported decoders: F32, F16, BF16, Q8_0 and Q4_0. Every
//! other encoding is approximated byte by byte (see [`byte_fallback_value`]).

pub mod batch;
pub mod blocks;
pub mod config;
pub mod float;
pub mod sampler;

pub use batch::{plan_batches, BatchRun};
pub use blocks::byte_fallback_value;
pub use config::SamplerConfig;
pub use float::{bf16_to_f32, f16_to_f32};
pub use sampler::{sample_tensor, sample_tensors, strided_index, TensorSamples};
