//! Single-element decoders for the block formats the sampler understands
//!
//! Q8_0 format: 8-bit quantization with an f16 scale
//! - Block size: 32 elements
//! - Per block (34 bytes): 2 bytes f16 scale + 32 bytes int8 values
//! - Dequantization: value = scale * quant
//!
//! Q4_0 format: 4-bit quantization with an f16 scale
//! - Block size: 32 elements
//! - Per block (18 bytes): 2 bytes f16 scale + 16 bytes packed nibbles
//! - Element j < 16 is the low nibble of byte j, element j >= 16 the high
//!   nibble of byte j - 16
//! - Dequantization: value = scale * (nibble - 8)

use super::float::read_f16_le;

pub const Q8_0_BLOCK_SIZE: usize = 32;
pub const Q8_0_BLOCK_BYTES: usize = 34;
pub const Q4_0_BLOCK_SIZE: usize = 32;
pub const Q4_0_BLOCK_BYTES: usize = 18;

/// Block scale (first two bytes of a Q8_0 or Q4_0 block)
pub fn block_scale(block: &[u8]) -> f32 {
    read_f16_le(block)
}

/// Signed code of element `j` in a Q8_0 block
pub fn q8_0_code(block: &[u8], j: usize) -> i8 {
    block[2 + j] as i8
}

/// Unsigned nibble of element `j` in a Q4_0 block
pub fn q4_0_code(block: &[u8], j: usize) -> u8 {
    if j < Q4_0_BLOCK_SIZE / 2 {
        block[2 + j] & 0x0F
    } else {
        block[2 + j - Q4_0_BLOCK_SIZE / 2] >> 4
    }
}

pub fn dequant_q8_0(scale: f32, code: i8) -> f32 {
    scale * code as f32
}

pub fn dequant_q4_0(scale: f32, code: u8) -> f32 {
    scale * (code as i32 - 8) as f32
}

/// Approximate value for encodings without a decoder
///
/// Interprets a raw byte as a signed 8-bit integer scaled to [-1, 1). This
/// is not a faithful decode; values from different encodings are not
/// comparable with each other.
pub fn byte_fallback_value(byte: u8) -> f32 {
    byte as i8 as f32 / 128.0
}
