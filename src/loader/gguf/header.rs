//! GGUF Header Parsing and Validation
//!
//! This module handles the fixed-size GGUF preamble:
//! - Magic number validation
//! - Version verification (v2 and v3 share the same layout)
//! - Tensor and KV count reading
//! - Data section alignment

use super::GgufError;
use crate::loader::cursor::ByteCursor;

/// GGUF file magic number
pub const GGUF_MAGIC: [u8; 4] = *b"GGUF";

/// Versions with 64-bit counts and lengths
pub const SUPPORTED_VERSIONS: &[u32] = &[2, 3];

/// Data section alignment in bytes
pub const GGUF_ALIGNMENT: u64 = 32;

/// GGUF header information
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GgufHeader {
    pub version: u32,
    pub tensor_count: u64,
    pub kv_count: u64,
}

/// Validate GGUF magic number
pub fn validate_gguf_magic(cursor: &mut ByteCursor<'_>) -> Result<(), GgufError> {
    let bytes = cursor.read_bytes(4)?;
    let mut actual = [0u8; 4];
    actual.copy_from_slice(bytes);
    if actual != GGUF_MAGIC {
        return Err(GgufError::InvalidMagic {
            expected: GGUF_MAGIC,
            actual,
        });
    }
    Ok(())
}

/// Read and validate GGUF version
pub fn read_gguf_version(cursor: &mut ByteCursor<'_>) -> Result<u32, GgufError> {
    let version = cursor.read_u32()?;
    if !SUPPORTED_VERSIONS.contains(&version) {
        return Err(GgufError::UnsupportedVersion {
            found: version,
            supported: SUPPORTED_VERSIONS,
        });
    }
    Ok(version)
}

/// Parse complete GGUF header
///
/// Reads magic, version, tensor count, and KV count in sequence
pub fn parse_gguf_header(cursor: &mut ByteCursor<'_>) -> Result<GgufHeader, GgufError> {
    validate_gguf_magic(cursor)?;
    let version = read_gguf_version(cursor)?;
    let tensor_count = cursor.read_u64()?;
    let kv_count = cursor.read_u64()?;

    Ok(GgufHeader {
        version,
        tensor_count,
        kv_count,
    })
}

/// Smallest multiple of `alignment` at or after `position`
pub fn align_offset(position: u64, alignment: u64) -> u64 {
    position.div_ceil(alignment) * alignment
}
