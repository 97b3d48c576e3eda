//! GGUF (GPT-Generated Unified Format) header parsing
//!
//! This module turns the prefix of a GGUF file into a [`GgufFile`]:
//! - Magic and version validation (v2 and v3)
//! - The metadata key/value table, including nested arrays
//! - The tensor inventory and the 32-byte aligned data-section start
//! - Adaptive buffer growth when the header is larger than the first read
//!
//! Tensor data itself is never loaded here; the sampler reads it lazily
//! through a [`RangeReader`](crate::loader::RangeReader).
//!
//! # Module Structure
//!
//! - `header`: magic, version and count parsing, alignment
//! - `metadata`: value types and the [`GgufMetadataTable`]
//! - `tensor_info`: [`TensorDescriptor`] parsing
//! - `types`: the parsed [`GgufFile`]
//! - `config`: [`HeaderConfig`] (initial read size and growth)
//! - `loader_impl`: buffer parsing and the retry loop
//!
//! # Example
//!
//! ```ignore
//! use gguf_atlas::loader::{gguf::{parse_gguf, HeaderConfig}, MmapGguf};
//!
//! let source = MmapGguf::open(Path::new("model.gguf"))?;
//! let file = parse_gguf(&source, &HeaderConfig::default(), None)?;
//! println!("{} tensors, data at {}", file.tensors.len(), file.data_offset);
//! ```

mod config;
mod header;
mod loader_impl;
mod metadata;
mod tensor_info;
mod types;

use crate::loader::cursor::InsufficientData;

pub use config::HeaderConfig;
pub use header::{
    align_offset, parse_gguf_header, read_gguf_version, validate_gguf_magic, GgufHeader,
    GGUF_ALIGNMENT, GGUF_MAGIC, SUPPORTED_VERSIONS,
};
pub use loader_impl::{parse_gguf, parse_gguf_bytes};
pub use metadata::{
    read_kv_pair, read_value, GgufMetadataTable, GgufValueType, MetadataArray, MetadataValue,
    MAX_ARRAY_DEPTH,
};
pub use tensor_info::{
    match_pattern, measure_unknown_sizes, parse_tensor_info, TensorDescriptor, MAX_TENSOR_DIMS,
};
pub use types::GgufFile;

/// Format-level failures while parsing a GGUF header
///
/// `InsufficientData` only means "the buffer was too small"; [`parse_gguf`]
/// retries on it and converts it to [`GgufError::Truncated`] once the whole
/// file has been read. Every other variant is fatal.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GgufError {
    #[error(transparent)]
    InsufficientData(#[from] InsufficientData),

    #[error(
        "invalid GGUF magic: expected {:?}, found {:?}",
        String::from_utf8_lossy(expected),
        String::from_utf8_lossy(actual)
    )]
    InvalidMagic { expected: [u8; 4], actual: [u8; 4] },

    #[error("unsupported GGUF version {found} (supported: {supported:?})")]
    UnsupportedVersion {
        found: u32,
        supported: &'static [u32],
    },

    #[error("unknown metadata value type {tag} for key '{key}'")]
    UnknownValueType { tag: u32, key: String },

    #[error("invalid shape for tensor '{name}': {reason}")]
    InvalidTensorShape { name: String, reason: String },

    #[error("metadata array '{key}' nested deeper than {depth} levels")]
    ArrayNestingTooDeep { key: String, depth: usize },

    #[error(
        "file truncated: {file_len} bytes, header parse needed {needed} more bytes at position {position}"
    )]
    Truncated {
        file_len: u64,
        position: usize,
        needed: u64,
    },
}

/// GGUF format regression tests
///
/// Reference: https://github.com/ggml-org/ggml/blob/master/include/gguf.h
#[cfg(test)]
mod gguf_spec_tests {
    use super::*;
    use crate::loader::tensor_type::GgufTensorType;

    /// ggml tensor types from ggml.h enum ggml_type
    #[test]
    fn test_ggml_tensor_types_match_spec() {
        assert_eq!(GgufTensorType::F32.tag(), 0, "GGML_TYPE_F32");
        assert_eq!(GgufTensorType::F16.tag(), 1, "GGML_TYPE_F16");
        assert_eq!(GgufTensorType::Q4_0.tag(), 2, "GGML_TYPE_Q4_0");
        assert_eq!(GgufTensorType::Q8_0.tag(), 8, "GGML_TYPE_Q8_0");
        assert_eq!(GgufTensorType::BF16.tag(), 30, "GGML_TYPE_BF16");
        assert_eq!(GgufTensorType::Q4_0_4_4.tag(), 31, "GGML_TYPE_Q4_0_4_4");
        assert_eq!(GgufTensorType::MXFP4.tag(), 39, "GGML_TYPE_MXFP4");
    }

    #[test]
    fn test_error_messages_carry_context() {
        let err = GgufError::InvalidMagic {
            expected: GGUF_MAGIC,
            actual: *b"GGML",
        };
        let msg = err.to_string();
        assert!(msg.contains("GGUF") && msg.contains("GGML"));

        let err = GgufError::UnsupportedVersion {
            found: 1,
            supported: SUPPORTED_VERSIONS,
        };
        assert_eq!(err.to_string(), "unsupported GGUF version 1 (supported: [2, 3])");

        let err = GgufError::Truncated {
            file_len: 100,
            position: 96,
            needed: 8,
        };
        assert!(err.to_string().contains("100 bytes"));
    }
}
