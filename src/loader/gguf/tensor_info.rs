//! GGUF Tensor Information Parsing
//!
//! This module handles the tensor inventory that follows the metadata table:
//! - Reading tensor info (name, shape, encoding, offset)
//! - Deriving element counts and on-disk byte sizes
//! - Name filtering used by the CLI

use super::GgufError;
use crate::loader::cursor::ByteCursor;
use crate::loader::tensor_type::GgufTensorType;
use serde::Serialize;

/// ggml supports at most 4 dimensions; anything far beyond that is corruption
pub const MAX_TENSOR_DIMS: u32 = 8;

/// One entry of the tensor inventory
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TensorDescriptor {
    pub name: String,
    /// ggml order: `dims[0]` is the fastest-varying (column) dimension
    pub dims: Vec<u64>,
    pub tensor_type: GgufTensorType,
    /// Byte offset relative to the start of the data section
    pub offset: u64,
    pub element_count: u64,
    /// On-disk bytes; for unknown encodings measured from the neighbouring
    /// tensor offsets once the whole inventory is known
    pub data_size: u64,
}

impl TensorDescriptor {
    /// Build a descriptor, deriving element count and byte size
    ///
    /// Unknown encodings start with a byte size of 0.
    pub fn new(
        name: impl Into<String>,
        dims: Vec<u64>,
        tensor_type: GgufTensorType,
        offset: u64,
    ) -> Result<Self, GgufError> {
        let name = name.into();
        if dims.is_empty() {
            return Err(GgufError::InvalidTensorShape {
                name,
                reason: "tensor has no dimensions".to_string(),
            });
        }
        let element_count = dims
            .iter()
            .try_fold(1u64, |acc, &d| acc.checked_mul(d))
            .ok_or_else(|| GgufError::InvalidTensorShape {
                name: name.clone(),
                reason: format!("element count of {:?} overflows u64", dims),
            })?;
        let data_size = tensor_type.data_size(element_count).unwrap_or(0);

        Ok(Self {
            name,
            dims,
            tensor_type,
            offset,
            element_count,
            data_size,
        })
    }

    /// Columns of the 2D view (`dims[0]`)
    pub fn cols(&self) -> u64 {
        self.dims.first().copied().unwrap_or(1).max(1)
    }

    /// Rows of the 2D view (`dims[1]`, 1 for vectors)
    pub fn rows(&self) -> u64 {
        self.dims.get(1).copied().unwrap_or(1).max(1)
    }

    /// Absolute file offset given the data section start
    pub fn absolute_offset(&self, data_offset: u64) -> u64 {
        data_offset.saturating_add(self.offset)
    }
}

/// Parse one tensor info entry
pub fn parse_tensor_info(cursor: &mut ByteCursor<'_>) -> Result<TensorDescriptor, GgufError> {
    let name = cursor.read_string()?;

    let n_dims = cursor.read_u32()?;
    if n_dims == 0 || n_dims > MAX_TENSOR_DIMS {
        return Err(GgufError::InvalidTensorShape {
            name,
            reason: format!("{} dimensions (expected 1..={})", n_dims, MAX_TENSOR_DIMS),
        });
    }

    let mut dims = Vec::with_capacity(n_dims as usize);
    for _ in 0..n_dims {
        dims.push(cursor.read_u64()?);
    }

    let tensor_type = GgufTensorType::from_u32(cursor.read_u32()?);

    let offset = cursor.read_u64()?;

    TensorDescriptor::new(name, dims, tensor_type, offset)
}

/// Byte sizes for tensors whose encoding has no known block geometry
///
/// Such a tensor is assumed to run up to the next tensor in offset order,
/// or to the end of the data section (`data_len` bytes) for the last one.
pub fn measure_unknown_sizes(tensors: &mut [TensorDescriptor], data_len: u64) {
    if tensors.iter().all(|t| t.tensor_type.is_known()) {
        return;
    }
    let mut offsets: Vec<u64> = tensors.iter().map(|t| t.offset).collect();
    offsets.sort_unstable();
    offsets.dedup();

    for t in tensors.iter_mut().filter(|t| !t.tensor_type.is_known()) {
        let next = offsets.partition_point(|&o| o <= t.offset);
        let end = offsets.get(next).copied().unwrap_or(data_len);
        t.data_size = end.saturating_sub(t.offset);
        tracing::debug!(
            "Tensor '{}' has unknown encoding {}; assuming {} bytes",
            t.name,
            t.tensor_type,
            t.data_size
        );
    }
}

/// Glob match over tensor names: `*` matches any run, `?` one character
pub fn match_pattern(name: &str, pattern: &str) -> bool {
    let name: Vec<char> = name.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();
    let (mut n, mut p) = (0, 0);
    // Last `*` seen and the name position it was tried against
    let mut star: Option<(usize, usize)> = None;

    while n < name.len() {
        match pattern.get(p) {
            Some('*') => {
                star = Some((p, n));
                p += 1;
            }
            Some(&c) if c == '?' || c == name[n] => {
                n += 1;
                p += 1;
            }
            _ => match star {
                Some((sp, sn)) => {
                    p = sp + 1;
                    n = sn + 1;
                    star = Some((sp, sn + 1));
                }
                None => return false,
            },
        }
    }
    pattern[p..].iter().all(|&c| c == '*')
}
