//! The parsed GGUF header

use super::{GgufMetadataTable, TensorDescriptor};
use crate::loader::tensor_type::GgufTensorType;
use serde::Serialize;
use std::collections::BTreeMap;

/// Everything known about a GGUF file before touching tensor data
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GgufFile {
    pub version: u32,
    pub metadata: GgufMetadataTable,
    /// Tensor inventory in file order
    pub tensors: Vec<TensorDescriptor>,
    /// Absolute offset of the 32-byte aligned data section
    pub data_offset: u64,
    /// Position right after the last tensor info entry
    pub tensor_info_end: u64,
}

impl GgufFile {
    /// Look up a tensor by exact name
    pub fn tensor(&self, name: &str) -> Option<&TensorDescriptor> {
        self.tensors.iter().find(|t| t.name == name)
    }

    /// Sum of element counts over all tensors
    pub fn total_parameters(&self) -> u64 {
        self.tensors
            .iter()
            .fold(0u64, |acc, t| acc.saturating_add(t.element_count))
    }

    /// Total on-disk bytes of tensor data
    pub fn total_data_bytes(&self) -> u64 {
        self.tensors
            .iter()
            .fold(0u64, |acc, t| acc.saturating_add(t.data_size))
    }

    /// Tensor count per encoding
    pub fn encoding_histogram(&self) -> BTreeMap<GgufTensorType, usize> {
        let mut histogram = BTreeMap::new();
        for t in &self.tensors {
            *histogram.entry(t.tensor_type).or_insert(0) += 1;
        }
        histogram
    }

    /// Absolute file offset of a tensor's first byte
    pub fn absolute_offset(&self, tensor: &TensorDescriptor) -> u64 {
        tensor.absolute_offset(self.data_offset)
    }
}
