//! Normalized architecture parameters extracted from GGUF metadata

use crate::loader::gguf::{GgufMetadataTable, MetadataValue};
use serde::{Deserialize, Serialize};

/// Architecture descriptor
///
/// Every field defaults to zero when the metadata does not provide it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchitectureDescriptor {
    pub architecture: String,
    pub block_count: u64,
    pub head_count: u64,
    pub head_count_kv: u64,
    pub embedding_length: u64,
    pub feed_forward_length: u64,
    pub expert_count: u64,
    pub expert_used_count: u64,
    pub vocab_size: u64,
    pub rope_freq_base: f64,
    pub context_length: u64,
}

/// Resolve a value to an integer
///
/// Per-layer arrays (e.g. `head_count_kv` on hybrid models) resolve to their
/// maximum element.
fn resolve_u64(value: &MetadataValue) -> Option<u64> {
    if let Some(v) = value.as_u64() {
        return Some(v);
    }
    if let Some(array) = value.as_array() {
        return array.values.iter().filter_map(resolve_u64).max();
    }
    value
        .as_f64()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map(|v| v as u64)
}

fn resolve_f64(value: &MetadataValue) -> Option<f64> {
    value.as_f64().or_else(|| {
        value
            .as_array()
            .and_then(|a| a.values.first())
            .and_then(MetadataValue::as_f64)
    })
}

impl ArchitectureDescriptor {
    /// Extract the architecture from metadata
    ///
    /// Each field is looked up as `"<arch>.<field>"` first, then as the bare
    /// `"<field>"`. Never fails.
    pub fn from_metadata(table: &GgufMetadataTable) -> Self {
        let architecture = table
            .get_str("general.architecture")
            .unwrap_or("unknown")
            .to_string();

        let lookup = |field: &str| -> Option<&MetadataValue> {
            table
                .get(&format!("{}.{}", architecture, field))
                .or_else(|| table.get(field))
        };
        let int = |field: &str| lookup(field).and_then(resolve_u64).unwrap_or(0);

        let vocab_size = match int("vocab_size") {
            0 => table.array_len("tokenizer.ggml.tokens").unwrap_or(0) as u64,
            n => n,
        };

        let descriptor = Self {
            block_count: int("block_count"),
            head_count: int("attention.head_count"),
            head_count_kv: int("attention.head_count_kv"),
            embedding_length: int("embedding_length"),
            feed_forward_length: int("feed_forward_length"),
            expert_count: int("expert_count"),
            expert_used_count: int("expert_used_count"),
            vocab_size,
            rope_freq_base: lookup("rope.freq_base").and_then(resolve_f64).unwrap_or(0.0),
            context_length: int("context_length"),
            architecture,
        };

        tracing::debug!(
            "Architecture '{}': {} layers, {} heads ({} kv), embd {}, ffn {}, {} experts",
            descriptor.architecture,
            descriptor.block_count,
            descriptor.head_count,
            descriptor.head_count_kv,
            descriptor.embedding_length,
            descriptor.feed_forward_length,
            descriptor.expert_count
        );

        descriptor
    }

    /// Mixture-of-experts model
    pub fn is_moe(&self) -> bool {
        self.expert_count > 1
    }

    /// Grouped-query attention (fewer KV heads than query heads)
    pub fn is_gqa(&self) -> bool {
        self.head_count_kv > 0 && self.head_count_kv < self.head_count
    }

    pub fn head_dim(&self) -> u64 {
        if self.head_count == 0 || self.embedding_length == 0 {
            0
        } else {
            self.embedding_length / self.head_count
        }
    }

    /// KV head count, defaulting to the query head count when absent
    pub fn effective_kv_heads(&self) -> u64 {
        if self.head_count_kv == 0 {
            self.head_count
        } else {
            self.head_count_kv
        }
    }
}
