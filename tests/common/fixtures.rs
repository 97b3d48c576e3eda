//! Synthetic GGUF files for tests
//!
//! [`GgufBuilder`] writes a complete GGUF file (header, metadata, tensor
//! infos and aligned tensor data) into memory or onto disk.

use gguf_atlas::loader::GgufTensorType;
use std::io::Write;
use std::path::Path;

const ALIGNMENT: usize = 32;

// GGUF metadata value type tags
const TYPE_U32: u32 = 4;
const TYPE_I32: u32 = 5;
const TYPE_F32: u32 = 6;
const TYPE_BOOL: u32 = 7;
const TYPE_STRING: u32 = 8;
const TYPE_ARRAY: u32 = 9;
const TYPE_U64: u32 = 10;

fn push_string(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(&(s.len() as u64).to_le_bytes());
    out.extend_from_slice(s.as_bytes());
}

fn align(n: usize) -> usize {
    n.div_ceil(ALIGNMENT) * ALIGNMENT
}

struct TensorSpec {
    name: String,
    dims: Vec<u64>,
    type_tag: u32,
    data: Vec<u8>,
    /// Replaces the computed offset (for corrupt-offset tests)
    offset_override: Option<u64>,
}

/// Builder for an in-memory GGUF file
pub struct GgufBuilder {
    version: u32,
    kvs: Vec<(String, u32, Vec<u8>)>,
    tensors: Vec<TensorSpec>,
}

impl Default for GgufBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GgufBuilder {
    pub fn new() -> Self {
        Self {
            version: 3,
            kvs: Vec::new(),
            tensors: Vec::new(),
        }
    }

    pub fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    fn kv(mut self, key: &str, tag: u32, value: Vec<u8>) -> Self {
        self.kvs.push((key.to_string(), tag, value));
        self
    }

    pub fn kv_u32(self, key: &str, value: u32) -> Self {
        self.kv(key, TYPE_U32, value.to_le_bytes().to_vec())
    }

    pub fn kv_i32(self, key: &str, value: i32) -> Self {
        self.kv(key, TYPE_I32, value.to_le_bytes().to_vec())
    }

    pub fn kv_u64(self, key: &str, value: u64) -> Self {
        self.kv(key, TYPE_U64, value.to_le_bytes().to_vec())
    }

    pub fn kv_f32(self, key: &str, value: f32) -> Self {
        self.kv(key, TYPE_F32, value.to_le_bytes().to_vec())
    }

    pub fn kv_bool(self, key: &str, value: bool) -> Self {
        self.kv(key, TYPE_BOOL, vec![value as u8])
    }

    pub fn kv_str(self, key: &str, value: &str) -> Self {
        let mut bytes = Vec::new();
        push_string(&mut bytes, value);
        self.kv(key, TYPE_STRING, bytes)
    }

    pub fn kv_str_array(self, key: &str, values: &[&str]) -> Self {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&TYPE_STRING.to_le_bytes());
        bytes.extend_from_slice(&(values.len() as u64).to_le_bytes());
        for v in values {
            push_string(&mut bytes, v);
        }
        self.kv(key, TYPE_ARRAY, bytes)
    }

    pub fn kv_u32_array(self, key: &str, values: &[u32]) -> Self {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&TYPE_U32.to_le_bytes());
        bytes.extend_from_slice(&(values.len() as u64).to_le_bytes());
        for v in values {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        self.kv(key, TYPE_ARRAY, bytes)
    }

    /// Tensor with raw, already encoded data
    pub fn tensor_raw(mut self, name: &str, dims: &[u64], ty: GgufTensorType, data: Vec<u8>) -> Self {
        self.tensors.push(TensorSpec {
            name: name.to_string(),
            dims: dims.to_vec(),
            type_tag: ty.tag(),
            data,
            offset_override: None,
        });
        self
    }

    pub fn tensor_f32(self, name: &str, dims: &[u64], values: &[f32]) -> Self {
        let data = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.tensor_raw(name, dims, GgufTensorType::F32, data)
    }

    /// F32 tensor whose element i holds `f(i)`
    pub fn tensor_f32_with(self, name: &str, dims: &[u64], f: impl Fn(usize) -> f32) -> Self {
        let n: u64 = dims.iter().product();
        let values: Vec<f32> = (0..n as usize).map(f).collect();
        self.tensor_f32(name, dims, &values)
    }

    pub fn tensor_f16(self, name: &str, dims: &[u64], values: &[f32]) -> Self {
        let data = values
            .iter()
            .flat_map(|v| half::f16::from_f32(*v).to_bits().to_le_bytes())
            .collect();
        self.tensor_raw(name, dims, GgufTensorType::F16, data)
    }

    /// Q8_0 tensor; `blocks` holds (scale, 32 codes) per block
    pub fn tensor_q8_0(self, name: &str, dims: &[u64], blocks: &[(f32, [i8; 32])]) -> Self {
        let mut data = Vec::with_capacity(blocks.len() * 34);
        for (scale, codes) in blocks {
            data.extend_from_slice(&half::f16::from_f32(*scale).to_bits().to_le_bytes());
            data.extend(codes.iter().map(|&q| q as u8));
        }
        self.tensor_raw(name, dims, GgufTensorType::Q8_0, data)
    }

    /// Tensor info entry whose offset points wherever the test wants
    pub fn tensor_with_offset(mut self, name: &str, dims: &[u64], ty: GgufTensorType, offset: u64) -> Self {
        self.tensors.push(TensorSpec {
            name: name.to_string(),
            dims: dims.to_vec(),
            type_tag: ty.tag(),
            data: Vec::new(),
            offset_override: Some(offset),
        });
        self
    }

    /// Raw encoding tag with no data bytes
    pub fn tensor_with_tag(self, name: &str, dims: &[u64], tag: u32) -> Self {
        self.tensor_tagged(name, dims, tag, Vec::new())
    }

    /// Raw encoding tag followed by `data`
    pub fn tensor_tagged(mut self, name: &str, dims: &[u64], tag: u32, data: Vec<u8>) -> Self {
        self.tensors.push(TensorSpec {
            name: name.to_string(),
            dims: dims.to_vec(),
            type_tag: tag,
            data,
            offset_override: None,
        });
        self
    }

    /// Size of everything before the data section
    pub fn header_len(&self) -> usize {
        self.build_parts().0.len()
    }

    fn build_parts(&self) -> (Vec<u8>, Vec<u8>) {
        let mut out = Vec::new();
        out.extend_from_slice(b"GGUF");
        out.extend_from_slice(&self.version.to_le_bytes());
        out.extend_from_slice(&(self.tensors.len() as u64).to_le_bytes());
        out.extend_from_slice(&(self.kvs.len() as u64).to_le_bytes());

        for (key, tag, value) in &self.kvs {
            push_string(&mut out, key);
            out.extend_from_slice(&tag.to_le_bytes());
            out.extend_from_slice(value);
        }

        let mut data = Vec::new();
        for t in &self.tensors {
            let offset = match t.offset_override {
                Some(offset) => offset,
                None => {
                    data.resize(align(data.len()), 0);
                    let offset = data.len() as u64;
                    data.extend_from_slice(&t.data);
                    offset
                }
            };
            push_string(&mut out, &t.name);
            out.extend_from_slice(&(t.dims.len() as u32).to_le_bytes());
            for d in &t.dims {
                out.extend_from_slice(&d.to_le_bytes());
            }
            out.extend_from_slice(&t.type_tag.to_le_bytes());
            out.extend_from_slice(&offset.to_le_bytes());
        }
        (out, data)
    }

    pub fn build(&self) -> Vec<u8> {
        let (mut out, data) = self.build_parts();
        out.resize(align(out.len()), 0);
        out.extend_from_slice(&data);
        out
    }

    pub fn write_to(&self, path: &Path) -> anyhow::Result<()> {
        let mut file = std::fs::File::create(path)?;
        file.write_all(&self.build())?;
        file.flush()?;
        Ok(())
    }
}

/// Llama-style dense model with small F32 tensors
///
/// Matrices are `embd x embd` (`embd x ffn` for the FFN) with values
/// `sin(i)` so weight colors vary.
pub fn dense_model(layers: u32, heads: u32, kv_heads: u32, embd: u64, ffn: u64) -> GgufBuilder {
    let wave = |i: usize| (i as f32).sin();
    let mut b = GgufBuilder::new()
        .kv_str("general.architecture", "llama")
        .kv_u32("llama.block_count", layers)
        .kv_u32("llama.attention.head_count", heads)
        .kv_u32("llama.attention.head_count_kv", kv_heads)
        .kv_u64("llama.embedding_length", embd)
        .kv_u64("llama.feed_forward_length", ffn)
        .kv_u32("llama.context_length", 2048)
        .tensor_f32_with("token_embd.weight", &[embd, 32], wave);

    let kv_dim = embd * kv_heads as u64 / heads.max(1) as u64;
    for l in 0..layers {
        let p = format!("blk.{}", l);
        b = b
            .tensor_f32_with(&format!("{}.attn_norm.weight", p), &[embd], |_| 1.0)
            .tensor_f32_with(&format!("{}.attn_q.weight", p), &[embd, embd], wave)
            .tensor_f32_with(&format!("{}.attn_k.weight", p), &[embd, kv_dim], wave)
            .tensor_f32_with(&format!("{}.attn_v.weight", p), &[embd, kv_dim], wave)
            .tensor_f32_with(&format!("{}.attn_output.weight", p), &[embd, embd], wave)
            .tensor_f32_with(&format!("{}.ffn_norm.weight", p), &[embd], |_| 1.0)
            .tensor_f32_with(&format!("{}.ffn_gate.weight", p), &[embd, ffn], wave)
            .tensor_f32_with(&format!("{}.ffn_up.weight", p), &[embd, ffn], wave)
            .tensor_f32_with(&format!("{}.ffn_down.weight", p), &[ffn, embd], wave);
    }

    b.tensor_f32_with("output_norm.weight", &[embd], |_| 1.0)
        .tensor_f32_with("output.weight", &[embd, 32], wave)
}

/// Mixtral-style MoE model with one tensor per expert
pub fn moe_model(layers: u32, experts: u32, embd: u64, ffn: u64) -> GgufBuilder {
    let wave = |i: usize| (i as f32 * 0.37).cos();
    let mut b = GgufBuilder::new()
        .kv_str("general.architecture", "mixtral")
        .kv_u32("mixtral.block_count", layers)
        .kv_u32("mixtral.attention.head_count", 4)
        .kv_u32("mixtral.attention.head_count_kv", 2)
        .kv_u64("mixtral.embedding_length", embd)
        .kv_u64("mixtral.feed_forward_length", ffn)
        .kv_u32("mixtral.expert_count", experts)
        .kv_u32("mixtral.expert_used_count", 2)
        .tensor_f32_with("token_embd.weight", &[embd, 32], wave);

    for l in 0..layers {
        let p = format!("blk.{}", l);
        b = b
            .tensor_f32_with(&format!("{}.attn_norm.weight", p), &[embd], |_| 1.0)
            .tensor_f32_with(&format!("{}.attn_q.weight", p), &[embd, embd], wave)
            .tensor_f32_with(&format!("{}.attn_k.weight", p), &[embd, embd / 2], wave)
            .tensor_f32_with(&format!("{}.attn_v.weight", p), &[embd, embd / 2], wave)
            .tensor_f32_with(&format!("{}.attn_output.weight", p), &[embd, embd], wave)
            .tensor_f32_with(&format!("{}.ffn_norm.weight", p), &[embd], |_| 1.0)
            .tensor_f32_with(&format!("{}.ffn_gate_inp.weight", p), &[embd, experts as u64], wave);
        for e in 0..experts {
            b = b
                .tensor_f32_with(&format!("{}.ffn_gate.{}.weight", p, e), &[embd, ffn], wave)
                .tensor_f32_with(&format!("{}.ffn_up.{}.weight", p, e), &[embd, ffn], wave)
                .tensor_f32_with(&format!("{}.ffn_down.{}.weight", p, e), &[ffn, embd], wave);
        }
    }

    b.tensor_f32_with("output_norm.weight", &[embd], |_| 1.0)
        .tensor_f32_with("output.weight", &[embd, 32], wave)
}
