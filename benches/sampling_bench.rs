//! Sampling and layout benchmarks
//!
//! Measures strided weight sampling per encoding and a full layout
//! generation over a synthetic in-memory model.
//!
//! Run with: `cargo bench --bench sampling_bench`

use std::hint::black_box;
use std::sync::Arc;
use std::time::{Duration, Instant};

use gguf_atlas::layout::ColorMode;
use gguf_atlas::loader::gguf::{parse_gguf, HeaderConfig};
use gguf_atlas::loader::{GgufTensorType, MemorySource};
use gguf_atlas::pipeline::{Pipeline, PipelineConfig};
use gguf_atlas::quant::{sample_tensor, SamplerConfig};

// ============================================================================
// Benchmark Harness
// ============================================================================

struct Benchmark {
    name: String,
    iterations: usize,
    warmup_iterations: usize,
}

impl Benchmark {
    fn new(name: &str, iterations: usize) -> Self {
        Benchmark {
            name: name.to_string(),
            iterations,
            warmup_iterations: iterations.min(5),
        }
    }

    fn run_time<F, R>(&self, mut f: F) -> BenchmarkResult
    where
        F: FnMut() -> R,
    {
        for _ in 0..self.warmup_iterations {
            black_box(f());
        }

        let mut durations = Vec::with_capacity(self.iterations);
        for _ in 0..self.iterations {
            let start = Instant::now();
            black_box(f());
            durations.push(start.elapsed());
        }

        BenchmarkResult {
            name: self.name.clone(),
            durations,
        }
    }
}

struct BenchmarkResult {
    name: String,
    durations: Vec<Duration>,
}

impl BenchmarkResult {
    fn report(&self) {
        let mut sorted = self.durations.clone();
        sorted.sort();
        let total: Duration = sorted.iter().sum();
        let avg = total / sorted.len().max(1) as u32;
        let p50 = sorted[sorted.len() / 2];
        let p95 = sorted[(sorted.len() * 95) / 100];

        println!("\n=== {} ===", self.name);
        println!("Iterations: {}", sorted.len());
        println!("Average: {:.3} ms", avg.as_secs_f64() * 1000.0);
        println!("P50:     {:.3} ms", p50.as_secs_f64() * 1000.0);
        println!("P95:     {:.3} ms", p95.as_secs_f64() * 1000.0);
    }
}

// ============================================================================
// Synthetic model
// ============================================================================

fn push_string(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(&(s.len() as u64).to_le_bytes());
    out.extend_from_slice(s.as_bytes());
}

/// GGUF bytes with one tensor per (name, dims, type, data) entry
fn build_gguf(tensors: &[(String, Vec<u64>, GgufTensorType, Vec<u8>)]) -> Vec<u8> {
    let mut out = b"GGUF".to_vec();
    out.extend_from_slice(&3u32.to_le_bytes());
    out.extend_from_slice(&(tensors.len() as u64).to_le_bytes());
    out.extend_from_slice(&1u64.to_le_bytes());
    push_string(&mut out, "general.architecture");
    out.extend_from_slice(&8u32.to_le_bytes());
    push_string(&mut out, "llama");

    let mut data = Vec::new();
    for (name, dims, ty, bytes) in tensors {
        data.resize(data.len().div_ceil(32) * 32, 0);
        push_string(&mut out, name);
        out.extend_from_slice(&(dims.len() as u32).to_le_bytes());
        for d in dims {
            out.extend_from_slice(&d.to_le_bytes());
        }
        out.extend_from_slice(&ty.tag().to_le_bytes());
        out.extend_from_slice(&(data.len() as u64).to_le_bytes());
        data.extend_from_slice(bytes);
    }
    out.resize(out.len().div_ceil(32) * 32, 0);
    out.extend_from_slice(&data);
    out
}

/// Deterministic filler bytes; scales stay small finite f16 values
fn filler(blocks: usize, block_bytes: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(blocks * block_bytes);
    for b in 0..blocks {
        out.extend_from_slice(&0x2E66u16.to_le_bytes());
        for j in 2..block_bytes {
            out.push(((b * 31 + j * 7) % 251) as u8);
        }
    }
    out
}

fn encoding_model(cols: u64, rows: u64) -> Vec<u8> {
    let elements = (cols * rows) as usize;
    let f32_data: Vec<u8> = (0..elements)
        .flat_map(|i| ((i % 997) as f32 * 0.001).to_le_bytes())
        .collect();
    build_gguf(&[
        ("f32".into(), vec![cols, rows], GgufTensorType::F32, f32_data),
        ("q8_0".into(), vec![cols, rows], GgufTensorType::Q8_0, filler(elements / 32, 34)),
        ("q4_0".into(), vec![cols, rows], GgufTensorType::Q4_0, filler(elements / 32, 18)),
        ("q4_k".into(), vec![cols, rows], GgufTensorType::Q4_K, filler(elements / 256, 144)),
    ])
}

fn layered_model(layers: usize, embd: u64) -> Vec<u8> {
    let mut tensors = Vec::new();
    let matrix = filler((embd * embd) as usize / 32, 34);
    for l in 0..layers {
        for role in ["attn_q", "attn_k", "attn_v", "attn_output", "ffn_gate", "ffn_up", "ffn_down"] {
            tensors.push((
                format!("blk.{}.{}.weight", l, role),
                vec![embd, embd],
                GgufTensorType::Q8_0,
                matrix.clone(),
            ));
        }
    }
    build_gguf(&tensors)
}

// ============================================================================
// Benchmarks
// ============================================================================

fn bench_sample_tensor() {
    let source = MemorySource::new(encoding_model(4096, 1024));
    let parsed = match parse_gguf(&source, &HeaderConfig::default(), None) {
        Ok(parsed) => parsed,
        Err(e) => {
            eprintln!("failed to parse synthetic model: {}", e);
            return;
        }
    };
    let config = SamplerConfig::default();

    for tensor in &parsed.tensors {
        for requested in [1_000usize, 50_000] {
            let name = format!("sample_tensor {} x{}", tensor.name, requested);
            Benchmark::new(&name, 50)
                .run_time(|| sample_tensor(&source, tensor, parsed.data_offset, requested, &config))
                .report();
        }
    }
}

fn bench_generate() {
    let source = Arc::new(MemorySource::new(layered_model(8, 256)));
    for mode in [ColorMode::Role, ColorMode::Weights] {
        let config = PipelineConfig::default()
            .with_target_points(200_000)
            .with_color_mode(mode)
            .with_connections(true);
        let pipeline = match Pipeline::new(source.clone(), config) {
            Ok(pipeline) => pipeline,
            Err(e) => {
                eprintln!("invalid pipeline config: {}", e);
                return;
            }
        };
        let model = match pipeline.parse() {
            Ok(model) => model,
            Err(e) => {
                eprintln!("failed to parse synthetic model: {}", e);
                return;
            }
        };
        let request = pipeline.default_request();
        Benchmark::new(&format!("generate 200k points ({})", mode), 10)
            .run_time(|| pipeline.generate(&model, &request, 1))
            .report();
    }
}

fn main() {
    println!("gguf-atlas sampling benchmarks");
    bench_sample_tensor();
    bench_generate();
}
