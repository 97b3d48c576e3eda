//! Strided weight sampling
//!
//! A tensor is never materialized. For `n` requested samples out of
//! `elements`, sample `i` comes from element `⌊i·elements/n⌋`; the units
//! (blocks or elements) holding those elements are fetched in batched
//! range reads and decoded one value at a time.

use super::batch::plan_batches;
use super::blocks::{
    block_scale, byte_fallback_value, dequant_q4_0, dequant_q8_0, q4_0_code, q8_0_code,
    Q4_0_BLOCK_BYTES, Q4_0_BLOCK_SIZE, Q8_0_BLOCK_BYTES, Q8_0_BLOCK_SIZE,
};
use super::config::SamplerConfig;
use super::float::{bf16_to_f32, read_f16_le};
use crate::error::{AtlasError, AtlasResult};
use crate::loader::gguf::TensorDescriptor;
use crate::loader::mmap::RangeReader;
use crate::loader::tensor_type::SampleDecode;
use crate::progress::{report, ProgressFn, ProgressPhase};
use rayon::prelude::*;
use std::sync::atomic::{AtomicU64, Ordering};

/// Index of sample `i` of `count` spread evenly over `total` positions
pub fn strided_index(i: u64, count: u64, total: u64) -> u64 {
    if count == 0 {
        return 0;
    }
    ((i as u128 * total as u128) / count as u128) as u64
}

/// Per-tensor sample values; `None` when sampling that tensor failed
pub type TensorSamples = Vec<Option<Vec<f32>>>;

#[derive(Debug, Clone, Copy)]
struct Target {
    unit: u64,
    within: usize,
}

/// (bytes per unit, positions per unit, positions spanned) for a decoder
fn unit_layout(decode: SampleDecode, tensor: &TensorDescriptor) -> (u64, u64, u64) {
    match decode {
        SampleDecode::F32 => (4, 1, tensor.element_count),
        SampleDecode::F16 | SampleDecode::BF16 => (2, 1, tensor.element_count),
        SampleDecode::Q8_0 => (
            Q8_0_BLOCK_BYTES as u64,
            Q8_0_BLOCK_SIZE as u64,
            tensor.element_count,
        ),
        SampleDecode::Q4_0 => (
            Q4_0_BLOCK_BYTES as u64,
            Q4_0_BLOCK_SIZE as u64,
            tensor.element_count,
        ),
        // Positions are byte offsets across the whole tensor
        SampleDecode::ByteFallback => (1, 1, tensor.data_size),
    }
}

/// Caches the scale of the most recently decoded block
#[derive(Default)]
struct ScaleCache {
    block: Option<(u64, f32)>,
}

impl ScaleCache {
    fn get(&mut self, index: u64, block: &[u8]) -> f32 {
        match self.block {
            Some((cached, scale)) if cached == index => scale,
            _ => {
                let scale = block_scale(block);
                self.block = Some((index, scale));
                scale
            }
        }
    }
}

fn decode_unit(
    decode: SampleDecode,
    unit: &[u8],
    target: Target,
    scales: &mut ScaleCache,
) -> f32 {
    match decode {
        SampleDecode::F32 => f32::from_le_bytes([unit[0], unit[1], unit[2], unit[3]]),
        SampleDecode::F16 => read_f16_le(unit),
        SampleDecode::BF16 => bf16_to_f32(u16::from_le_bytes([unit[0], unit[1]])),
        SampleDecode::Q8_0 => {
            let scale = scales.get(target.unit, unit);
            dequant_q8_0(scale, q8_0_code(unit, target.within))
        }
        SampleDecode::Q4_0 => {
            let scale = scales.get(target.unit, unit);
            dequant_q4_0(scale, q4_0_code(unit, target.within))
        }
        SampleDecode::ByteFallback => byte_fallback_value(unit[0]),
    }
}

/// Sample up to `requested` values from one tensor
///
/// Returns `min(requested, element_count)` values in element order.
/// Encodings without a decoder go through the byte approximation of
/// [`byte_fallback_value`].
pub fn sample_tensor(
    source: &dyn RangeReader,
    tensor: &TensorDescriptor,
    data_offset: u64,
    requested: usize,
    config: &SamplerConfig,
) -> AtlasResult<Vec<f32>> {
    let count = (requested as u64).min(tensor.element_count);
    if count == 0 {
        return Ok(Vec::new());
    }

    let base = tensor.absolute_offset(data_offset);
    let file_len = source.len();
    match base.checked_add(tensor.data_size) {
        Some(end) if end <= file_len => {}
        _ => {
            return Err(AtlasError::ReadOutOfBounds {
                offset: base,
                len: usize::try_from(tensor.data_size).unwrap_or(usize::MAX),
                file_len,
            })
        }
    }

    let decode = tensor.tensor_type.sample_decode();
    let (unit_bytes, per_unit, span) = unit_layout(decode, tensor);
    if span == 0 {
        return Err(AtlasError::SamplingFailed {
            tensor: tensor.name.clone(),
            reason: format!("no data bytes for {} encoding", tensor.tensor_type),
        });
    }

    let targets: Vec<Target> = (0..count)
        .map(|i| {
            let position = strided_index(i, count, span);
            Target {
                unit: position / per_unit,
                within: (position % per_unit) as usize,
            }
        })
        .collect();
    let units: Vec<u64> = targets.iter().map(|t| t.unit).collect();
    let runs = plan_batches(&units, config.max_gap_blocks, config.max_batch_blocks);

    let mut values = Vec::with_capacity(targets.len());
    let mut scales = ScaleCache::default();
    let mut next = 0;
    for run in &runs {
        let len = usize::try_from(run.count * unit_bytes).map_err(|_| AtlasError::SamplingFailed {
            tensor: tensor.name.clone(),
            reason: format!("batch of {} units does not fit in memory", run.count),
        })?;
        let bytes = source.read_range(base + run.first * unit_bytes, len)?;

        while next < targets.len() && targets[next].unit < run.end() {
            let target = targets[next];
            let start = ((target.unit - run.first) * unit_bytes) as usize;
            let unit = &bytes[start..start + unit_bytes as usize];
            values.push(decode_unit(decode, unit, target, &mut scales));
            next += 1;
        }
    }

    tracing::trace!(
        "Sampled {} values from '{}' ({}) with {} reads",
        values.len(),
        tensor.name,
        tensor.tensor_type,
        runs.len()
    );

    Ok(values)
}

/// Sample many tensors on a bounded pool
///
/// At most `config.fan_out` tensors are sampled at once. Results keep the
/// input order. A tensor that fails is logged and yields `None`; the others
/// are unaffected.
pub fn sample_tensors(
    source: &dyn RangeReader,
    tensors: &[TensorDescriptor],
    counts: &[usize],
    data_offset: u64,
    config: &SamplerConfig,
    progress: Option<&ProgressFn>,
) -> AtlasResult<TensorSamples> {
    config.validate()?;
    if tensors.len() != counts.len() {
        return Err(crate::internal_error!(
            "{} tensors but {} sample counts",
            tensors.len(),
            counts.len()
        ));
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.fan_out)
        .thread_name(|i| format!("gguf-sampler-{}", i))
        .build()
        .map_err(|e| crate::internal_error!("failed to build sampling pool: {}", e))?;

    let total = tensors.len() as u64;
    let done = AtomicU64::new(0);

    let samples = pool.install(|| {
        tensors
            .par_iter()
            .zip(counts.par_iter())
            .map(|(tensor, &count)| {
                let result = match sample_tensor(source, tensor, data_offset, count, config) {
                    Ok(values) => Some(values),
                    Err(e) => {
                        tracing::warn!("Skipping weight samples for '{}': {}", tensor.name, e);
                        None
                    }
                };
                let current = done.fetch_add(1, Ordering::Relaxed) + 1;
                report(progress, ProgressPhase::Sampling, current, total);
                result
            })
            .collect::<Vec<_>>()
    });

    let failed = samples.iter().filter(|s| s.is_none()).count();
    tracing::debug!(
        "Sampled {} tensors ({} failed) with fan-out {}",
        samples.len(),
        failed,
        config.fan_out
    );

    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::mmap::MemorySource;
    use crate::loader::tensor_type::GgufTensorType;
    use std::borrow::Cow;
    use std::sync::atomic::AtomicUsize;

    /// Counts range reads
    struct CountingSource {
        inner: MemorySource,
        reads: AtomicUsize,
    }

    impl RangeReader for CountingSource {
        fn len(&self) -> u64 {
            self.inner.len()
        }

        fn read_range(&self, offset: u64, len: usize) -> AtlasResult<Cow<'_, [u8]>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.inner.read_range(offset, len)
        }
    }

    fn f32_tensor(values: &[f32]) -> (MemorySource, TensorDescriptor) {
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        let tensor = TensorDescriptor::new("t", vec![values.len() as u64], GgufTensorType::F32, 0)
            .unwrap();
        (MemorySource::new(bytes), tensor)
    }

    #[test]
    fn test_strided_index() {
        assert_eq!(strided_index(0, 4, 100), 0);
        assert_eq!(strided_index(1, 4, 100), 25);
        assert_eq!(strided_index(3, 4, 100), 75);
        assert_eq!(strided_index(2, 3, 10), 6);
        assert_eq!(strided_index(1, 2, u64::MAX), u64::MAX / 2);
    }

    #[test]
    fn test_f32_strided_samples() {
        let values: Vec<f32> = (0..100).map(|i| i as f32).collect();
        let (source, tensor) = f32_tensor(&values);
        let samples = sample_tensor(&source, &tensor, 0, 4, &SamplerConfig::default()).unwrap();
        assert_eq!(samples, vec![0.0, 25.0, 50.0, 75.0]);
    }

    #[test]
    fn test_sample_count_is_capped() {
        let (source, tensor) = f32_tensor(&[1.0, 2.0, 3.0]);
        let samples = sample_tensor(&source, &tensor, 0, 1000, &SamplerConfig::default()).unwrap();
        assert_eq!(samples, vec![1.0, 2.0, 3.0]);
        let none = sample_tensor(&source, &tensor, 0, 0, &SamplerConfig::default()).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_f16_and_bf16() {
        let bytes: Vec<u8> = [0x3C00u16, 0xC000].iter().flat_map(|b| b.to_le_bytes()).collect();
        let source = MemorySource::new(bytes);

        let t = TensorDescriptor::new("h", vec![2], GgufTensorType::F16, 0).unwrap();
        let samples = sample_tensor(&source, &t, 0, 2, &SamplerConfig::default()).unwrap();
        assert_eq!(samples, vec![1.0, -2.0]);

        let t = TensorDescriptor::new("b", vec![2], GgufTensorType::BF16, 0).unwrap();
        let samples = sample_tensor(&source, &t, 0, 2, &SamplerConfig::default()).unwrap();
        assert_eq!(samples[0], f32::from_bits(0x3C00 << 16));
        assert_eq!(samples[1], -2.0);
    }

    #[test]
    fn test_q8_0_samples_with_data_offset() {
        // Two blocks at data offset 32: scales 1.0 and 0.5, codes = element index
        let mut bytes = vec![0u8; 32];
        for (block, scale) in [(0usize, 1.0f32), (1, 0.5)] {
            bytes.extend_from_slice(&half::f16::from_f32(scale).to_bits().to_le_bytes());
            bytes.extend((0..32).map(|j| (block * 32 + j) as u8));
        }
        let source = MemorySource::new(bytes);
        let t = TensorDescriptor::new("q", vec![64], GgufTensorType::Q8_0, 0).unwrap();

        let samples = sample_tensor(&source, &t, 32, 4, &SamplerConfig::default()).unwrap();
        // elements 0, 16, 32, 48
        assert_eq!(samples, vec![0.0, 16.0, 16.0, 24.0]);
    }

    #[test]
    fn test_q4_0_samples() {
        let mut bytes = half::f16::from_f32(1.0).to_bits().to_le_bytes().to_vec();
        for j in 0..16u8 {
            bytes.push((j % 16) << 4 | (15 - j));
        }
        let source = MemorySource::new(bytes);
        let t = TensorDescriptor::new("q4", vec![32], GgufTensorType::Q4_0, 0).unwrap();

        let samples = sample_tensor(&source, &t, 0, 32, &SamplerConfig::default()).unwrap();
        assert_eq!(samples[0], 7.0);
        assert_eq!(samples[15], -8.0);
        assert_eq!(samples[16], -8.0);
        assert_eq!(samples[31], 7.0);
    }

    #[test]
    fn test_byte_fallback_for_k_quants() {
        // One Q4_K block: 256 elements in 144 bytes
        let bytes: Vec<u8> = (0..144u32).map(|i| (i * 2) as u8).collect();
        let source = MemorySource::new(bytes);
        let t = TensorDescriptor::new("k", vec![256], GgufTensorType::Q4_K, 0).unwrap();
        assert_eq!(t.data_size, 144);

        let samples = sample_tensor(&source, &t, 0, 4, &SamplerConfig::default()).unwrap();
        // byte offsets 0, 36, 72, 108 -> 0, 72, 144, 216
        assert_eq!(samples, vec![0.0, 72.0 / 128.0, -112.0 / 128.0, -40.0 / 128.0]);
    }

    #[test]
    fn test_reads_are_batched() {
        let values: Vec<f32> = (0..10_000).map(|i| i as f32).collect();
        let (inner, tensor) = f32_tensor(&values);
        let source = CountingSource {
            inner,
            reads: AtomicUsize::new(0),
        };

        // Stride 10 elements: gaps of 9 split every run with max_gap 8
        let config = SamplerConfig::default();
        sample_tensor(&source, &tensor, 0, 1000, &config).unwrap();
        assert_eq!(source.reads.load(Ordering::SeqCst), 1000);

        source.reads.store(0, Ordering::SeqCst);
        let config = SamplerConfig::default().with_max_gap_blocks(16).with_max_batch_blocks(2000);
        let samples = sample_tensor(&source, &tensor, 0, 1000, &config).unwrap();
        assert_eq!(source.reads.load(Ordering::SeqCst), 5);
        assert_eq!(samples[999], 9990.0);
    }

    #[test]
    fn test_out_of_bounds_tensor_fails() {
        let (source, _) = f32_tensor(&[1.0, 2.0]);
        let t = TensorDescriptor::new("far", vec![2], GgufTensorType::F32, 1 << 40).unwrap();
        let err = sample_tensor(&source, &t, 0, 2, &SamplerConfig::default()).unwrap_err();
        assert!(matches!(err, AtlasError::ReadOutOfBounds { .. }));
    }

    #[test]
    fn test_sample_tensors_isolates_failures() {
        let values: Vec<f32> = (0..64).map(|i| i as f32).collect();
        let (source, good) = f32_tensor(&values);
        let bad = TensorDescriptor::new("bad", vec![64], GgufTensorType::F32, 1 << 20).unwrap();
        let tensors = vec![good.clone(), bad, good];

        let config = SamplerConfig::default().with_fan_out(2);
        let samples = sample_tensors(&source, &tensors, &[2, 2, 4], 0, &config, None).unwrap();
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0], Some(vec![0.0, 32.0]));
        assert_eq!(samples[1], None);
        assert_eq!(samples[2], Some(vec![0.0, 16.0, 32.0, 48.0]));
    }

    #[test]
    fn test_sample_tensors_rejects_mismatched_counts() {
        let (source, t) = f32_tensor(&[1.0]);
        let err = sample_tensors(&source, &[t], &[], 0, &SamplerConfig::default(), None);
        assert!(matches!(err, Err(AtlasError::InternalError(_))));
    }
}
