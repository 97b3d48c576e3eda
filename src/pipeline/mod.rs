//! End-to-end generation
//!
//! parse → extract architecture → classify → allocate → place points →
//! (sample weights) → color → connections
//!
//! Three ChaCha8 streams derived from one seed drive the random parts, so
//! a recolor or a connection rebuild never disturbs the point positions.

pub mod config;
pub mod service;

pub use config::PipelineConfig;
pub use service::GenerationService;

use crate::connections::{build_connections, ConnectionConfig, ConnectionGraph};
use crate::error::AtlasResult;
use crate::layout::{
    allocate_points, apply_colors, build_point_cloud, ColorMode, LayoutEngine, PointCloud,
};
use crate::loader::gguf::{parse_gguf, GgufFile, TensorDescriptor};
use crate::loader::mmap::{MmapGguf, RangeReader};
use crate::model::{classify, ArchitectureDescriptor, TensorClassification};
use crate::progress::ProgressFn;
use crate::quant::{sample_tensors, TensorSamples};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

const POSITION_STREAM: u64 = 1;
const COLOR_STREAM: u64 = 2;
const CONNECTION_STREAM: u64 = 3;

fn rng_stream(seed: u64, stream: u64) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream(stream);
    rng
}

/// Parsed header plus everything derived from names and metadata alone
#[derive(Debug, Clone)]
pub struct ParsedModel {
    pub file: GgufFile,
    pub architecture: ArchitectureDescriptor,
    /// Parallel to `file.tensors`
    pub classifications: Vec<TensorClassification>,
}

impl ParsedModel {
    /// Classify tensors and extract the architecture
    ///
    /// If tensor names reference more layers than `block_count` claims, the
    /// block count is raised to match so every layer gets its own depth.
    pub fn from_file(file: GgufFile) -> Self {
        let mut architecture = ArchitectureDescriptor::from_metadata(&file.metadata);
        let classifications: Vec<TensorClassification> =
            file.tensors.iter().map(|t| classify(&t.name)).collect();

        let named_layers = classifications
            .iter()
            .map(|c| c.layer)
            .max()
            .map_or(0, |max| (max + 1).max(0) as u64);
        if named_layers > architecture.block_count {
            debug!(
                metadata = architecture.block_count,
                named = named_layers,
                "Tensor names reference more layers than block_count"
            );
            architecture.block_count = named_layers;
        }

        Self {
            file,
            architecture,
            classifications,
        }
    }

    pub fn tensors(&self) -> &[TensorDescriptor] {
        &self.file.tensors
    }
}

/// Parameters of one generation; defaults come from [`PipelineConfig`]
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub target_points: usize,
    pub color_mode: ColorMode,
    pub seed: u64,
    pub connections: Option<ConnectionConfig>,
}

impl GenerationRequest {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            target_points: config.target_points,
            color_mode: config.color_mode,
            seed: config.seed,
            connections: config
                .connections_enabled
                .then(|| config.connections.clone()),
        }
    }

    pub fn with_target_points(mut self, points: usize) -> Self {
        self.target_points = points;
        self
    }

    pub fn with_color_mode(mut self, mode: ColorMode) -> Self {
        self.color_mode = mode;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// One complete output: points, optional samples and connections
#[derive(Debug, Clone)]
pub struct Generation {
    pub id: u64,
    pub seed: u64,
    pub color_mode: ColorMode,
    pub cloud: PointCloud,
    /// Per-tensor weight samples, present once weights coloring was used
    pub samples: Option<TensorSamples>,
    pub connections: Option<ConnectionGraph>,
}

/// Synchronous pipeline over one model file
pub struct Pipeline {
    source: Arc<dyn RangeReader>,
    config: PipelineConfig,
    progress: Option<ProgressFn>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("file_len", &self.source.len())
            .field("config", &self.config)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

impl Pipeline {
    pub fn new(source: Arc<dyn RangeReader>, config: PipelineConfig) -> AtlasResult<Self> {
        config.validate()?;
        Ok(Self {
            source,
            config,
            progress: None,
        })
    }

    /// Memory-map a GGUF file
    pub fn open(path: &Path, config: PipelineConfig) -> AtlasResult<Self> {
        let source = MmapGguf::open(path)?;
        info!(path = %path.display(), bytes = source.len(), "Opened model file");
        Self::new(Arc::new(source), config)
    }

    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn source(&self) -> &Arc<dyn RangeReader> {
        &self.source
    }

    pub fn default_request(&self) -> GenerationRequest {
        GenerationRequest::from_config(&self.config)
    }

    pub fn parse(&self) -> AtlasResult<ParsedModel> {
        let start = Instant::now();
        let file = parse_gguf(self.source.as_ref(), &self.config.header, self.progress.as_ref())?;
        let model = ParsedModel::from_file(file);
        info!(
            architecture = %model.architecture.architecture,
            layers = model.architecture.block_count,
            tensors = model.file.tensors.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Parsed model header"
        );
        Ok(model)
    }

    fn sample(&self, model: &ParsedModel, counts: &[usize]) -> AtlasResult<TensorSamples> {
        let start = Instant::now();
        let samples = sample_tensors(
            self.source.as_ref(),
            model.tensors(),
            counts,
            model.file.data_offset,
            &self.config.sampler,
            self.progress.as_ref(),
        )?;
        let failed = samples.iter().filter(|s| s.is_none()).count();
        info!(
            tensors = samples.len(),
            failed,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Sampled weights"
        );
        Ok(samples)
    }

    /// Build a full generation
    pub fn generate(
        &self,
        model: &ParsedModel,
        request: &GenerationRequest,
        id: u64,
    ) -> AtlasResult<Generation> {
        if request.target_points == 0 {
            return Err(crate::config_error!("target_points must be > 0"));
        }
        if let Some(connections) = &request.connections {
            connections.validate()?;
        }
        let start = Instant::now();
        let tensors = model.tensors();

        let counts: Vec<u64> = tensors.iter().map(|t| t.element_count).collect();
        let allocation = allocate_points(
            &counts,
            request.target_points,
            self.config.layout.min_points_per_tensor,
        );

        let engine = LayoutEngine::new(&model.architecture, &self.config.layout);
        let mut cloud = build_point_cloud(
            &engine,
            tensors,
            &model.classifications,
            &allocation,
            &mut rng_stream(request.seed, POSITION_STREAM),
            id,
        )?;

        let samples = if request.color_mode.needs_samples() {
            Some(self.sample(model, &allocation)?)
        } else {
            None
        };
        apply_colors(
            &mut cloud,
            request.color_mode,
            samples.as_ref(),
            model.architecture.block_count,
            &mut rng_stream(request.seed, COLOR_STREAM),
        );

        let connections = request.connections.as_ref().map(|config| {
            build_connections(
                &cloud,
                config,
                &mut rng_stream(request.seed, CONNECTION_STREAM),
            )
        });

        info!(
            generation = id,
            points = cloud.len(),
            segments = connections.as_ref().map_or(0, |c| c.segment_count()),
            color_mode = %request.color_mode,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Generated layout"
        );

        Ok(Generation {
            id,
            seed: request.seed,
            color_mode: request.color_mode,
            cloud,
            samples,
            connections,
        })
    }

    /// Switch color mode in place; positions and connections stay as they are
    ///
    /// Samples are taken on the first switch to weights mode and kept.
    pub fn recolor(
        &self,
        model: &ParsedModel,
        generation: &mut Generation,
        mode: ColorMode,
    ) -> AtlasResult<()> {
        if mode.needs_samples() && generation.samples.is_none() {
            let mut counts = vec![0usize; model.tensors().len()];
            for range in &generation.cloud.ranges {
                if let Some(slot) = counts.get_mut(range.tensor_index) {
                    *slot = range.len();
                }
            }
            generation.samples = Some(self.sample(model, &counts)?);
        }
        apply_colors(
            &mut generation.cloud,
            mode,
            generation.samples.as_ref(),
            model.architecture.block_count,
            &mut rng_stream(generation.seed, COLOR_STREAM),
        );
        generation.color_mode = mode;
        debug!(generation = generation.id, color_mode = %mode, "Recolored");
        Ok(())
    }

    /// Redraw (or drop) the connection lines of a generation
    pub fn rebuild_connections(
        &self,
        generation: &mut Generation,
        config: Option<&ConnectionConfig>,
    ) -> AtlasResult<()> {
        generation.connections = match config {
            Some(config) => {
                config.validate()?;
                Some(build_connections(
                    &generation.cloud,
                    config,
                    &mut rng_stream(generation.seed, CONNECTION_STREAM),
                ))
            }
            None => None,
        };
        Ok(())
    }
}
