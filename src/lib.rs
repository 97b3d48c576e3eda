//! gguf-atlas - 3D architecture maps of GGUF model files
//!
//! Parses the header of a GGUF file, samples a bounded subset of each
//! tensor's weights straight from the (memory-mapped) file, and lays the
//! model out as a deterministic point cloud with dataflow connection lines.
//! The output is plain `Vec<f32>` buffers plus a range table, ready for any
//! renderer.

#![allow(clippy::needless_range_loop)] // Index loops mirror the buffer layout
#![allow(clippy::type_complexity)]

pub mod connections;
pub mod error;
pub mod layout;
pub mod loader;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod progress;
pub mod quant;

pub use connections::{ConnectionConfig, ConnectionGraph};
pub use error::{AtlasError, AtlasResult, ErrorCategory};
pub use layout::{ColorMode, LayoutConfig, LayoutEngine, PointCloud, Region, TensorRange};
pub use loader::{GgufFile, MemorySource, MmapGguf, RangeReader, TensorDescriptor};
pub use model::{classify, ArchitectureDescriptor, TensorClassification, TensorRole};
pub use pipeline::{
    Generation, GenerationRequest, GenerationService, ParsedModel, Pipeline, PipelineConfig,
};
pub use progress::{Progress, ProgressFn, ProgressPhase};
pub use quant::SamplerConfig;
