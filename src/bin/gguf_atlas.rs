use anyhow::Context;
use clap::{Parser, Subcommand};
use gguf_atlas::layout::ColorMode;
use gguf_atlas::loader::gguf::match_pattern;
use gguf_atlas::logging::{init_with_config, LogLevel, LoggingConfig};
use gguf_atlas::pipeline::{GenerationService, ParsedModel, Pipeline, PipelineConfig};
use gguf_atlas::progress::{Progress, ProgressFn};
use gguf_atlas::{ArchitectureDescriptor, ConnectionGraph, PointCloud};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "gguf-atlas", version)]
#[command(about = "Inspect GGUF model files and export 3D architecture layouts", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print architecture, tensor inventory and encoding histogram
    Inspect {
        /// Path to the GGUF file
        file: PathBuf,
        /// Print a JSON report instead of text
        #[arg(long)]
        json: bool,
        /// Only list tensors whose name matches this glob (`*` and `?`)
        #[arg(long)]
        filter: Option<String>,
    },
    /// Generate a point cloud and write its buffers as JSON
    Layout {
        /// Path to the GGUF file
        file: PathBuf,
        /// Total number of points
        #[arg(long)]
        points: Option<usize>,
        /// Color mode: weights, role or depth
        #[arg(long)]
        color: Option<ColorMode>,
        /// Seed for positions, colors and connections
        #[arg(long)]
        seed: Option<u64>,
        /// Include connection lines
        #[arg(long)]
        connections: bool,
        /// Connection density multiplier
        #[arg(long)]
        density: Option<f32>,
        /// JSON configuration file (flags override its values)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Serialize)]
struct TensorSummary<'a> {
    name: &'a str,
    dims: &'a [u64],
    encoding: String,
    bytes: u64,
    role: &'static str,
    layer: i32,
    expert: i32,
}

#[derive(Serialize)]
struct InspectReport<'a> {
    version: u32,
    architecture: &'a ArchitectureDescriptor,
    data_offset: u64,
    total_parameters: u64,
    total_data_bytes: u64,
    encodings: BTreeMap<String, usize>,
    tensors: Vec<TensorSummary<'a>>,
}

#[derive(Serialize)]
struct LayoutExport<'a> {
    architecture: &'a ArchitectureDescriptor,
    generation: u64,
    seed: u64,
    color_mode: ColorMode,
    points: &'a PointCloud,
    connections: Option<&'a ConnectionGraph>,
}

fn progress_logger() -> ProgressFn {
    Arc::new(|p: Progress| {
        if p.current == p.total {
            tracing::info!(phase = ?p.phase, total = p.total, "Phase complete");
        } else {
            tracing::trace!(phase = ?p.phase, current = p.current, total = p.total, "Progress");
        }
    })
}

fn report<'a>(model: &'a ParsedModel, filter: Option<&str>) -> InspectReport<'a> {
    let file = &model.file;
    InspectReport {
        version: file.version,
        architecture: &model.architecture,
        data_offset: file.data_offset,
        total_parameters: file.total_parameters(),
        total_data_bytes: file.total_data_bytes(),
        encodings: file
            .encoding_histogram()
            .into_iter()
            .map(|(t, n)| (t.to_string(), n))
            .collect(),
        tensors: file
            .tensors
            .iter()
            .zip(&model.classifications)
            .filter(|(t, _)| filter.map_or(true, |pattern| match_pattern(&t.name, pattern)))
            .map(|(t, c)| TensorSummary {
                name: &t.name,
                dims: &t.dims,
                encoding: t.tensor_type.to_string(),
                bytes: t.data_size,
                role: c.role.name(),
                layer: c.layer,
                expert: c.expert,
            })
            .collect(),
    }
}

fn print_report(report: &InspectReport<'_>) {
    let arch = report.architecture;
    println!("=== Architecture ===");
    println!("Name: {}", arch.architecture);
    println!("Layers: {}", arch.block_count);
    println!("Heads: {} (kv {})", arch.head_count, arch.effective_kv_heads());
    println!("Embedding length: {}", arch.embedding_length);
    println!("Feed-forward length: {}", arch.feed_forward_length);
    if arch.is_moe() {
        println!("Experts: {} ({} used)", arch.expert_count, arch.expert_used_count);
    }
    println!("Vocab size: {}", arch.vocab_size);
    println!("Context length: {}", arch.context_length);

    println!("\n=== File ===");
    println!("GGUF version: {}", report.version);
    println!("Data offset: {}", report.data_offset);
    println!("Parameters: {}", report.total_parameters);
    println!("Tensor bytes: {}", report.total_data_bytes);

    println!("\n=== Encodings ===");
    for (name, count) in &report.encodings {
        println!("{:>10}  {}", name, count);
    }

    println!("\n=== Tensors ({}) ===", report.tensors.len());
    for t in &report.tensors {
        println!(
            "{:<48} {:<16} {:<8} {:<16} layer {:>3} expert {:>3}",
            t.name,
            format!("{:?}", t.dims),
            t.encoding,
            t.role,
            t.layer,
            t.expert
        );
    }
}

fn inspect(file: &Path, json: bool, filter: Option<&str>) -> anyhow::Result<()> {
    let pipeline = Pipeline::open(file, PipelineConfig::default())
        .with_context(|| format!("opening {}", file.display()))?
        .with_progress(progress_logger());
    let model = pipeline.parse().context("parsing GGUF header")?;
    let report = report(&model, filter);

    if json {
        let stdout = std::io::stdout();
        let mut out = BufWriter::new(stdout.lock());
        serde_json::to_writer_pretty(&mut out, &report)?;
        writeln!(out)?;
    } else {
        print_report(&report);
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn layout(
    file: PathBuf,
    points: Option<usize>,
    color: Option<ColorMode>,
    seed: Option<u64>,
    connections: bool,
    density: Option<f32>,
    config: Option<PathBuf>,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut config = match config {
        Some(path) => PipelineConfig::from_json_file(&path)?,
        None => PipelineConfig::default().with_connections(false),
    };
    if let Some(points) = points {
        config = config.with_target_points(points);
    }
    if let Some(mode) = color {
        config = config.with_color_mode(mode);
    }
    if let Some(seed) = seed {
        config = config.with_seed(seed);
    }
    if connections {
        config = config.with_connections(true);
    }
    if let Some(density) = density {
        config = config.with_density(density);
    }

    let pipeline = Pipeline::open(&file, config)
        .with_context(|| format!("opening {}", file.display()))?
        .with_progress(progress_logger());
    let request = pipeline.default_request();
    let service = GenerationService::new(pipeline);

    let model = service.model().await.context("parsing GGUF header")?;
    let generation = service.generate(request).await.context("generating layout")?;

    let export = LayoutExport {
        architecture: &model.architecture,
        generation: generation.id,
        seed: generation.seed,
        color_mode: generation.color_mode,
        points: &generation.cloud,
        connections: generation.connections.as_ref(),
    };

    match output {
        Some(path) => {
            let f = std::fs::File::create(&path)
                .with_context(|| format!("creating {}", path.display()))?;
            let mut out = BufWriter::new(f);
            serde_json::to_writer(&mut out, &export)?;
            out.flush()?;
            tracing::info!(path = %path.display(), points = generation.cloud.len(), "Wrote layout");
        }
        None => {
            let stdout = std::io::stdout();
            let mut out = BufWriter::new(stdout.lock());
            serde_json::to_writer(&mut out, &export)?;
            writeln!(out)?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_with_config(
        &LoggingConfig::new()
            .with_level(LogLevel::from_verbosity(cli.verbose))
            .with_env_overrides(),
    );

    match cli.command {
        Commands::Inspect { file, json, filter } => inspect(&file, json, filter.as_deref()),
        Commands::Layout {
            file,
            points,
            color,
            seed,
            connections,
            density,
            config,
            output,
        } => layout(file, points, color, seed, connections, density, config, output).await,
    }
}
