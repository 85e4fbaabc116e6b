//! Timing comparison of the extraction variants.
//!
//! Usage:
//!   cargo run --release --bin compare [volume.nrrd | volume.raw --dims NXxNYxNZ]
//!
//! Without a volume a synthetic sphere falloff is used. For every backend the
//! classic, fused, per-triangle and sliding-window variants are each
//! extracted `--trials` times and printed as CSV records.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use isocrate_core::GridDims;
use isocrate_demos::{
    parse_dims, run_trials, sliding_window, synthetic_field, Variant, DEFAULT_FUSION_FACTOR,
    DEFAULT_ISOVALUE, DEFAULT_RESAMPLE, DEFAULT_SLICE_LAYERS, NUM_TRIALS,
};
use isocrate_extraction::parallel::{init_thread_pool, ThreadPoolConfig};
use isocrate_extraction::Backend;
use log::info;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum BackendArg {
    Serial,
    Parallel,
    All,
}

impl BackendArg {
    fn backends(self) -> Vec<Backend> {
        match self {
            Self::Serial => vec![Backend::Serial],
            Self::Parallel => vec![Backend::Parallel],
            Self::All => vec![Backend::Serial, Backend::Parallel],
        }
    }
}

#[derive(Parser)]
#[command(name = "compare")]
#[command(about = "Time classic, fused, per-triangle and sliding-window marching cubes")]
struct Args {
    /// Volume file (.nrrd, or .raw with --dims)
    volume: Option<PathBuf>,

    /// Dimensions of a raw volume, e.g. 256x256x128
    #[arg(long, value_parser = parse_dims)]
    dims: Option<GridDims>,

    /// Per-axis magnification applied to loaded volumes
    #[arg(long, default_value_t = DEFAULT_RESAMPLE)]
    resample: f64,

    /// Grid points per axis of the synthetic field
    #[arg(long, default_value_t = 128)]
    size: usize,

    #[arg(long, default_value_t = DEFAULT_ISOVALUE)]
    isovalue: f32,

    /// Cells per work item for the fused variant
    #[arg(long, default_value_t = DEFAULT_FUSION_FACTOR)]
    fusion: usize,

    /// Z-layers of cells per sliding-window slice
    #[arg(long, default_value_t = DEFAULT_SLICE_LAYERS)]
    slice_layers: usize,

    #[arg(long, default_value_t = NUM_TRIALS)]
    trials: usize,

    #[arg(long, value_enum, default_value_t = BackendArg::All)]
    backend: BackendArg,

    /// Worker threads (default: one per logical CPU)
    #[arg(long)]
    threads: Option<usize>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if let Some(threads) = args.threads {
        init_thread_pool(ThreadPoolConfig::default().with_threads(threads))
            .context("Failed to initialize thread pool")?;
    }

    let field = match &args.volume {
        Some(path) => {
            info!("reading file: {}", path.display());
            let field = isocrate_io::read_volume(path, args.dims)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            isocrate_io::resample(&field, args.resample).context("Failed to resample volume")?
        }
        None => synthetic_field(args.size).context("Failed to build synthetic field")?,
    };

    let [nx, ny, nz] = field.dims().as_array();
    println!("data dims are: {}, {}, {}", nx, ny, nz);
    let (min, max) = field.value_range();
    info!("value range [{}, {}], isovalue {}", min, max, args.isovalue);

    let variants = [
        Variant::Classic,
        Variant::Fused(args.fusion),
        Variant::PerTriangle,
        sliding_window(field.dims(), args.slice_layers, args.fusion),
    ];
    for backend in args.backend.backends() {
        for variant in variants {
            println!("{}", variant.header());
            let records = run_trials(&field, variant, backend, args.isovalue, args.trials)
                .with_context(|| format!("{} extraction failed", variant.name()))?;
            for record in records {
                println!("{}", record);
            }
        }
    }

    Ok(())
}
