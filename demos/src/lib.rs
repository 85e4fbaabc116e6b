//! Timing harness shared by the isocrate demo binaries
//!
//! Runs repeated extractions of each strategy variant and reports them as
//! `name,backend,time,trial` records.

use isocrate_core::{GridDims, Point3f, Result, ScalarField};
use isocrate_extraction::{
    create_sphere_field, Backend, MarchingCubes, MarchingCubesConfig, Strategy,
};
use log::info;
use std::fmt;
use std::time::Instant;

/// Extractions timed per variant and backend
pub const NUM_TRIALS: usize = 5;
/// Magnification applied to loaded volumes
pub const DEFAULT_RESAMPLE: f64 = 0.4;
pub const DEFAULT_ISOVALUE: f32 = 0.07;
pub const DEFAULT_FUSION_FACTOR: usize = 16;
/// Z-layers of cells swept per sliding-window slice
pub const DEFAULT_SLICE_LAYERS: usize = 8;

/// Extraction variant under test
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    /// One cell per work item
    Classic,
    /// Blocks of consecutive cells per work item
    Fused(usize),
    /// One triangle per work item
    PerTriangle,
    /// Fused blocks over consecutive slices of the grid, one slice at a time
    SlidingWindow {
        cells_per_slice: usize,
        fusion_factor: usize,
    },
}

impl Variant {
    pub fn name(&self) -> &'static str {
        match self {
            Variant::Classic => "Classic",
            Variant::Fused(_) => "Fused",
            Variant::PerTriangle => "PerTriangle",
            Variant::SlidingWindow { .. } => "SlidingWindow",
        }
    }

    pub fn config(&self, isovalue: f32, backend: Backend) -> MarchingCubesConfig {
        let config = MarchingCubesConfig::default()
            .with_isovalue(isovalue)
            .with_backend(backend);
        match *self {
            Variant::Classic => config,
            Variant::Fused(factor) => config.with_fusion_factor(factor),
            Variant::PerTriangle => config.with_strategy(Strategy::PerTriangle),
            Variant::SlidingWindow {
                cells_per_slice,
                fusion_factor,
            } => config
                .with_strategy(Strategy::SlidingWindow { cells_per_slice })
                .with_fusion_factor(fusion_factor),
        }
    }

    /// CSV header printed before a variant's records
    pub fn header(&self) -> String {
        format!("{},Backend,Time,Trial", self.name())
    }
}

/// One timed extraction
#[derive(Debug, Clone, PartialEq)]
pub struct TrialRecord {
    pub variant: Variant,
    pub backend: Backend,
    pub seconds: f64,
    pub trial: usize,
    pub triangles: usize,
}

impl fmt::Display for TrialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{:.6},{}",
            self.variant.name(),
            self.backend.name(),
            self.seconds,
            self.trial
        )
    }
}

/// Time `trials` extractions of `field` with one variant on one backend
pub fn run_trials(
    field: &ScalarField,
    variant: Variant,
    backend: Backend,
    isovalue: f32,
    trials: usize,
) -> Result<Vec<TrialRecord>> {
    let mc = MarchingCubes::new(variant.config(isovalue, backend));
    let mut records = Vec::with_capacity(trials);

    for trial in 0..trials {
        let start = Instant::now();
        let mesh = mc.extract(field, None)?;
        let seconds = start.elapsed().as_secs_f64();
        records.push(TrialRecord {
            variant,
            backend,
            seconds,
            trial,
            triangles: mesh.triangle_count(),
        });
    }

    if let Some(first) = records.first() {
        info!(
            "{} on {}: {} triangles",
            variant.name(),
            backend.name(),
            first.triangles
        );
    }
    Ok(records)
}

/// Sliding-window variant sweeping `layers` z-layers of cells per slice
pub fn sliding_window(dims: GridDims, layers: usize, fusion_factor: usize) -> Variant {
    Variant::SlidingWindow {
        cells_per_slice: layers.max(1).saturating_mul(dims.cells_per_layer()).max(1),
        fusion_factor,
    }
}

/// Sphere falloff on a `size`³ grid: 0.5 at the center, dropping by 1 per
/// grid extent
pub fn synthetic_field(size: usize) -> Result<ScalarField> {
    let dims = GridDims::new(size, size, size);
    let c = size.saturating_sub(1) as f32 / 2.0;
    let extent = size.saturating_sub(1).max(1) as f32;
    let distance = create_sphere_field(dims, Point3f::new(c, c, c))?;
    ScalarField::new(
        dims,
        distance
            .into_values()
            .into_iter()
            .map(|d| 0.5 - d / extent)
            .collect(),
    )
}

/// Parse `NXxNYxNZ` or `NX,NY,NZ`
pub fn parse_dims(s: &str) -> std::result::Result<GridDims, String> {
    let parts = s
        .split(|c| c == 'x' || c == ',')
        .map(|p| p.trim().parse::<usize>().map_err(|e| format!("{p:?}: {e}")))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    match parts[..] {
        [nx, ny, nz] => Ok(GridDims::new(nx, ny, nz)),
        _ => Err(format!("expected three dimensions, got {}", parts.len())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dims() {
        assert_eq!(parse_dims("64x32x16").unwrap(), GridDims::new(64, 32, 16));
        assert_eq!(parse_dims("4, 5, 6").unwrap(), GridDims::new(4, 5, 6));
        assert!(parse_dims("4x5").is_err());
        assert!(parse_dims("4xfivex6").is_err());
    }

    #[test]
    fn test_variant_configs() {
        let fused = Variant::Fused(8).config(0.2, Backend::Serial);
        assert_eq!(fused.fusion_factor, 8);
        assert_eq!(fused.strategy, Strategy::CellFused);
        assert_eq!(fused.backend, Backend::Serial);

        let per_triangle = Variant::PerTriangle.config(0.2, Backend::Parallel);
        assert_eq!(per_triangle.strategy, Strategy::PerTriangle);
        assert_eq!(per_triangle.isovalue, 0.2);

        assert_eq!(Variant::Classic.header(), "Classic,Backend,Time,Trial");

        let sliding = sliding_window(GridDims::new(5, 4, 10), 2, 4);
        assert_eq!(
            sliding,
            Variant::SlidingWindow {
                cells_per_slice: 24,
                fusion_factor: 4
            }
        );
        let config = sliding.config(0.2, Backend::Serial);
        assert_eq!(config.strategy, Strategy::SlidingWindow { cells_per_slice: 24 });
        assert_eq!(config.fusion_factor, 4);
        assert_eq!(sliding.header(), "SlidingWindow,Backend,Time,Trial");
    }

    #[test]
    fn test_record_format() {
        let record = TrialRecord {
            variant: Variant::Fused(4),
            backend: Backend::Parallel,
            seconds: 0.25,
            trial: 3,
            triangles: 10,
        };
        assert_eq!(record.to_string(), "Fused,Parallel,0.250000,3");
    }

    #[test]
    fn test_variants_agree() {
        let field = synthetic_field(24).unwrap();
        let variants = [
            Variant::Classic,
            Variant::Fused(16),
            Variant::PerTriangle,
            sliding_window(field.dims(), 3, 16),
        ];
        let counts: Vec<usize> = variants
            .iter()
            .map(|&v| {
                let records = run_trials(&field, v, Backend::Parallel, DEFAULT_ISOVALUE, 2).unwrap();
                assert_eq!(records.len(), 2);
                assert_eq!(records[1].trial, 1);
                records[0].triangles
            })
            .collect();
        assert!(counts[0] > 0);
        assert!(counts.iter().all(|&c| c == counts[0]));
    }
}
