//! Marching Cubes isosurface extraction
//!
//! This module drives the classify, scan and generate stages over a scalar
//! field and returns the raw triangle soup with one interpolated source scalar
//! per vertex.

use crate::classify::Classifier;
use crate::generate::Generator;
use crate::parallel;
use crate::scan::{self, OffsetPlanner, ParallelScan, SerialScan};
use isocrate_core::{Error, GridDims, IsoMesh, Point3f, Result, ScalarField};
use log::debug;
use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

pub use crate::parallel::Backend;

/// How generation work is decomposed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    /// One work item per block of `fusion_factor` consecutive cells
    #[default]
    CellFused,
    /// One work item per output triangle
    PerTriangle,
    /// Cell-fused passes over consecutive slices of `cells_per_slice` cell
    /// ids, concatenated in slice order. Only one slice's classification is
    /// held at a time.
    SlidingWindow { cells_per_slice: usize },
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::CellFused => "CellFused",
            Strategy::PerTriangle => "PerTriangle",
            Strategy::SlidingWindow { .. } => "SlidingWindow",
        }
    }
}

/// Configuration for Marching Cubes algorithm
#[derive(Debug, Clone, PartialEq)]
pub struct MarchingCubesConfig {
    /// Isosurface level (scalar value to extract)
    pub isovalue: f32,
    /// Consecutive cells handled by one work item (ignored by PerTriangle)
    pub fusion_factor: usize,
    /// Work decomposition for generation
    pub strategy: Strategy,
    /// Where the stages run
    pub backend: Backend,
}

impl Default for MarchingCubesConfig {
    fn default() -> Self {
        Self {
            isovalue: 0.0,
            fusion_factor: 1,
            strategy: Strategy::CellFused,
            backend: Backend::Parallel,
        }
    }
}

impl MarchingCubesConfig {
    pub fn with_isovalue(mut self, isovalue: f32) -> Self {
        self.isovalue = isovalue;
        self
    }

    pub fn with_fusion_factor(mut self, fusion_factor: usize) -> Self {
        self.fusion_factor = fusion_factor;
        self
    }

    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }
}

/// Shared flag for abandoning an extraction between stages
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; the next stage boundary returns `Error::Cancelled`
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Marching Cubes implementation
pub struct MarchingCubes {
    config: MarchingCubesConfig,
    planner: Box<dyn OffsetPlanner>,
}

impl MarchingCubes {
    /// Create a new Marching Cubes instance.
    ///
    /// The offset planner follows the backend: a chunked rayon scan for
    /// `Backend::Parallel`, a plain loop for `Backend::Serial`.
    pub fn new(config: MarchingCubesConfig) -> Self {
        let planner: Box<dyn OffsetPlanner> = match config.backend {
            Backend::Serial => Box::new(SerialScan),
            Backend::Parallel => Box::new(ParallelScan::default()),
        };
        Self { config, planner }
    }

    /// Replace the exclusive-scan primitive used between the stages
    pub fn with_planner(mut self, planner: Box<dyn OffsetPlanner>) -> Self {
        self.planner = planner;
        self
    }

    pub fn config(&self) -> &MarchingCubesConfig {
        &self.config
    }

    /// Extract the isosurface of `field`.
    ///
    /// Vertex scalars are interpolated from `source`, or from `field` itself
    /// when no source is given.
    pub fn extract(&self, field: &ScalarField, source: Option<&ScalarField>) -> Result<IsoMesh> {
        self.extract_with_cancel(field, source, &CancelToken::new())
    }

    /// Like [`extract`](Self::extract), checking `cancel` before each stage
    pub fn extract_with_cancel(
        &self,
        field: &ScalarField,
        source: Option<&ScalarField>,
        cancel: &CancelToken,
    ) -> Result<IsoMesh> {
        let source = source.map_or(field.values(), |s| s.values());
        self.extract_buffers(field.dims(), field.values(), source, cancel)
    }

    /// Extract from raw sample buffers laid out x-fastest
    pub fn extract_buffers(
        &self,
        dims: GridDims,
        field: &[f32],
        source: &[f32],
        cancel: &CancelToken,
    ) -> Result<IsoMesh> {
        self.validate(dims, field, source)?;

        let start = Instant::now();
        let mesh = match self.config.strategy {
            Strategy::CellFused => {
                let cells = 0..dims.cell_count();
                let (vertices, scalars) =
                    self.extract_cell_range(dims, field, source, cells, cancel)?;
                IsoMesh::from_buffers(vertices, scalars)
            }
            Strategy::PerTriangle => self.extract_per_triangle(dims, field, source, cancel)?,
            Strategy::SlidingWindow { cells_per_slice } => {
                self.extract_sliding_window(dims, field, source, cells_per_slice, cancel)?
            }
        };

        debug!(
            "{} {} extraction of {:?} at isovalue {}: {} triangles in {:?}",
            self.config.strategy.name(),
            self.config.backend.name(),
            dims.as_array(),
            self.config.isovalue,
            mesh.triangle_count(),
            start.elapsed()
        );
        Ok(mesh)
    }

    fn validate(&self, dims: GridDims, field: &[f32], source: &[f32]) -> Result<()> {
        dims.validate()?;
        for (name, buffer) in [("field", field), ("source", source)] {
            if buffer.len() != dims.point_count() {
                return Err(Error::FieldLengthMismatch {
                    name,
                    expected: dims.point_count(),
                    actual: buffer.len(),
                });
            }
        }

        if self.config.fusion_factor == 0 {
            return Err(Error::InvalidFusionFactor(self.config.fusion_factor));
        }

        if let Strategy::SlidingWindow { cells_per_slice: 0 } = self.config.strategy {
            return Err(Error::InvalidSliceSize(0));
        }

        if !self.config.isovalue.is_finite() {
            return Err(Error::InvalidData(format!(
                "isovalue {} is not finite",
                self.config.isovalue
            )));
        }

        if let Some(i) = field.iter().position(|v| !v.is_finite()) {
            return Err(Error::InvalidData(format!(
                "field sample {} at index {} is not finite",
                field[i], i
            )));
        }

        Ok(())
    }

    /// Run the cell-fused stages over `cells`, returning that range's
    /// vertices and scalars in cell order
    fn extract_cell_range(
        &self,
        dims: GridDims,
        field: &[f32],
        source: &[f32],
        cells: Range<usize>,
        cancel: &CancelToken,
    ) -> Result<(Vec<Point3f>, Vec<f32>)> {
        let MarchingCubesConfig {
            isovalue,
            fusion_factor,
            backend,
            ..
        } = self.config;

        cancel.check()?;
        let stage = Instant::now();
        let classifier =
            Classifier::new(field, dims, isovalue, fusion_factor).with_cells(cells.clone());
        let classification = classifier.classify(backend)?;
        debug!(
            "classified {} cells in {} blocks of {} in {:?}",
            cells.len(),
            classification.len(),
            fusion_factor,
            stage.elapsed()
        );

        cancel.check()?;
        let stage = Instant::now();
        let active = parallel::parallel_filter_indices(backend, classification.len(), |block| {
            classification.has_output[block] != 0
        })?;
        let counts: Vec<u32> = active
            .iter()
            .map(|&block| classification.counts[block])
            .collect();
        let offsets = self.planner.exclusive_scan(&counts)?;
        offsets.validate(&counts)?;
        debug!(
            "planned {} vertices for {} active blocks in {:?}",
            offsets.total,
            active.len(),
            stage.elapsed()
        );

        cancel.check()?;
        let stage = Instant::now();
        let mut vertices = parallel::try_filled_vec(offsets.total, Point3f::origin())?;
        let mut scalars = parallel::try_filled_vec(offsets.total, 0.0f32)?;
        let ranges = || {
            offsets
                .offsets
                .iter()
                .zip(&counts)
                .map(|(&offset, &count)| offset..offset + count as usize)
        };
        let slices: Vec<_> = parallel::split_disjoint(&mut vertices, ranges())?
            .into_iter()
            .zip(parallel::split_disjoint(&mut scalars, ranges())?)
            .collect();

        let generator =
            Generator::new(field, source, dims, isovalue, fusion_factor).with_cells(cells);
        parallel::for_each_disjoint(backend, &active, slices, |block, (v, s)| {
            generator.generate_block(block, v, s)
        })?;
        debug!("generated {} vertices in {:?}", vertices.len(), stage.elapsed());

        Ok((vertices, scalars))
    }

    fn extract_sliding_window(
        &self,
        dims: GridDims,
        field: &[f32],
        source: &[f32],
        cells_per_slice: usize,
        cancel: &CancelToken,
    ) -> Result<IsoMesh> {
        let cell_count = dims.cell_count();
        let mut vertices = Vec::new();
        let mut scalars = Vec::new();
        let mut slices = 0usize;

        for first in (0..cell_count).step_by(cells_per_slice) {
            let cells = first..first.saturating_add(cells_per_slice).min(cell_count);
            let (slice_vertices, slice_scalars) =
                self.extract_cell_range(dims, field, source, cells, cancel)?;
            append(&mut vertices, slice_vertices)?;
            append(&mut scalars, slice_scalars)?;
            slices += 1;
        }

        debug!(
            "swept {} cells in {} slices of up to {}",
            cell_count, slices, cells_per_slice
        );
        Ok(IsoMesh::from_buffers(vertices, scalars))
    }

    fn extract_per_triangle(
        &self,
        dims: GridDims,
        field: &[f32],
        source: &[f32],
        cancel: &CancelToken,
    ) -> Result<IsoMesh> {
        let MarchingCubesConfig {
            isovalue, backend, ..
        } = self.config;

        cancel.check()?;
        let stage = Instant::now();
        let classifier = Classifier::new(field, dims, isovalue, 1);
        let counts = classifier.classify_triangles(backend)?;
        debug!(
            "classified {} cells for triangles in {:?}",
            counts.len(),
            stage.elapsed()
        );

        cancel.check()?;
        let stage = Instant::now();
        let offsets = self.planner.exclusive_scan(&counts)?;
        offsets.validate(&counts)?;
        let cell_ids = scan::expand_cell_ids(backend, &counts, &offsets)?;
        debug!(
            "planned {} triangles in {:?}",
            offsets.total,
            stage.elapsed()
        );

        cancel.check()?;
        let stage = Instant::now();
        let vertex_total = offsets.total.checked_mul(3).ok_or_else(|| {
            Error::Allocation(format!("{} triangles overflow the vertex count", offsets.total))
        })?;
        let mut vertices = parallel::try_filled_vec(vertex_total, Point3f::origin())?;
        let mut scalars = parallel::try_filled_vec(vertex_total, 0.0f32)?;

        let generator = Generator::new(field, source, dims, isovalue, 1);
        parallel::for_each_chunk(backend, &mut vertices, &mut scalars, 3, |triangle, v, s| {
            let cell_id = cell_ids[triangle];
            generator.generate_triangle(cell_id, triangle - offsets.offsets[cell_id], v, s)
        })?;
        debug!("generated {} vertices in {:?}", vertices.len(), stage.elapsed());

        Ok(IsoMesh::from_buffers(vertices, scalars))
    }
}

/// Move `tail` onto the end of `buffer`, reporting allocation failure
fn append<T>(buffer: &mut Vec<T>, mut tail: Vec<T>) -> Result<()> {
    if buffer.is_empty() {
        *buffer = tail;
        return Ok(());
    }
    buffer.try_reserve(tail.len()).map_err(|e| {
        Error::Allocation(format!("appending {} elements: {}", tail.len(), e))
    })?;
    buffer.append(&mut tail);
    Ok(())
}

/// Convenience function for basic marching cubes
pub fn marching_cubes(field: &ScalarField, isovalue: f32) -> Result<IsoMesh> {
    let config = MarchingCubesConfig {
        isovalue,
        ..Default::default()
    };
    MarchingCubes::new(config).extract(field, None)
}

/// Extract from raw buffers with the cell-fused strategy on the thread pool.
///
/// `field` and `source` hold `dims.point_count()` samples each, x-fastest.
/// Any fusion factor of at least 1 is accepted; the last block may be short.
pub fn extract_isosurface(
    dims: GridDims,
    field: &[f32],
    source: &[f32],
    isovalue: f32,
    fusion_factor: usize,
) -> Result<IsoMesh> {
    let config = MarchingCubesConfig::default()
        .with_isovalue(isovalue)
        .with_fusion_factor(fusion_factor);
    MarchingCubes::new(config).extract_buffers(dims, field, source, &CancelToken::new())
}

/// Create a simple test field: distance from `center`, in grid units
pub fn create_sphere_field(dims: GridDims, center: Point3f) -> Result<ScalarField> {
    ScalarField::from_fn(dims, |x, y, z| {
        let dx = x as f32 - center.x;
        let dy = y as f32 - center.y;
        let dz = z as f32 - center.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    })
}
