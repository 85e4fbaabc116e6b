//! Generation stage
//!
//! Re-derives each cell's corners and case, then writes one interpolated
//! vertex (position and source scalar) per listed edge. Every work item
//! receives exactly the output slice the offset planner reserved for it and
//! writes nothing outside it.

use crate::cell::CellCursor;
use crate::classify::BlockLayout;
use crate::tables::{self, EDGE_CORNERS};
use isocrate_core::{GridDims, Point3f};
use std::ops::Range;

/// Linear interpolation
#[inline]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + t * (b - a)
}

/// Corner data needed to place vertices inside one cell
struct CellCorners {
    values: [f32; 8],
    sources: [f32; 8],
    positions: [Point3f; 8],
}

impl CellCorners {
    fn gather(cursor: &CellCursor<'_>, source: &[f32], dims: GridDims) -> Self {
        Self {
            values: *cursor.values(),
            sources: cursor.indices().map(|i| source[i]),
            positions: cursor.coords().corner_positions(dims),
        }
    }

    /// Vertex where the surface crosses `edge`.
    ///
    /// Only edges whose endpoints straddle the isovalue are ever listed, so
    /// the denominator is non-zero and `t` lies in `[0, 1]`.
    #[inline]
    fn interpolate(&self, edge: usize, isovalue: f32) -> (Point3f, f32) {
        let [v0, v1] = EDGE_CORNERS[edge];
        let (f0, f1) = (self.values[v0], self.values[v1]);
        let t = (isovalue - f0) / (f1 - f0);

        let p0 = self.positions[v0];
        let position = p0 + (self.positions[v1] - p0) * t;
        let scalar = lerp(self.sources[v0], self.sources[v1], t);
        (position, scalar)
    }
}

/// Writes isosurface vertices and scalars for blocks of cells or single triangles
#[derive(Debug, Clone, Copy)]
pub struct Generator<'a> {
    field: &'a [f32],
    source: &'a [f32],
    dims: GridDims,
    isovalue: f32,
    layout: BlockLayout,
}

impl<'a> Generator<'a> {
    /// `source` supplies the per-vertex scalar and may be the same buffer as
    /// `field`. Both must hold `dims.point_count()` samples.
    pub fn new(
        field: &'a [f32],
        source: &'a [f32],
        dims: GridDims,
        isovalue: f32,
        fusion_factor: usize,
    ) -> Self {
        debug_assert_eq!(field.len(), dims.point_count());
        debug_assert_eq!(source.len(), dims.point_count());
        Self {
            field,
            source,
            dims,
            isovalue,
            layout: BlockLayout::new(0..dims.cell_count(), fusion_factor),
        }
    }

    /// Number blocks from the start of `cells` instead of cell 0
    pub fn with_cells(mut self, cells: Range<usize>) -> Self {
        debug_assert!(cells.end <= self.dims.cell_count());
        self.layout = BlockLayout::new(cells, self.layout.fusion_factor());
        self
    }

    /// Write every vertex of fused block `block`.
    ///
    /// `vertices` and `scalars` are the block's reserved slices; their length
    /// equals the block's classified vertex count.
    pub fn generate_block(&self, block: usize, vertices: &mut [Point3f], scalars: &mut [f32]) {
        let cells = self.layout.block_cells(block);

        let mut cursor = CellCursor::seek(self.field, self.dims, cells.start);
        let mut written = 0usize;
        for cell_id in cells.clone() {
            if cell_id != cells.start {
                cursor.advance();
            }

            let case = cursor.case_index(self.isovalue);
            let count = tables::vertex_count(case);
            if count == 0 {
                continue;
            }

            let corners = CellCorners::gather(&cursor, self.source, self.dims);
            let edges = tables::edges(case);
            for (v, &edge) in edges[..count].iter().enumerate() {
                let (position, scalar) = corners.interpolate(edge as usize, self.isovalue);
                vertices[written + v] = position;
                scalars[written + v] = scalar;
            }
            written += count;
        }

        debug_assert_eq!(written, vertices.len(), "block {block} slice size");
    }

    /// Write triangle `iteration` of cell `cell_id` into a 3-vertex slice
    pub fn generate_triangle(
        &self,
        cell_id: usize,
        iteration: usize,
        vertices: &mut [Point3f],
        scalars: &mut [f32],
    ) {
        let cursor = CellCursor::seek(self.field, self.dims, cell_id);
        let case = cursor.case_index(self.isovalue);
        debug_assert!(iteration < tables::triangle_count(case));

        let corners = CellCorners::gather(&cursor, self.source, self.dims);
        for (v, edge) in tables::triangle_edges(case, iteration).into_iter().enumerate() {
            let (position, scalar) = corners.interpolate(edge, self.isovalue);
            vertices[v] = position;
            scalars[v] = scalar;
        }
    }
}
