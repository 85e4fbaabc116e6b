//! Classification stage
//!
//! Computes, for every work item, how many vertices the surface emits
//! inside it. A work item is a block of `fusion_factor` consecutive cells;
//! with a factor of 1 it is a single cell. Blocks tile a cell-id range,
//! which is the whole grid unless a slice is selected.

use crate::cell::CellCursor;
use crate::parallel::{self, Backend};
use crate::tables;
use isocrate_core::{Error, GridDims, Result};
use std::ops::Range;

/// Classification result for one fused block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlockClass {
    /// 1 when any member cell emits geometry, 0 otherwise
    pub has_output: u8,
    /// Vertices emitted by all member cells together
    pub vertex_count: u32,
}

/// Per-block classification of a cell range
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    pub has_output: Vec<u8>,
    pub counts: Vec<u32>,
}

impl Classification {
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Sum of all counts
    pub fn total(&self) -> usize {
        self.counts.iter().map(|&c| c as usize).sum()
    }
}

/// Number of work items covering `cell_count` cells in blocks of `fusion_factor`
#[inline]
pub fn block_count(cell_count: usize, fusion_factor: usize) -> usize {
    cell_count.div_ceil(fusion_factor)
}

/// Narrow a block's vertex total to the planner's count type
fn block_vertex_count(block: usize, count: usize) -> Result<u32> {
    u32::try_from(count).map_err(|_| {
        Error::Algorithm(format!(
            "block {} emits {} vertices, more than a block count can hold; lower the fusion factor",
            block, count
        ))
    })
}

/// Blocks of `fusion_factor` consecutive cells tiling a cell-id range.
///
/// Block `b` starts at `cells.start + b * fusion_factor`; the last block may
/// be short.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockLayout {
    first_cell: usize,
    end_cell: usize,
    fusion_factor: usize,
}

impl BlockLayout {
    pub fn new(cells: Range<usize>, fusion_factor: usize) -> Self {
        debug_assert!(cells.start <= cells.end);
        debug_assert!(fusion_factor >= 1);
        Self {
            first_cell: cells.start,
            end_cell: cells.end,
            fusion_factor,
        }
    }

    /// Cell ids covered by the layout
    pub fn cells(&self) -> Range<usize> {
        self.first_cell..self.end_cell
    }

    pub fn fusion_factor(&self) -> usize {
        self.fusion_factor
    }

    pub fn block_count(&self) -> usize {
        block_count(self.end_cell - self.first_cell, self.fusion_factor)
    }

    /// Cell ids belonging to `block`
    pub fn block_cells(&self, block: usize) -> Range<usize> {
        let first = self.first_cell + block * self.fusion_factor;
        let last = first.saturating_add(self.fusion_factor).min(self.end_cell);
        first..last
    }
}

/// Classifies cells of a scalar field against an isovalue
#[derive(Debug, Clone, Copy)]
pub struct Classifier<'a> {
    field: &'a [f32],
    dims: GridDims,
    isovalue: f32,
    layout: BlockLayout,
}

impl<'a> Classifier<'a> {
    /// Classify every cell of the grid.
    ///
    /// Inputs are assumed validated: `field.len() == dims.point_count()`,
    /// every axis at least 2 and `fusion_factor >= 1`.
    pub fn new(field: &'a [f32], dims: GridDims, isovalue: f32, fusion_factor: usize) -> Self {
        debug_assert_eq!(field.len(), dims.point_count());
        Self {
            field,
            dims,
            isovalue,
            layout: BlockLayout::new(0..dims.cell_count(), fusion_factor),
        }
    }

    /// Restrict classification to a slice of cell ids.
    ///
    /// Block and cell indices reported by the classifier are then relative to
    /// `cells.start`.
    pub fn with_cells(mut self, cells: Range<usize>) -> Self {
        debug_assert!(cells.end <= self.dims.cell_count());
        self.layout = BlockLayout::new(cells, self.layout.fusion_factor());
        self
    }

    pub fn layout(&self) -> BlockLayout {
        self.layout
    }

    pub fn block_count(&self) -> usize {
        self.layout.block_count()
    }

    /// Cell ids belonging to `block`; the last block may be short
    pub fn block_cells(&self, block: usize) -> Range<usize> {
        self.layout.block_cells(block)
    }

    /// Case index of a single cell
    pub fn case_index(&self, cell_id: usize) -> u8 {
        CellCursor::seek(self.field, self.dims, cell_id).case_index(self.isovalue)
    }

    /// Classify one fused block, walking its cells in x order
    pub fn classify_block(&self, block: usize) -> Result<BlockClass> {
        let cells = self.block_cells(block);
        let mut cursor = CellCursor::seek(self.field, self.dims, cells.start);
        let mut vertex_count = tables::vertex_count(cursor.case_index(self.isovalue));

        for _ in cells.start + 1..cells.end {
            cursor.advance();
            vertex_count += tables::vertex_count(cursor.case_index(self.isovalue));
        }

        Ok(BlockClass {
            has_output: (vertex_count != 0) as u8,
            vertex_count: block_vertex_count(block, vertex_count)?,
        })
    }

    /// Triangle count of a single cell
    pub fn classify_cell_triangles(&self, cell_id: usize) -> u32 {
        tables::triangle_count(self.case_index(cell_id)) as u32
    }

    /// Classify every block of the range
    pub fn classify(&self, backend: Backend) -> Result<Classification> {
        let blocks = parallel::try_parallel_map_range(backend, 0..self.block_count(), |block| {
            self.classify_block(block)
        })?;
        let (has_output, counts) = blocks
            .into_iter()
            .map(|class| (class.has_output, class.vertex_count))
            .unzip();
        Ok(Classification { has_output, counts })
    }

    /// Triangle count of every individual cell in the range, ignoring the
    /// fusion factor
    pub fn classify_triangles(&self, backend: Backend) -> Result<Vec<u32>> {
        parallel::parallel_map_range(backend, self.layout.cells(), |cell_id| {
            self.classify_cell_triangles(cell_id)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wave_field(dims: GridDims) -> Vec<f32> {
        (0..dims.point_count())
            .map(|i| {
                let x = (i % dims.nx) as f32;
                let y = ((i / dims.nx) % dims.ny) as f32;
                let z = (i / dims.points_per_layer()) as f32;
                (0.9 * x).sin() + (0.7 * y).cos() + 0.3 * z
            })
            .collect()
    }

    #[test]
    fn test_single_cell_top_face() {
        let dims = GridDims::new(2, 2, 2);
        let field = [0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0];
        let classifier = Classifier::new(&field, dims, 0.5, 1);

        assert_eq!(classifier.block_count(), 1);
        assert_eq!(classifier.case_index(0), 0b1111_0000);
        assert_eq!(
            classifier.classify_block(0).unwrap(),
            BlockClass {
                has_output: 1,
                vertex_count: 6
            }
        );
        assert_eq!(classifier.classify_cell_triangles(0), 2);
    }

    #[test]
    fn test_empty_cell_has_no_output() {
        let dims = GridDims::new(2, 2, 2);
        let field = [2.0; 8];
        let classifier = Classifier::new(&field, dims, 0.5, 1);
        assert_eq!(classifier.classify_block(0).unwrap(), BlockClass::default());
    }

    #[test]
    fn test_block_count_handles_partial_block() {
        assert_eq!(block_count(10, 1), 10);
        assert_eq!(block_count(10, 3), 4);
        assert_eq!(block_count(9, 3), 3);
        assert_eq!(block_count(2, 16), 1);

        let dims = GridDims::new(5, 4, 2);
        let field = wave_field(dims);
        let classifier = Classifier::new(&field, dims, 0.0, 5);
        assert_eq!(classifier.block_cells(2), 10..12);
    }

    #[test]
    fn test_fused_counts_sum_member_cells() {
        let dims = GridDims::new(7, 5, 4);
        let field = wave_field(dims);
        let single = Classifier::new(&field, dims, 0.4, 1)
            .classify(Backend::Serial)
            .unwrap();

        for factor in [2, 3, 5, 7, 13] {
            let classifier = Classifier::new(&field, dims, 0.4, factor);
            let fused = classifier.classify(Backend::Parallel).unwrap();
            assert_eq!(fused.len(), classifier.block_count());
            for block in 0..fused.len() {
                let expected: u32 = classifier
                    .block_cells(block)
                    .map(|cell| single.counts[cell])
                    .sum();
                assert_eq!(fused.counts[block], expected, "factor {factor} block {block}");
                assert_eq!(fused.has_output[block], (expected != 0) as u8);
            }
            assert_eq!(fused.total(), single.total());
        }
    }

    #[test]
    fn test_triangle_counts_match_vertex_counts() {
        let dims = GridDims::new(6, 6, 6);
        let field = wave_field(dims);
        let classifier = Classifier::new(&field, dims, 0.2, 1);
        let vertices = classifier.classify(Backend::Serial).unwrap();
        let triangles = classifier.classify_triangles(Backend::Serial).unwrap();
        for (v, t) in vertices.counts.iter().zip(&triangles) {
            assert_eq!(*v, 3 * *t);
        }
    }

    #[test]
    fn test_block_vertex_count_overflow() {
        assert_eq!(block_vertex_count(3, 15).unwrap(), 15);
        assert_eq!(block_vertex_count(0, u32::MAX as usize).unwrap(), u32::MAX);
        assert!(matches!(
            block_vertex_count(7, u32::MAX as usize + 1),
            Err(Error::Algorithm(_))
        ));
    }

    #[test]
    fn test_cell_range_layout() {
        let layout = BlockLayout::new(10..27, 4);
        assert_eq!(layout.block_count(), 5);
        assert_eq!(layout.block_cells(0), 10..14);
        assert_eq!(layout.block_cells(4), 26..27);

        let empty = BlockLayout::new(8..8, 3);
        assert_eq!(empty.block_count(), 0);
    }

    #[test]
    fn test_classify_cell_range_matches_whole_grid() {
        let dims = GridDims::new(7, 5, 4);
        let field = wave_field(dims);
        let whole = Classifier::new(&field, dims, 0.4, 1)
            .classify(Backend::Serial)
            .unwrap();
        let triangles = Classifier::new(&field, dims, 0.4, 1)
            .classify_triangles(Backend::Serial)
            .unwrap();

        // 72 cells in slices of 25; the last slice is short
        for start in [0, 25, 50] {
            let cells = start..(start + 25).min(dims.cell_count());
            let classifier = Classifier::new(&field, dims, 0.4, 1).with_cells(cells.clone());
            let slice = classifier.classify(Backend::Parallel).unwrap();
            assert_eq!(slice.counts, whole.counts[cells.clone()]);

            let slice_triangles = classifier.classify_triangles(Backend::Serial).unwrap();
            assert_eq!(slice_triangles, triangles[cells.clone()]);

            let fused = Classifier::new(&field, dims, 0.4, 6)
                .with_cells(cells.clone())
                .classify(Backend::Serial)
                .unwrap();
            assert_eq!(fused.len(), cells.len().div_ceil(6));
            assert_eq!(fused.total(), slice.total());
        }
    }
}
