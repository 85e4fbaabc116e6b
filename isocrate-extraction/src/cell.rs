//! Cell decoding and corner sampling
//!
//! Cells own no storage. A cell id decodes to the grid coordinates of its
//! corner 0, and the other seven corners follow a fixed offset pattern:
//! corner 1 is +x, corner 2 is +x+y, corner 3 is +y, and corners 4-7 repeat
//! 0-3 one layer up in z.

use crate::tables;
use isocrate_core::{GridDims, Point3f};

/// Grid coordinates of a cell's corner 0
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellCoords {
    pub x: usize,
    pub y: usize,
    pub z: usize,
}

impl CellCoords {
    /// Decode a linear cell id. The id must be below `dims.cell_count()`.
    #[inline]
    pub fn decode(cell_id: usize, dims: GridDims) -> Self {
        let [cells_x, cells_y, _] = dims.cell_dims();
        Self {
            x: cell_id % cells_x,
            y: (cell_id / cells_x) % cells_y,
            z: cell_id / dims.cells_per_layer(),
        }
    }

    /// Linear point indices of the 8 corners
    #[inline]
    pub fn corner_indices(&self, dims: GridDims) -> [usize; 8] {
        let i0 = dims.point_index(self.x, self.y, self.z);
        let i1 = i0 + 1;
        let i2 = i0 + 1 + dims.nx;
        let i3 = i0 + dims.nx;
        let layer = dims.points_per_layer();
        [i0, i1, i2, i3, i0 + layer, i1 + layer, i2 + layer, i3 + layer]
    }

    /// Corner positions in the normalized `[-1, 1]` placement
    pub fn corner_positions(&self, dims: GridDims) -> [Point3f; 8] {
        let (x0, y0, z0) = (self.x, self.y, self.z);
        let (x1, y1, z1) = (x0 + 1, y0 + 1, z0 + 1);
        [
            dims.normalized_position(x0, y0, z0),
            dims.normalized_position(x1, y0, z0),
            dims.normalized_position(x1, y1, z0),
            dims.normalized_position(x0, y1, z0),
            dims.normalized_position(x0, y0, z1),
            dims.normalized_position(x1, y0, z1),
            dims.normalized_position(x1, y1, z1),
            dims.normalized_position(x0, y1, z1),
        ]
    }
}

/// Walks consecutive cells of a field, keeping the current cell's corner
/// indices and samples.
///
/// Stepping to the next cell in the same x-row reuses the right face
/// (corners 1, 2, 5, 6) as the new left face (corners 0, 3, 4, 7) and reads
/// only four new samples. At the end of a row the cursor re-seeks.
#[derive(Debug, Clone)]
pub struct CellCursor<'a> {
    field: &'a [f32],
    dims: GridDims,
    cell_id: usize,
    coords: CellCoords,
    indices: [usize; 8],
    values: [f32; 8],
}

impl<'a> CellCursor<'a> {
    /// Position the cursor on `cell_id`, fetching all 8 samples
    pub fn seek(field: &'a [f32], dims: GridDims, cell_id: usize) -> Self {
        let coords = CellCoords::decode(cell_id, dims);
        let indices = coords.corner_indices(dims);
        let values = indices.map(|i| field[i]);
        Self {
            field,
            dims,
            cell_id,
            coords,
            indices,
            values,
        }
    }

    /// Move to the next cell id
    pub fn advance(&mut self) {
        self.cell_id += 1;
        if self.coords.x + 2 < self.dims.nx {
            self.coords.x += 1;

            // back face     front face
            //   7 6           3 2
            //   4 5           0 1
            let [_, i1, i2, _, _, i5, i6, _] = self.indices;
            let [_, f1, f2, _, _, f5, f6, _] = self.values;
            self.indices = [i1, i1 + 1, i2 + 1, i2, i5, i5 + 1, i6 + 1, i6];
            self.values = [
                f1,
                self.field[i1 + 1],
                self.field[i2 + 1],
                f2,
                f5,
                self.field[i5 + 1],
                self.field[i6 + 1],
                f6,
            ];
        } else {
            *self = Self::seek(self.field, self.dims, self.cell_id);
        }
    }

    pub fn cell_id(&self) -> usize {
        self.cell_id
    }

    pub fn coords(&self) -> CellCoords {
        self.coords
    }

    pub fn indices(&self) -> &[usize; 8] {
        &self.indices
    }

    pub fn values(&self) -> &[f32; 8] {
        &self.values
    }

    /// Case index of the current cell
    #[inline]
    pub fn case_index(&self, isovalue: f32) -> u8 {
        tables::case_index(&self.values, isovalue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp_field(dims: GridDims) -> Vec<f32> {
        (0..dims.point_count()).map(|i| i as f32).collect()
    }

    #[test]
    fn test_decode_cell_id() {
        let dims = GridDims::new(4, 3, 3);
        // 3 x 2 x 2 cells
        assert_eq!(CellCoords::decode(0, dims), CellCoords { x: 0, y: 0, z: 0 });
        assert_eq!(CellCoords::decode(2, dims), CellCoords { x: 2, y: 0, z: 0 });
        assert_eq!(CellCoords::decode(3, dims), CellCoords { x: 0, y: 1, z: 0 });
        assert_eq!(CellCoords::decode(7, dims), CellCoords { x: 1, y: 0, z: 1 });
        assert_eq!(CellCoords::decode(11, dims), CellCoords { x: 2, y: 1, z: 1 });
    }

    #[test]
    fn test_corner_pattern() {
        let dims = GridDims::new(4, 3, 3);
        let coords = CellCoords { x: 1, y: 1, z: 0 };
        let i0 = dims.point_index(1, 1, 0);
        assert_eq!(
            coords.corner_indices(dims),
            [
                i0,
                dims.point_index(2, 1, 0),
                dims.point_index(2, 2, 0),
                dims.point_index(1, 2, 0),
                dims.point_index(1, 1, 1),
                dims.point_index(2, 1, 1),
                dims.point_index(2, 2, 1),
                dims.point_index(1, 2, 1),
            ]
        );
    }

    #[test]
    fn test_corner_positions_span_cell() {
        let dims = GridDims::new(3, 3, 3);
        let positions = CellCoords { x: 1, y: 0, z: 1 }.corner_positions(dims);
        assert_eq!(positions[0], Point3f::new(0.0, -1.0, 0.0));
        assert_eq!(positions[6], Point3f::new(1.0, 0.0, 1.0));
    }

    #[test]
    fn test_advance_matches_seek_everywhere() {
        let dims = GridDims::new(5, 4, 3);
        let field = ramp_field(dims);
        let mut cursor = CellCursor::seek(&field, dims, 0);
        for cell_id in 1..dims.cell_count() {
            cursor.advance();
            let fresh = CellCursor::seek(&field, dims, cell_id);
            assert_eq!(cursor.cell_id(), cell_id);
            assert_eq!(cursor.coords(), fresh.coords());
            assert_eq!(cursor.indices(), fresh.indices());
            assert_eq!(cursor.values(), fresh.values());
        }
    }

    #[test]
    fn test_advance_across_row_and_layer() {
        let dims = GridDims::new(3, 3, 3);
        let field = ramp_field(dims);
        // cell 1 ends row 0, cell 3 ends layer 0
        let mut cursor = CellCursor::seek(&field, dims, 1);
        cursor.advance();
        assert_eq!(cursor.coords(), CellCoords { x: 0, y: 1, z: 0 });
        cursor.advance();
        cursor.advance();
        assert_eq!(cursor.coords(), CellCoords { x: 0, y: 0, z: 1 });
        assert_eq!(cursor.values()[0], dims.point_index(0, 0, 1) as f32);
    }
}
