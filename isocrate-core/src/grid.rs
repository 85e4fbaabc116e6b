//! Uniform grid dimensions and dense scalar fields
//!
//! Samples are stored x-fastest: the point at `(x, y, z)` lives at
//! `x + y * nx + z * nx * ny`.

use crate::{Error, Point3f, Result};
use serde::{Deserialize, Serialize};

/// Lower corner of the normalized placement cube.
pub const NORMALIZED_MIN: f32 = -1.0;
/// Upper corner of the normalized placement cube.
pub const NORMALIZED_MAX: f32 = 1.0;

/// Number of grid points along each axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridDims {
    pub nx: usize,
    pub ny: usize,
    pub nz: usize,
}

impl GridDims {
    /// Create grid dimensions
    pub const fn new(nx: usize, ny: usize, nz: usize) -> Self {
        Self { nx, ny, nz }
    }

    /// Dimensions as an `[nx, ny, nz]` array
    pub const fn as_array(&self) -> [usize; 3] {
        [self.nx, self.ny, self.nz]
    }

    /// Check that every axis has at least two points and that the point
    /// count fits in `usize`.
    ///
    /// The unchecked counts below are exact for any validated grid.
    pub fn validate(&self) -> Result<()> {
        if self.nx < 2 || self.ny < 2 || self.nz < 2 {
            return Err(Error::InvalidDimensions(self.as_array()));
        }
        if self.checked_point_count().is_none() {
            return Err(Error::GridTooLarge(self.as_array()));
        }
        Ok(())
    }

    /// Total number of grid points, or `None` on overflow
    pub fn checked_point_count(&self) -> Option<usize> {
        self.nx.checked_mul(self.ny)?.checked_mul(self.nz)
    }

    /// Total number of cells, or `None` on overflow
    pub fn checked_cell_count(&self) -> Option<usize> {
        let [cx, cy, cz] = self.cell_dims();
        cx.checked_mul(cy)?.checked_mul(cz)
    }

    /// Total number of grid points
    pub const fn point_count(&self) -> usize {
        self.nx * self.ny * self.nz
    }

    pub const fn points_per_layer(&self) -> usize {
        self.nx * self.ny
    }

    /// Cells along each axis
    pub const fn cell_dims(&self) -> [usize; 3] {
        [
            self.nx.saturating_sub(1),
            self.ny.saturating_sub(1),
            self.nz.saturating_sub(1),
        ]
    }

    pub const fn cells_per_layer(&self) -> usize {
        self.nx.saturating_sub(1) * self.ny.saturating_sub(1)
    }

    /// Total number of hexahedral cells
    pub const fn cell_count(&self) -> usize {
        self.cells_per_layer() * self.nz.saturating_sub(1)
    }

    /// Linear index of a grid point
    #[inline]
    pub const fn point_index(&self, x: usize, y: usize, z: usize) -> usize {
        x + y * self.nx + z * self.points_per_layer()
    }

    /// Place a grid point in the `[-1, 1]` cube, each axis scaled by its own
    /// `dim - 1`.
    #[inline]
    pub fn normalized_position(&self, x: usize, y: usize, z: usize) -> Point3f {
        Point3f::new(
            normalized_coord(x, self.nx),
            normalized_coord(y, self.ny),
            normalized_coord(z, self.nz),
        )
    }
}

#[inline]
fn normalized_coord(coord: usize, dim: usize) -> f32 {
    NORMALIZED_MIN + (NORMALIZED_MAX - NORMALIZED_MIN) * (coord as f32 / (dim - 1) as f32)
}

/// Dense 3D array of scalar samples
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalarField {
    dims: GridDims,
    values: Vec<f32>,
}

impl ScalarField {
    /// Wrap a sample buffer, checking its length against the dimensions
    pub fn new(dims: GridDims, values: Vec<f32>) -> Result<Self> {
        dims.validate()?;
        if values.len() != dims.point_count() {
            return Err(Error::FieldLengthMismatch {
                name: "field",
                expected: dims.point_count(),
                actual: values.len(),
            });
        }
        Ok(Self { dims, values })
    }

    /// Create a field by evaluating `f` at every grid point
    pub fn from_fn<F>(dims: GridDims, mut f: F) -> Result<Self>
    where
        F: FnMut(usize, usize, usize) -> f32,
    {
        dims.validate()?;
        let mut values = Vec::with_capacity(dims.point_count());
        for z in 0..dims.nz {
            for y in 0..dims.ny {
                for x in 0..dims.nx {
                    values.push(f(x, y, z));
                }
            }
        }
        Ok(Self { dims, values })
    }

    pub fn dims(&self) -> GridDims {
        self.dims
    }

    /// Raw samples in x-fastest order
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn into_values(self) -> Vec<f32> {
        self.values
    }

    /// Get scalar value at grid coordinates (with bounds checking)
    pub fn get(&self, x: usize, y: usize, z: usize) -> Option<f32> {
        if x < self.dims.nx && y < self.dims.ny && z < self.dims.nz {
            Some(self.values[self.dims.point_index(x, y, z)])
        } else {
            None
        }
    }

    /// Set scalar value at grid coordinates
    pub fn set(&mut self, x: usize, y: usize, z: usize, value: f32) -> Result<()> {
        if x < self.dims.nx && y < self.dims.ny && z < self.dims.nz {
            let index = self.dims.point_index(x, y, z);
            self.values[index] = value;
            Ok(())
        } else {
            Err(Error::InvalidData(format!(
                "Grid coordinates ({}, {}, {}) out of bounds for dimensions {:?}",
                x,
                y,
                z,
                self.dims.as_array()
            )))
        }
    }

    /// Smallest and largest sample, ignoring NaNs
    pub fn value_range(&self) -> (f32, f32) {
        self.values
            .iter()
            .filter(|v| !v.is_nan())
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_grid_counts() {
        let dims = GridDims::new(4, 3, 5);
        assert_eq!(dims.point_count(), 60);
        assert_eq!(dims.cell_dims(), [3, 2, 4]);
        assert_eq!(dims.cells_per_layer(), 6);
        assert_eq!(dims.cell_count(), 24);
        assert_eq!(dims.point_index(1, 2, 3), 1 + 2 * 4 + 3 * 12);
    }

    #[test]
    fn test_degenerate_dims_rejected() {
        assert!(GridDims::new(1, 4, 4).validate().is_err());
        assert!(GridDims::new(4, 4, 0).validate().is_err());
        assert!(GridDims::new(2, 2, 2).validate().is_ok());
    }

    #[test]
    fn test_oversized_dims_rejected() {
        let huge = GridDims::new(usize::MAX / 2, usize::MAX / 2, 2);
        assert_eq!(huge.checked_point_count(), None);
        assert_eq!(huge.checked_cell_count(), None);
        assert!(matches!(huge.validate(), Err(Error::GridTooLarge(_))));

        let layer_overflow = GridDims::new(usize::MAX, 2, 2);
        assert!(matches!(layer_overflow.validate(), Err(Error::GridTooLarge(_))));

        let dims = GridDims::new(4, 3, 5);
        assert_eq!(dims.checked_point_count(), Some(60));
        assert_eq!(dims.checked_cell_count(), Some(24));
    }

    #[test]
    fn test_oversized_field_rejected() {
        let huge = GridDims::new(usize::MAX / 2, 3, 2);
        assert!(matches!(
            ScalarField::new(huge, Vec::new()),
            Err(Error::GridTooLarge(_))
        ));
        assert!(ScalarField::from_fn(huge, |_, _, _| 0.0).is_err());
    }

    #[test]
    fn test_normalized_position_per_axis() {
        let dims = GridDims::new(3, 5, 2);
        let p = dims.normalized_position(0, 0, 0);
        assert_relative_eq!(p, Point3f::new(-1.0, -1.0, -1.0));

        let p = dims.normalized_position(2, 4, 1);
        assert_relative_eq!(p, Point3f::new(1.0, 1.0, 1.0));

        let p = dims.normalized_position(1, 1, 0);
        assert_relative_eq!(p.x, 0.0);
        assert_relative_eq!(p.y, -0.5);
    }

    #[test]
    fn test_field_length_checked() {
        let err = ScalarField::new(GridDims::new(2, 2, 2), vec![0.0; 7]).unwrap_err();
        match err {
            Error::FieldLengthMismatch { expected, actual, .. } => {
                assert_eq!(expected, 8);
                assert_eq!(actual, 7);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_field_from_fn_layout() {
        let dims = GridDims::new(3, 2, 2);
        let field = ScalarField::from_fn(dims, |x, y, z| (x + 10 * y + 100 * z) as f32).unwrap();
        assert_eq!(field.values()[dims.point_index(2, 1, 1)], 112.0);
        assert_eq!(field.get(1, 0, 1), Some(101.0));
        assert_eq!(field.get(3, 0, 0), None);
    }

    #[test]
    fn test_field_set_and_range() {
        let mut field = ScalarField::new(GridDims::new(2, 2, 2), vec![1.0; 8]).unwrap();
        field.set(1, 1, 1, -3.0).unwrap();
        field.set(0, 1, 0, f32::NAN).unwrap();
        assert!(field.set(2, 0, 0, 0.0).is_err());
        assert_eq!(field.value_range(), (-3.0, 1.0));
    }
}
