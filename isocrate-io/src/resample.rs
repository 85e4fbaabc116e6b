//! Trilinear resampling of scalar fields
//!
//! Magnifies every axis by the same factor. Output sample `i` along an axis
//! reads the source at coordinate `i / factor`, so factors below 1 shrink the
//! grid and factors above 1 refine it while keeping the first sample fixed.

use isocrate_core::{Error, GridDims, Result, ScalarField};
use log::debug;
use rayon::prelude::*;

/// Axis length after magnifying an axis of `n` points by `factor`
pub fn resampled_len(n: usize, factor: f64) -> usize {
    let len = (((n.saturating_sub(1)) as f64 * factor)
        .floor() as usize)
        .saturating_add(1);
    len.max(2)
}

/// Lower source index and blend weight for every output sample of one axis
fn axis_weights(n: usize, m: usize, factor: f64) -> Vec<(usize, f32)> {
    let last = (n - 1) as f64;
    (0..m)
        .map(|i| {
            let s = (i as f64 / factor).min(last);
            let i0 = (s.floor() as usize).min(n - 2);
            (i0, (s - i0 as f64) as f32)
        })
        .collect()
}

#[inline]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + t * (b - a)
}

/// Resample `field` by `factor` along every axis
pub fn resample(field: &ScalarField, factor: f64) -> Result<ScalarField> {
    if !factor.is_finite() || factor <= 0.0 {
        return Err(Error::InvalidData(format!(
            "resample factor {factor} must be positive"
        )));
    }

    let src = field.dims();
    if factor == 1.0 {
        return Ok(field.clone());
    }

    let dims = GridDims::new(
        resampled_len(src.nx, factor),
        resampled_len(src.ny, factor),
        resampled_len(src.nz, factor),
    );
    dims.validate()?;
    let wx = axis_weights(src.nx, dims.nx, factor);
    let wy = axis_weights(src.ny, dims.ny, factor);
    let wz = axis_weights(src.nz, dims.nz, factor);

    let values = field.values();
    let at = |x: usize, y: usize, z: usize| values[src.point_index(x, y, z)];

    let mut out = vec![0.0f32; dims.point_count()];
    out.par_chunks_mut(dims.points_per_layer())
        .zip(wz.par_iter())
        .for_each(|(layer, &(z0, tz))| {
            for (y, &(y0, ty)) in wy.iter().enumerate() {
                let row = &mut layer[y * dims.nx..(y + 1) * dims.nx];
                for (sample, &(x0, tx)) in row.iter_mut().zip(&wx) {
                    let c00 = lerp(at(x0, y0, z0), at(x0 + 1, y0, z0), tx);
                    let c10 = lerp(at(x0, y0 + 1, z0), at(x0 + 1, y0 + 1, z0), tx);
                    let c01 = lerp(at(x0, y0, z0 + 1), at(x0 + 1, y0, z0 + 1), tx);
                    let c11 = lerp(at(x0, y0 + 1, z0 + 1), at(x0 + 1, y0 + 1, z0 + 1), tx);
                    *sample = lerp(lerp(c00, c10, ty), lerp(c01, c11, ty), tz);
                }
            }
        });

    debug!(
        "resampled {:?} to {:?} (factor {})",
        src.as_array(),
        dims.as_array(),
        factor
    );
    ScalarField::new(dims, out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn linear_field(dims: GridDims) -> ScalarField {
        ScalarField::from_fn(dims, |x, y, z| x as f32 + 2.0 * y as f32 - 0.5 * z as f32).unwrap()
    }

    #[test]
    fn test_resampled_len() {
        assert_eq!(resampled_len(101, 0.4), 41);
        assert_eq!(resampled_len(10, 0.4), 4);
        assert_eq!(resampled_len(10, 2.0), 19);
        assert_eq!(resampled_len(3, 0.1), 2);
    }

    #[test]
    fn test_identity_factor() {
        let field = linear_field(GridDims::new(4, 3, 5));
        assert_eq!(resample(&field, 1.0).unwrap(), field);
    }

    #[test]
    fn test_invalid_factor() {
        let field = linear_field(GridDims::new(3, 3, 3));
        for factor in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(resample(&field, factor), Err(Error::InvalidData(_))));
        }
    }

    #[test]
    fn test_oversized_factor_rejected() {
        let field = linear_field(GridDims::new(3, 3, 3));
        assert_eq!(resampled_len(3, 1e300), usize::MAX);
        assert!(matches!(resample(&field, 1e300), Err(Error::GridTooLarge(_))));
    }

    #[test]
    fn test_upsample_linear_field_is_exact() {
        let field = linear_field(GridDims::new(4, 3, 5));
        let fine = resample(&field, 2.0).unwrap();
        assert_eq!(fine.dims(), GridDims::new(7, 5, 9));
        for z in 0..9 {
            for y in 0..5 {
                for x in 0..7 {
                    let expected = 0.5 * x as f32 + y as f32 - 0.25 * z as f32;
                    assert_relative_eq!(fine.get(x, y, z).unwrap(), expected, epsilon = 1e-5);
                }
            }
        }
    }

    #[test]
    fn test_downsample_keeps_samples_on_grid() {
        let field = linear_field(GridDims::new(11, 11, 11));
        let coarse = resample(&field, 0.5).unwrap();
        assert_eq!(coarse.dims(), GridDims::new(6, 6, 6));
        assert_eq!(coarse.get(0, 0, 0), field.get(0, 0, 0));
        assert_relative_eq!(coarse.get(5, 5, 5).unwrap(), field.get(10, 10, 10).unwrap());
        assert_relative_eq!(coarse.get(2, 1, 3).unwrap(), field.get(4, 2, 6).unwrap());
    }

    #[test]
    fn test_tiny_factor_clamps_to_two_points() {
        let field = linear_field(GridDims::new(5, 5, 5));
        let coarse = resample(&field, 0.01).unwrap();
        assert_eq!(coarse.dims(), GridDims::new(2, 2, 2));
        // second sample clamps to the far edge
        assert_relative_eq!(coarse.get(1, 1, 1).unwrap(), field.get(4, 4, 4).unwrap());
    }
}
