//! Integration tests for isocrate-io

use isocrate_core::{Error, GridDims, ScalarField};
use isocrate_io::*;
use std::path::PathBuf;

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("isocrate-io-{}-{}", std::process::id(), name))
}

fn ramp(dims: GridDims) -> ScalarField {
    ScalarField::from_fn(dims, |x, y, z| x as f32 * 0.25 - y as f32 + 10.0 * z as f32).unwrap()
}

#[test]
fn test_raw_volume_file() {
    let path = temp_path("ramp.raw");
    let dims = GridDims::new(5, 4, 3);
    let field = ramp(dims);

    write_raw_volume(&path, &field).unwrap();
    assert_eq!(std::fs::metadata(&path).unwrap().len(), 5 * 4 * 3 * 4);
    let loaded = read_volume(&path, Some(dims)).unwrap();
    assert_eq!(loaded, field);

    // same bytes, wrong shape
    let result = read_raw_volume(&path, GridDims::new(5, 4, 4));
    assert!(matches!(
        result,
        Err(Error::FieldLengthMismatch {
            expected: 80,
            actual: 60,
            ..
        })
    ));

    let _ = std::fs::remove_file(&path);
}

#[test]
fn test_raw_volume_partial_sample() {
    let path = temp_path("partial.raw");
    std::fs::write(&path, [0u8; 33]).unwrap();
    let result = read_raw_volume(&path, GridDims::new(2, 2, 2));
    assert!(matches!(result, Err(Error::InvalidData(_))));
    let _ = std::fs::remove_file(&path);
}

#[test]
fn test_nrrd_file() {
    let path = temp_path("ramp.nrrd");
    let field = ramp(GridDims::new(6, 2, 4));

    write_nrrd(&path, &field).unwrap();
    let loaded = read_volume(&path, None).unwrap();
    assert_eq!(loaded.dims(), GridDims::new(6, 2, 4));
    assert_eq!(loaded, field);

    let _ = std::fs::remove_file(&path);
}

#[test]
fn test_nrrd_truncated_data() {
    let path = temp_path("truncated.nrrd");
    let field = ramp(GridDims::new(3, 3, 3));
    write_nrrd(&path, &field).unwrap();

    let mut bytes = std::fs::read(&path).unwrap();
    bytes.truncate(bytes.len() - 4);
    std::fs::write(&path, &bytes).unwrap();

    assert!(matches!(read_nrrd(&path), Err(Error::InvalidData(_))));
    let _ = std::fs::remove_file(&path);
}

#[test]
fn test_resample_loaded_volume() {
    let path = temp_path("resample.nrrd");
    let field = ramp(GridDims::new(11, 6, 21));
    write_nrrd(&path, &field).unwrap();

    let loaded = read_nrrd(&path).unwrap();
    let coarse = resample(&loaded, 0.4).unwrap();
    assert_eq!(coarse.dims(), GridDims::new(5, 3, 9));
    assert_eq!(coarse.get(0, 0, 0), field.get(0, 0, 0));

    let _ = std::fs::remove_file(&path);
}
