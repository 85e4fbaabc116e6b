//! Header-less little-endian `f32` volumes

use isocrate_core::{Error, GridDims, Result, ScalarField};
use log::debug;
use std::path::Path;

/// Decode little-endian `f32` samples
pub(crate) fn decode_f32_le(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

pub(crate) fn encode_f32_le(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Read `dims.point_count()` samples stored x-fastest with no header
pub fn read_raw_volume<P: AsRef<Path>>(path: P, dims: GridDims) -> Result<ScalarField> {
    let path = path.as_ref();
    dims.validate()?;
    let bytes = std::fs::read(path)?;
    if bytes.len() % 4 != 0 {
        return Err(Error::InvalidData(format!(
            "{} is {} bytes, not a whole number of f32 samples",
            path.display(),
            bytes.len()
        )));
    }
    if bytes.len() / 4 != dims.point_count() {
        return Err(Error::FieldLengthMismatch {
            name: "raw volume",
            expected: dims.point_count(),
            actual: bytes.len() / 4,
        });
    }

    debug!("read raw volume {:?} from {}", dims.as_array(), path.display());
    ScalarField::new(dims, decode_f32_le(&bytes))
}

/// Write a field's samples as a header-less little-endian volume
pub fn write_raw_volume<P: AsRef<Path>>(path: P, field: &ScalarField) -> Result<()> {
    std::fs::write(path, encode_f32_le(field.values()))?;
    Ok(())
}
