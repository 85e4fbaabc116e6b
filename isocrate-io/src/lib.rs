//! Volume I/O for isocrate
//!
//! Loaders that turn volume files into [`ScalarField`]s for the extraction
//! engine, plus trilinear resampling to trade resolution for speed.

pub mod raw;
pub mod nrrd;
pub mod resample;

pub use nrrd::{parse_nrrd, read_nrrd, write_nrrd};
pub use raw::{read_raw_volume, write_raw_volume};
pub use resample::{resample, resampled_len};

use isocrate_core::{Error, GridDims, Result, ScalarField};
use std::path::Path;

/// Auto-detect format and read a volume.
///
/// NRRD files carry their own dimensions; raw volumes need `dims`.
pub fn read_volume<P: AsRef<Path>>(path: P, dims: Option<GridDims>) -> Result<ScalarField> {
    let path = path.as_ref();
    match path.extension().and_then(|s| s.to_str()) {
        Some("nrrd") => read_nrrd(path),
        Some("raw") => match dims {
            Some(dims) => read_raw_volume(path, dims),
            None => Err(Error::InvalidData(format!(
                "Raw volume {} needs explicit dimensions",
                path.display()
            ))),
        },
        _ => Err(Error::UnsupportedFormat(format!(
            "Unsupported volume format: {:?}",
            path.extension()
        ))),
    }
}
