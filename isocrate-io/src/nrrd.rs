//! NRRD volume reading and writing
//!
//! Supports attached-data NRRD files holding a 3-D `float` array with `raw`
//! encoding in little-endian byte order, which is what the benchmark volumes
//! use. Anything else is rejected as an unsupported format.

use crate::raw::{decode_f32_le, encode_f32_le};
use isocrate_core::{Error, GridDims, Result, ScalarField};
use log::debug;
use std::path::Path;

/// Parsed header fields this reader cares about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NrrdHeader {
    pub dims: GridDims,
    /// Byte offset of the first sample
    pub data_offset: usize,
}

fn unsupported(message: impl Into<String>) -> Error {
    Error::UnsupportedFormat(message.into())
}

/// Parse the header at the start of `bytes`.
///
/// The header ends at the first empty line; samples follow immediately.
pub fn parse_header(bytes: &[u8]) -> Result<NrrdHeader> {
    if !bytes.starts_with(b"NRRD000") {
        return Err(unsupported("missing NRRD magic"));
    }

    let mut dimension = None;
    let mut sizes = None;
    let mut kind = None;
    let mut encoding = None;
    let mut endian = None;

    let mut offset = 0usize;
    let mut data_offset = None;
    for line in bytes.split(|&b| b == b'\n') {
        let start = offset;
        offset += line.len() + 1;
        if start == 0 {
            continue;
        }

        let line = std::str::from_utf8(line)
            .map_err(|_| Error::InvalidData("NRRD header is not UTF-8".to_string()))?
            .trim_end_matches('\r');
        if line.is_empty() {
            data_offset = Some(offset.min(bytes.len()));
            break;
        }
        // comments and key/value pairs
        if line.starts_with('#') || line.contains(":=") {
            continue;
        }

        let Some((field, value)) = line.split_once(':') else {
            return Err(Error::InvalidData(format!("malformed NRRD header line {line:?}")));
        };
        let value = value.trim();
        match field.trim().to_ascii_lowercase().as_str() {
            "dimension" => dimension = Some(value.to_string()),
            "sizes" => sizes = Some(value.to_string()),
            "type" => kind = Some(value.to_ascii_lowercase()),
            "encoding" => encoding = Some(value.to_ascii_lowercase()),
            "endian" => endian = Some(value.to_ascii_lowercase()),
            "data file" | "datafile" => {
                return Err(unsupported("detached NRRD data files are not supported"));
            }
            _ => {}
        }
    }

    let data_offset = data_offset
        .ok_or_else(|| Error::InvalidData("NRRD header is not terminated".to_string()))?;

    match kind.as_deref() {
        Some("float") => {}
        other => return Err(unsupported(format!("NRRD type {other:?}, expected float"))),
    }
    match encoding.as_deref() {
        Some("raw") => {}
        other => return Err(unsupported(format!("NRRD encoding {other:?}, expected raw"))),
    }
    match endian.as_deref() {
        Some("little") | None => {}
        Some(other) => return Err(unsupported(format!("NRRD endian {other:?}"))),
    }
    if dimension.as_deref() != Some("3") {
        return Err(unsupported(format!(
            "NRRD dimension {dimension:?}, expected 3"
        )));
    }

    let sizes = sizes.ok_or_else(|| Error::InvalidData("NRRD header has no sizes".to_string()))?;
    let sizes = sizes
        .split_whitespace()
        .map(|s| {
            s.parse::<usize>()
                .map_err(|_| Error::InvalidData(format!("bad NRRD size {s:?}")))
        })
        .collect::<Result<Vec<_>>>()?;
    let [nx, ny, nz] = sizes[..] else {
        return Err(Error::InvalidData(format!(
            "NRRD sizes {sizes:?} do not describe a 3-D volume"
        )));
    };

    Ok(NrrdHeader {
        dims: GridDims::new(nx, ny, nz),
        data_offset,
    })
}

/// Decode an in-memory NRRD volume with attached raw data
pub fn parse_nrrd(bytes: &[u8]) -> Result<ScalarField> {
    let header = parse_header(bytes)?;
    header.dims.validate()?;

    let data = &bytes[header.data_offset..];
    let needed = header
        .dims
        .point_count()
        .checked_mul(std::mem::size_of::<f32>())
        .ok_or_else(|| {
            Error::InvalidData(format!(
                "NRRD sizes {:?} overflow the addressable byte count",
                header.dims.as_array()
            ))
        })?;
    if data.len() < needed {
        return Err(Error::InvalidData(format!(
            "NRRD data holds {} bytes, expected {}",
            data.len(),
            needed
        )));
    }

    ScalarField::new(header.dims, decode_f32_le(&data[..needed]))
}

/// Read a 3-D float NRRD volume with attached raw data
pub fn read_nrrd<P: AsRef<Path>>(path: P) -> Result<ScalarField> {
    let path = path.as_ref();
    let field = parse_nrrd(&std::fs::read(path)?)?;
    debug!(
        "read NRRD volume {:?} from {}",
        field.dims().as_array(),
        path.display()
    );
    Ok(field)
}

/// Write a field as an attached-data NRRD volume
pub fn write_nrrd<P: AsRef<Path>>(path: P, field: &ScalarField) -> Result<()> {
    let [nx, ny, nz] = field.dims().as_array();
    let mut bytes = format!(
        "NRRD0004\n# written by isocrate\ntype: float\ndimension: 3\nsizes: {nx} {ny} {nz}\nendian: little\nencoding: raw\n\n"
    )
    .into_bytes();
    bytes.extend(encode_f32_le(field.values()));
    std::fs::write(path, bytes)?;
    Ok(())
}
