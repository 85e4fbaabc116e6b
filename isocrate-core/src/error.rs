//! Error types for isocrate

use thiserror::Error;

/// Main error type for isocrate operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid grid dimensions {0:?}: every axis needs at least 2 points")]
    InvalidDimensions([usize; 3]),

    #[error("Grid dimensions {0:?} overflow the addressable point count")]
    GridTooLarge([usize; 3]),

    #[error("Length of {name} buffer is {actual}, expected {expected}")]
    FieldLengthMismatch {
        name: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid fusion factor {0}: must be at least 1")]
    InvalidFusionFactor(usize),

    #[error("Invalid slice size {0}: a slice needs at least 1 cell")]
    InvalidSliceSize(usize),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Allocation failed: {0}")]
    Allocation(String),

    #[error("Extraction cancelled")]
    Cancelled,

    #[error("Algorithm error: {0}")]
    Algorithm(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// Result type alias for isocrate operations
pub type Result<T> = std::result::Result<T, Error>;
