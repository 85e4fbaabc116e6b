//! Core data structures for isocrate
//!
//! This crate provides the types shared by the extraction engine and its
//! collaborators: grid dimensions, dense scalar fields, the triangle-soup
//! output mesh, and the common error type.

pub mod point;
pub mod grid;
pub mod mesh;
pub mod error;

pub use point::*;
pub use grid::*;
pub use mesh::*;
pub use error::*;

/// Re-export commonly used types from nalgebra
pub use nalgebra::{Point3, Vector3};
