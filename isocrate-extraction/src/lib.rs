//! # isocrate extraction
//!
//! Data-parallel Marching Cubes over uniform scalar grids.
//!
//! Extraction runs in three strictly ordered stages: the classifier counts the
//! vertices every (optionally fused) block of cells will emit, an offset
//! planner turns those counts into write offsets, and the generator writes
//! interpolated positions and scalars into disjoint slices of the output.

pub mod tables;
pub mod cell;
pub mod classify;
pub mod scan;
pub mod generate;
pub mod parallel;
pub mod marching_cubes;

// Re-export commonly used items
pub use classify::{BlockClass, BlockLayout, Classification, Classifier};
pub use generate::Generator;
pub use marching_cubes::*;
pub use scan::{OffsetPlanner, ParallelScan, ScanOutput, SerialScan};
