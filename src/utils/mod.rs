//! Utility functions and types

pub mod linalg;
mod parallel;

pub use parallel::{parallel_map, parallel_map_with_config, ParallelConfig};
