//! Voxel downsampling and layout feasibility.

pub mod feasibility;
pub mod grid;

pub use feasibility::{check_feasibility, voxel_count};
pub use grid::VoxelGrid;
