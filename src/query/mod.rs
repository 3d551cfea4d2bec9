//! Proximity queries and map-based cloud filtering.

pub mod filter;
pub mod proximity;

pub use filter::{DistanceFilter, filter_map_points};
pub use proximity::{build_map_tree, has_map_point_within, is_close_to_neighbor_voxels};
