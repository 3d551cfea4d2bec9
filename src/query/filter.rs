//! Compare-map filtering: split a sensor cloud into points the reference map
//! explains and points it does not.
//!
//! Downstream perception wants the leftover points (obstacles that are not
//! part of the static map). [`filter_map_points`] runs against any
//! [`ProximityMap`] backend; [`DistanceFilter`] is a snapshot-bound variant
//! that trades the stencil approximation for a true radius test.

use kiddo::KdTree;

use crate::ProximityMap;
use crate::core::PointCloud3;
use crate::query::proximity::{build_map_tree, has_map_point_within};
use crate::voxel::VoxelGrid;

/// Return the points of `cloud` that are NOT close to the map.
pub fn filter_map_points(
    map: &dyn ProximityMap,
    cloud: &PointCloud3,
    threshold: f64,
) -> PointCloud3 {
    let mut kept = PointCloud3::with_capacity(cloud.len());
    for point in cloud.iter() {
        if !map.is_close_to_map(point, threshold) {
            kept.push_point(point);
        }
    }
    kept
}

/// Radius-based map filter over a fixed map cloud.
///
/// Combines exact voxel occupancy with a k-d tree over the raw (not
/// downsampled) map points, so isolated map points within the threshold are
/// found even when the query's voxel neighborhood is empty.
pub struct DistanceFilter {
    grid: VoxelGrid,
    tree: Option<KdTree<f32, 3>>,
    threshold: f64,
}

impl DistanceFilter {
    /// Build a filter over `map_cloud` with the given distance threshold,
    /// which doubles as the voxel leaf size.
    pub fn new(map_cloud: &PointCloud3, threshold: f64) -> Self {
        let grid = VoxelGrid::build(map_cloud, threshold, threshold, threshold);
        let tree = if map_cloud.is_empty() {
            None
        } else {
            Some(build_map_tree(map_cloud))
        };
        Self {
            grid,
            tree,
            threshold,
        }
    }

    /// Whether a map point lies within the threshold of `point`.
    pub fn is_close(&self, point: crate::core::Point3) -> bool {
        has_map_point_within(point, self.threshold, &self.grid, self.tree.as_ref())
    }

    /// Return the points of `cloud` not explained by the map.
    pub fn filter(&self, cloud: &PointCloud3) -> PointCloud3 {
        let mut kept = PointCloud3::with_capacity(cloud.len());
        for point in cloud.iter() {
            if !self.is_close(point) {
                kept.push_point(point);
            }
        }
        kept
    }
}
