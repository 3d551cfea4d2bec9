//! Proximity tests against a voxel grid.
//!
//! The workhorse is [`is_close_to_neighbor_voxels`]: a 27-candidate stencil
//! around the query point. Shifting the point by the threshold along each
//! axis combination guarantees that any voxel whose centroid could pass the
//! distance test gets probed, even when the query point sits near a voxel
//! face and its own voxel is empty.
//!
//! ```text
//!        z
//!        |  probe order: self, axis faces, edges, corners
//!        |                      (short-circuits on first accept)
//!        +----- x       shift distance: threshold in x/y,
//!       /                               threshold_z in z
//!      y
//! ```
//!
//! [`has_map_point_within`] is the fallback form for callers that need a
//! true radius test instead of the stencil approximation: exact voxel
//! occupancy first, then a nearest-neighbor lookup in a k-d tree over the
//! raw map points.

use kiddo::{KdTree, SquaredEuclidean};

use crate::core::{Point3, PointCloud3};
use crate::voxel::VoxelGrid;

/// Stencil offsets in units of the per-axis shift distance.
///
/// Ordered self, then faces, then edges, then corners so the cheap hits
/// short-circuit first and the visit order is deterministic.
const STENCIL: [(i8, i8, i8); 27] = [
    // self
    (0, 0, 0),
    // axis-aligned faces
    (-1, 0, 0),
    (1, 0, 0),
    (0, -1, 0),
    (0, 1, 0),
    (0, 0, -1),
    (0, 0, 1),
    // edges
    (-1, -1, 0),
    (-1, 1, 0),
    (1, -1, 0),
    (1, 1, 0),
    (-1, 0, -1),
    (-1, 0, 1),
    (1, 0, -1),
    (1, 0, 1),
    (0, -1, -1),
    (0, -1, 1),
    (0, 1, -1),
    (0, 1, 1),
    // corners
    (-1, -1, -1),
    (-1, -1, 1),
    (-1, 1, -1),
    (-1, 1, 1),
    (1, -1, -1),
    (1, -1, 1),
    (1, 1, -1),
    (1, 1, 1),
];

/// True when the voxel containing `candidate` holds a centroid within the
/// per-axis thresholds of `target`.
///
/// Distances are measured against `target` (the original query point), not
/// against the shifted candidate, with strict comparisons.
fn voxel_matches(
    candidate: Point3,
    target: Point3,
    threshold: f64,
    threshold_z: f64,
    grid: &VoxelGrid,
) -> bool {
    match grid.centroid_at(candidate) {
        Some(centroid) => {
            (f64::from(target.x) - f64::from(centroid.x)).abs() < threshold
                && (f64::from(target.y) - f64::from(centroid.y)).abs() < threshold
                && (f64::from(target.z) - f64::from(centroid.z)).abs() < threshold_z
        }
        None => false,
    }
}

/// Stencil proximity test: is some map centroid within `threshold` of
/// `point` in x and y, and within `threshold_z` in z?
///
/// Returns false for an empty grid. Callers derive `threshold_z` from their
/// z downsize ratio (`threshold * downsize_ratio_z_axis`).
pub fn is_close_to_neighbor_voxels(
    point: Point3,
    threshold: f64,
    threshold_z: f64,
    grid: &VoxelGrid,
) -> bool {
    if grid.is_empty() {
        return false;
    }
    let dx = threshold as f32;
    let dz = threshold_z as f32;
    for &(sx, sy, sz) in &STENCIL {
        let candidate = Point3::new(
            point.x + f32::from(sx) * dx,
            point.y + f32::from(sy) * dx,
            point.z + f32::from(sz) * dz,
        );
        if voxel_matches(candidate, point, threshold, threshold_z, grid) {
            return true;
        }
    }
    false
}

/// Build a k-d tree over a raw map cloud for radius queries.
///
/// Items are indices into the cloud. Pass the tree as `None` rather than
/// building one from an empty cloud.
pub fn build_map_tree(cloud: &PointCloud3) -> KdTree<f32, 3> {
    let mut tree: KdTree<f32, 3> = KdTree::new();
    for i in 0..cloud.len() {
        tree.add(&[cloud.xs[i], cloud.ys[i], cloud.zs[i]], i as u64);
    }
    tree
}

/// Radius-style proximity: exact voxel occupancy first, then the nearest
/// raw map point within `threshold` (Euclidean, inclusive).
///
/// Without a tree the fallback never matches (occupancy only).
pub fn has_map_point_within(
    point: Point3,
    threshold: f64,
    grid: &VoxelGrid,
    tree: Option<&KdTree<f32, 3>>,
) -> bool {
    if grid.is_voxel_occupied(point) {
        return true;
    }
    let Some(tree) = tree else {
        return false;
    };
    let nearest = tree.nearest_one::<SquaredEuclidean>(&[point.x, point.y, point.z]);
    f64::from(nearest.distance) <= threshold * threshold
}
