//! Integration tests for the static map backend.
//!
//! These exercise the full path from raw reference cloud through voxel
//! downsampling to stencil queries.

mod common;

use common::{flat_square_cloud, scatter_cloud};
use samipa_map::core::{Point3, PointCloud3};
use samipa_map::{DistanceFilter, MapLoaderConfig, ProximityMap, SnapshotMap};

fn config(threshold: f64, z_ratio: f64) -> MapLoaderConfig {
    let mut cfg = MapLoaderConfig::default();
    cfg.distance_threshold = threshold;
    cfg.downsize_ratio_z_axis = z_ratio;
    cfg
}

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn test_empty_backend_fails_open() {
    let map = SnapshotMap::new(&config(0.5, 0.5));

    assert!(!map.is_initialized());
    assert!(!map.is_close_to_map(Point3::ZERO, 100.0));

    // An empty rebuild initializes the backend but still matches nothing.
    map.rebuild(&PointCloud3::new(), "map");
    assert!(map.is_initialized());
    assert!(!map.is_close_to_map(Point3::ZERO, 100.0));
}

#[test]
fn test_rebuild_replaces_previous_map() {
    let map = SnapshotMap::new(&config(0.5, 0.5));

    map.rebuild(&flat_square_cloud(0.0, 0.0, 20.0, 0.5, 0.0), "map");
    assert!(map.is_close_to_map(Point3::new(5.1, 5.1, 0.05), 0.5));

    // Move the whole map elsewhere; the old region no longer matches.
    map.rebuild(&flat_square_cloud(100.0, 100.0, 20.0, 0.5, 0.0), "map");
    assert!(!map.is_close_to_map(Point3::new(5.1, 5.1, 0.05), 0.5));
    assert!(map.is_close_to_map(Point3::new(105.1, 105.1, 0.05), 0.5));
}

// ============================================================================
// Query geometry
// ============================================================================

#[test]
fn test_on_map_and_off_map_points() {
    let map = SnapshotMap::new(&config(0.5, 0.5));
    map.rebuild(&flat_square_cloud(0.0, 0.0, 20.0, 0.5, 0.0), "map");

    // Directly on the plane.
    assert!(map.is_close_to_map(Point3::new(10.0, 10.0, 0.0), 0.5));
    // Just beside a map point, within the threshold.
    assert!(map.is_close_to_map(Point3::new(10.1, 10.2, 0.1), 0.5));
    // Far outside the mapped extent.
    assert!(!map.is_close_to_map(Point3::new(50.0, 50.0, 0.0), 0.5));
    assert!(!map.is_close_to_map(Point3::new(-5.0, -5.0, 0.0), 0.5));
}

#[test]
fn test_vertical_reach_is_scaled() {
    let map = SnapshotMap::new(&config(0.5, 0.5));
    map.rebuild(&flat_square_cloud(0.0, 0.0, 20.0, 0.5, 0.0), "map");

    // Horizontal reach is the full threshold, vertical reach only half of
    // it. A point hovering 0.4 m above the plane is horizontally on the
    // map but vertically out of reach.
    assert!(map.is_close_to_map(Point3::new(10.0, 10.0, 0.2), 0.5));
    assert!(!map.is_close_to_map(Point3::new(10.0, 10.0, 0.4), 0.5));
}

#[test]
fn test_every_map_point_matches_itself() {
    // Each original point shares a voxel with its centroid, and within one
    // leaf every per-axis distance stays under the threshold.
    let cloud = scatter_cloud(2000, 40.0, 7);
    let map = SnapshotMap::new(&config(0.5, 0.5));
    map.rebuild(&cloud, "map");

    for point in cloud.iter() {
        assert!(
            map.is_close_to_map(point, 0.5),
            "map point {:?} not matched by its own map",
            point
        );
    }
}

#[test]
fn test_larger_threshold_config_widens_voxels() {
    // The leaf size follows the configured threshold, so a coarse config
    // accepts points a fine config rejects.
    let cloud = PointCloud3::from_points(&[Point3::new(0.0, 0.0, 0.0)]);

    let fine = SnapshotMap::new(&config(0.5, 1.0));
    fine.rebuild(&cloud, "map");
    let coarse = SnapshotMap::new(&config(2.0, 1.0));
    coarse.rebuild(&cloud, "map");

    let probe = Point3::new(1.5, 0.0, 0.0);
    assert!(!fine.is_close_to_map(probe, 0.5));
    assert!(coarse.is_close_to_map(probe, 2.0));
}

// ============================================================================
// Filtering against the map
// ============================================================================

#[test]
fn test_distance_filter_splits_scan() {
    let map_cloud = flat_square_cloud(0.0, 0.0, 10.0, 0.5, 0.0);
    let filter = DistanceFilter::new(&map_cloud, 0.5);

    let mut scan = PointCloud3::new();
    scan.push(5.0, 5.0, 0.1); // on the map
    scan.push(5.0, 5.0, 3.0); // hovering above it
    scan.push(20.0, 20.0, 0.0); // outside the mapped extent

    let dynamic = filter.filter(&scan);
    assert_eq!(dynamic.len(), 2);
    assert_eq!(dynamic.get(0), Some(Point3::new(5.0, 5.0, 3.0)));
    assert_eq!(dynamic.get(1), Some(Point3::new(20.0, 20.0, 0.0)));
}
