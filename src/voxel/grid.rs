//! Voxel downsampling grid with O(1) centroid lookup.
//!
//! [`VoxelGrid::build`] bins a point cloud into voxels of the given leaf
//! size, averaging each voxel's members into one centroid. The grid keeps a
//! layout from flat voxel index to centroid, so "which map point represents
//! the voxel containing P?" is a single hash lookup — the primitive the
//! proximity stencil is built on.
//!
//! Voxel coordinates are `floor(c / leaf)` per axis, computed in f64. Flat
//! indices are computed in i64 and the layout is addressed with i32: a flat
//! index outside `[0, i32::MAX]` is unaddressable, and points falling there
//! are dropped from the downsample. The feasibility guard reports when a
//! map's extent puts it in that regime.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use crate::core::{Bounds3, Point3, PointCloud3};

/// Voxel coordinate of a world coordinate along one axis.
#[inline]
fn voxel_coord(value: f32, leaf: f64) -> i64 {
    (f64::from(value) / leaf).floor() as i64
}

/// Flat layout index for voxel coordinates relative to the grid's min corner.
///
/// Returns `None` on arithmetic overflow (extents far beyond any real map).
#[inline]
fn flat_index(
    i: i64,
    j: i64,
    k: i64,
    min_b: (i64, i64, i64),
    div_x: i64,
    div_y: i64,
) -> Option<i64> {
    let di = i - min_b.0;
    let dj = j - min_b.1;
    let dk = k - min_b.2;
    let row = div_x.checked_mul(dj)?;
    let slab = div_x.checked_mul(div_y)?.checked_mul(dk)?;
    di.checked_add(row)?.checked_add(slab)
}

/// Voxel-downsampled map region with centroid lookup.
#[derive(Clone, Debug)]
pub struct VoxelGrid {
    leaf_x: f64,
    leaf_y: f64,
    leaf_z: f64,
    /// Smallest voxel coordinate per axis covered by the layout.
    min_b: (i64, i64, i64),
    /// Largest voxel coordinate per axis covered by the layout.
    max_b: (i64, i64, i64),
    div_x: i64,
    div_y: i64,
    /// One representative point per occupied voxel (mean of members).
    centroids: PointCloud3,
    /// Flat voxel index -> index into `centroids`.
    layout: HashMap<i32, u32>,
    bounds: Bounds3,
}

impl VoxelGrid {
    /// Build a grid from a cloud with the given per-axis leaf sizes.
    ///
    /// An empty cloud (or non-positive leaf size) yields an empty grid whose
    /// every lookup returns `None`.
    pub fn build(cloud: &PointCloud3, leaf_x: f64, leaf_y: f64, leaf_z: f64) -> Self {
        if leaf_x <= 0.0 || leaf_y <= 0.0 || leaf_z <= 0.0 {
            log::error!(
                "Voxel leaf sizes must be positive, got ({}, {}, {})",
                leaf_x,
                leaf_y,
                leaf_z
            );
            return Self::empty(leaf_x, leaf_y, leaf_z);
        }

        let bounds = Bounds3::from_cloud(cloud);
        if bounds.is_empty() {
            return Self::empty(leaf_x, leaf_y, leaf_z);
        }

        let min_b = (
            voxel_coord(bounds.min.x, leaf_x),
            voxel_coord(bounds.min.y, leaf_y),
            voxel_coord(bounds.min.z, leaf_z),
        );
        let max_b = (
            voxel_coord(bounds.max.x, leaf_x),
            voxel_coord(bounds.max.y, leaf_y),
            voxel_coord(bounds.max.z, leaf_z),
        );
        let div_x = max_b.0 - min_b.0 + 1;
        let div_y = max_b.1 - min_b.1 + 1;

        // Accumulate per-voxel sums in first-seen order so centroid order
        // (and therefore the downsampled cloud) is deterministic.
        let mut layout: HashMap<i32, u32> = HashMap::new();
        let mut sums: Vec<(f64, f64, f64, u32)> = Vec::new();
        let mut dropped = 0usize;

        for p in cloud.iter() {
            let i = voxel_coord(p.x, leaf_x);
            let j = voxel_coord(p.y, leaf_y);
            let k = voxel_coord(p.z, leaf_z);
            let flat = match flat_index(i, j, k, min_b, div_x, div_y) {
                Some(flat) if (0..=i64::from(i32::MAX)).contains(&flat) => flat as i32,
                _ => {
                    dropped += 1;
                    continue;
                }
            };
            match layout.entry(flat) {
                Entry::Occupied(entry) => {
                    let sum = &mut sums[*entry.get() as usize];
                    sum.0 += f64::from(p.x);
                    sum.1 += f64::from(p.y);
                    sum.2 += f64::from(p.z);
                    sum.3 += 1;
                }
                Entry::Vacant(entry) => {
                    entry.insert(sums.len() as u32);
                    sums.push((f64::from(p.x), f64::from(p.y), f64::from(p.z), 1));
                }
            }
        }

        if dropped > 0 {
            log::warn!(
                "{} points fell outside the addressable voxel layout and were dropped",
                dropped
            );
        }

        let mut centroids = PointCloud3::with_capacity(sums.len());
        for &(sx, sy, sz, n) in &sums {
            let n = f64::from(n);
            centroids.push((sx / n) as f32, (sy / n) as f32, (sz / n) as f32);
        }

        Self {
            leaf_x,
            leaf_y,
            leaf_z,
            min_b,
            max_b,
            div_x,
            div_y,
            centroids,
            layout,
            bounds,
        }
    }

    fn empty(leaf_x: f64, leaf_y: f64, leaf_z: f64) -> Self {
        Self {
            leaf_x,
            leaf_y,
            leaf_z,
            min_b: (0, 0, 0),
            max_b: (-1, -1, -1),
            div_x: 0,
            div_y: 0,
            centroids: PointCloud3::new(),
            layout: HashMap::new(),
            bounds: Bounds3::empty(),
        }
    }

    /// Layout index of the voxel containing `point`, if that voxel is
    /// occupied and addressable.
    fn centroid_index(&self, point: Point3) -> Option<u32> {
        if self.layout.is_empty() {
            return None;
        }
        let i = voxel_coord(point.x, self.leaf_x);
        let j = voxel_coord(point.y, self.leaf_y);
        let k = voxel_coord(point.z, self.leaf_z);
        if i < self.min_b.0
            || i > self.max_b.0
            || j < self.min_b.1
            || j > self.max_b.1
            || k < self.min_b.2
            || k > self.max_b.2
        {
            return None;
        }
        let flat = flat_index(i, j, k, self.min_b, self.div_x, self.div_y)?;
        if !(0..=i64::from(i32::MAX)).contains(&flat) {
            return None;
        }
        self.layout.get(&(flat as i32)).copied()
    }

    /// Centroid of the voxel containing `point`, if occupied.
    #[inline]
    pub fn centroid_at(&self, point: Point3) -> Option<Point3> {
        let index = self.centroid_index(point)?;
        self.centroids.get(index as usize)
    }

    /// Whether the voxel containing `point` holds any map point.
    #[inline]
    pub fn is_voxel_occupied(&self, point: Point3) -> bool {
        self.centroid_index(point).is_some()
    }

    /// The downsampled cloud (one centroid per occupied voxel).
    pub fn points(&self) -> &PointCloud3 {
        &self.centroids
    }

    /// Number of occupied voxels.
    pub fn len(&self) -> usize {
        self.centroids.len()
    }

    /// Whether the grid holds no voxels.
    pub fn is_empty(&self) -> bool {
        self.centroids.is_empty()
    }

    /// Leaf sizes as (x, y, z).
    pub fn leaf_sizes(&self) -> (f64, f64, f64) {
        (self.leaf_x, self.leaf_y, self.leaf_z)
    }

    /// Bounds of the cloud the grid was built from.
    pub fn bounds(&self) -> Bounds3 {
        self.bounds
    }
}
