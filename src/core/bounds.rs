//! Axis-aligned bounding box over 3D map space.
//!
//! Used for map extent tracking and for the voxel-grid feasibility guard,
//! which sizes a hypothetical grid from the extent of the input cloud.

use super::cloud::PointCloud3;
use super::point::Point3;

/// Axis-aligned bounding box in 3D.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds3 {
    /// Minimum corner (smallest x, y, z values).
    pub min: Point3,
    /// Maximum corner (largest x, y, z values).
    pub max: Point3,
}

impl Bounds3 {
    /// Create a new bounding box from min and max corners.
    #[inline]
    pub const fn new(min: Point3, max: Point3) -> Self {
        Self { min, max }
    }

    /// Create an empty (invalid) bounding box.
    ///
    /// The empty bounds has min > max, so it will expand to fit any point.
    #[inline]
    pub fn empty() -> Self {
        Self {
            min: Point3::new(f32::INFINITY, f32::INFINITY, f32::INFINITY),
            max: Point3::new(f32::NEG_INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY),
        }
    }

    /// Check if the bounds are empty (invalid).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Compute the bounds of a point cloud.
    ///
    /// Returns empty bounds for an empty cloud.
    pub fn from_cloud(cloud: &PointCloud3) -> Self {
        let mut bounds = Self::empty();
        for p in cloud.iter() {
            bounds.expand_to_include(p);
        }
        bounds
    }

    /// Expand bounds to include a point.
    #[inline]
    pub fn expand_to_include(&mut self, point: Point3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    /// Extent along each axis as (x, y, z), in f64 for downstream grid math.
    ///
    /// Returns zeros for empty bounds.
    pub fn extents(&self) -> (f64, f64, f64) {
        if self.is_empty() {
            return (0.0, 0.0, 0.0);
        }
        (
            f64::from(self.max.x) - f64::from(self.min.x),
            f64::from(self.max.y) - f64::from(self.min.y),
            f64::from(self.max.z) - f64::from(self.min.z),
        )
    }

    /// Check if a point is inside the bounding box (inclusive).
    #[inline]
    pub fn contains(&self, point: Point3) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
            && point.z >= self.min.z
            && point.z <= self.max.z
    }
}

impl Default for Bounds3 {
    fn default() -> Self {
        Self::empty()
    }
}
