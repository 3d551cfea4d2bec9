//! Point cloud storage with SoA (Struct of Arrays) layout.
//!
//! Coordinates live in three parallel `Vec<f32>` arrays. Sequential passes
//! (voxel binning, filtering, concatenation) stay cache-friendly, and the
//! layout matches how tile payloads arrive from the map service.

use super::point::Point3;

/// 3D point cloud with SoA layout.
#[derive(Clone, Debug, Default)]
pub struct PointCloud3 {
    /// X coordinates in meters.
    pub xs: Vec<f32>,
    /// Y coordinates in meters.
    pub ys: Vec<f32>,
    /// Z coordinates in meters.
    pub zs: Vec<f32>,
}

impl PointCloud3 {
    /// Create a new empty point cloud.
    pub fn new() -> Self {
        Self {
            xs: Vec::new(),
            ys: Vec::new(),
            zs: Vec::new(),
        }
    }

    /// Create a point cloud with capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            xs: Vec::with_capacity(capacity),
            ys: Vec::with_capacity(capacity),
            zs: Vec::with_capacity(capacity),
        }
    }

    /// Create from a slice of points.
    pub fn from_points(points: &[Point3]) -> Self {
        let mut cloud = Self::with_capacity(points.len());
        for p in points {
            cloud.push_point(*p);
        }
        cloud
    }

    /// Add a point to the cloud.
    #[inline]
    pub fn push(&mut self, x: f32, y: f32, z: f32) {
        self.xs.push(x);
        self.ys.push(y);
        self.zs.push(z);
    }

    /// Add a [`Point3`] to the cloud.
    #[inline]
    pub fn push_point(&mut self, point: Point3) {
        self.push(point.x, point.y, point.z);
    }

    /// Number of points in the cloud.
    #[inline]
    pub fn len(&self) -> usize {
        self.xs.len()
    }

    /// Check if the cloud is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.xs.is_empty()
    }

    /// Get a point by index.
    #[inline]
    pub fn get(&self, index: usize) -> Option<Point3> {
        if index < self.len() {
            Some(Point3::new(self.xs[index], self.ys[index], self.zs[index]))
        } else {
            None
        }
    }

    /// Append all points of another cloud.
    pub fn extend_from(&mut self, other: &PointCloud3) {
        self.xs.extend_from_slice(&other.xs);
        self.ys.extend_from_slice(&other.ys);
        self.zs.extend_from_slice(&other.zs);
    }

    /// Iterate over the points.
    pub fn iter(&self) -> impl Iterator<Item = Point3> + '_ {
        self.xs
            .iter()
            .zip(self.ys.iter())
            .zip(self.zs.iter())
            .map(|((&x, &y), &z)| Point3::new(x, y, z))
    }
}
