//! Core geometric types shared across the crate.
//!
//! - [`Point3`]: 3D point in map space
//! - [`PointCloud3`]: SoA point cloud
//! - [`Bounds3`]: axis-aligned bounding box

pub mod bounds;
pub mod cloud;
pub mod point;

pub use bounds::Bounds3;
pub use cloud::PointCloud3;
pub use point::Point3;
