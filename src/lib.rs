//! # Samipa-Map: Voxel Proximity Queries Against Reference Point-Cloud Maps
//!
//! A library for answering "is this point close to the reference map?" at
//! sensor rate, built for obstacle validation on autonomous platforms: a
//! detected obstacle that coincides with the prior map is infrastructure,
//! one that does not is worth reacting to.
//!
//! ## Features
//!
//! - **Voxel-Grid Downsampling**: The reference cloud collapses to one
//!   centroid per voxel, with the leaf size tied to the query threshold
//! - **Stencil Queries**: A close-point test is 27 hash lookups, no search
//!   structure required; distances are always measured from the original
//!   query point
//! - **Two Backends**: [`SnapshotMap`] holds one immutable downsampled map,
//!   [`StreamingMap`] keeps a sliding window of tiles fetched around the
//!   agent as it moves
//! - **Fail-Open Semantics**: An uninitialized or empty map answers "not
//!   close", so perception degrades to caution rather than blocking
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use samipa_map::{MapLoaderConfig, ProximityMap, SnapshotMap};
//! use samipa_map::core::{Point3, PointCloud3};
//!
//! let config = MapLoaderConfig::default();
//! let map = SnapshotMap::new(&config);
//! map.rebuild(
//!     &PointCloud3::from_points(&[Point3::new(1.0, 2.0, 0.0)]),
//!     "map",
//! );
//!
//! if map.is_close_to_map(Point3::new(1.2, 2.1, 0.0), config.distance_threshold) {
//!     println!("point matches the reference map");
//! }
//! ```
//!
//! ## Coordinate Frame
//!
//! Coordinates are metric, x/y spanning the ground plane and z up. The
//! query threshold applies to x and y as given; the vertical reach is
//! scaled by the configured z-axis ratio, matching the flattened vertical
//! leaf of the voxel grid.
//!
//! ## Data Flow
//!
//! ```text
//!   ┌──────────────┐                     ┌──────────────────┐
//!   │  map source  │                     │   tile service   │
//!   │ (full cloud) │                     │  (differential)  │
//!   └──────┬───────┘                     └────────┬─────────┘
//!          │ rebuild()                            │ fetch_differential()
//!          ▼                                      ▼
//!   ┌──────────────┐                     ┌──────────────────┐
//!   │ SnapshotMap  │                     │   StreamingMap   │◄── MapUpdater
//!   │ (one voxel   │                     │ (tile lattice +  │    (timer +
//!   │    grid)     │                     │  cached grids)   │     gate)
//!   └──────┬───────┘                     └────────┬─────────┘
//!          │                                      │
//!          └──────────────┬───────────────────────┘
//!                         │ is_close_to_map(point, threshold)
//!                         ▼
//!                ┌─────────────────┐
//!                │  voxel stencil  │──► bool (strict per-axis distance
//!                │  (27 lookups)   │     from the original point)
//!                └─────────────────┘
//! ```
//!
//! One lookup into the home voxel plus its 26 neighbors covers every
//! centroid the threshold can reach, because the leaf size equals the
//! threshold. The streaming backend additionally probes up to four
//! axis-adjacent tiles when the query sits near a tile border.

pub mod config;
pub mod core;
pub mod diagnostics;
pub mod map;
pub mod query;
pub mod service;
pub mod voxel;

use crate::core::Point3;

/// Common query surface of the map backends.
///
/// Implementations are safe to share across threads; queries never block
/// on map updates beyond brief internal locking.
pub trait ProximityMap: Send + Sync {
    /// Whether `point` lies within `threshold` of some reference map point
    /// (vertical reach scaled by the configured z ratio).
    ///
    /// Answers false when the map is not initialized yet.
    fn is_close_to_map(&self, point: Point3, threshold: f64) -> bool;

    /// Whether the backend holds usable map data.
    fn is_initialized(&self) -> bool;
}

// Re-export main types at crate root
pub use config::{ConfigError, MapLoaderConfig, StreamingConfig};
pub use diagnostics::{DiagnosticLevel, DiagnosticStatus};
pub use map::{MapUpdater, SnapshotMap, StreamingMap};
pub use query::DistanceFilter;
pub use service::{
    ChannelTileService, ServiceError, ServiceHealth, TileDelta, TileQuery, TileService, TileUpload,
};
