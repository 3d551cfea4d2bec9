//! Differential tile protocol between the streaming backend and a remote
//! map server.
//!
//! The streaming backend periodically asks the server for the tiles around
//! the agent, advertising which tile ids it already caches. The server
//! answers with a differential: tiles to add (full payloads) and tile ids to
//! drop. An empty differential means the cache is already current.
//!
//! [`TileService`] is the seam: production wires a transport behind it,
//! tests plug in a scripted mock. Implementations must bound their wait —
//! the updater treats every error as a health event and retries on a later
//! tick, so a hung call would stall map freshness for the whole backend.

pub mod channel;

use std::time::Duration;

use crate::core::{Point3, PointCloud3};

pub use channel::{ChannelTileService, TileRequest};

/// Opaque tile identifier assigned by the map server.
pub type TileId = String;

/// Horizontal extent of one tile, as served by the map server.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TileBounds {
    /// Smallest x coordinate covered by the tile.
    pub min_x: f64,
    /// Smallest y coordinate covered by the tile.
    pub min_y: f64,
    /// Largest x coordinate covered by the tile.
    pub max_x: f64,
    /// Largest y coordinate covered by the tile.
    pub max_y: f64,
}

impl TileBounds {
    /// Tile width (x extent).
    #[inline]
    pub fn size_x(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Tile depth (y extent).
    #[inline]
    pub fn size_y(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Center of the tile in the x/y plane.
    #[inline]
    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_x + self.max_x) * 0.5,
            (self.min_y + self.max_y) * 0.5,
        )
    }
}

/// A differential request: the area of interest plus the cache inventory.
#[derive(Clone, Debug)]
pub struct TileQuery {
    /// Agent position the request is centered on.
    pub center: Point3,
    /// Radius of interest in meters.
    pub radius: f64,
    /// Tile ids the requester already holds.
    pub cached_ids: Vec<TileId>,
}

/// One tile payload in a differential response.
#[derive(Clone, Debug)]
pub struct TileUpload {
    /// Server-assigned tile id.
    pub id: TileId,
    /// Raw map points of the tile.
    pub cloud: PointCloud3,
    /// Horizontal extent of the tile.
    pub bounds: TileBounds,
}

/// A differential response.
#[derive(Clone, Debug, Default)]
pub struct TileDelta {
    /// Tiles to insert into the cache.
    pub added: Vec<TileUpload>,
    /// Tile ids to evict from the cache.
    pub removed: Vec<TileId>,
}

impl TileDelta {
    /// True when the delta carries no additions and no removals.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Failure modes of a differential fetch.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// No response arrived within the deadline.
    #[error("tile service did not respond within {0:?}")]
    Timeout(Duration),
    /// The service cannot be reached at all.
    #[error("tile service unavailable: {0}")]
    Unavailable(String),
    /// The fetch was cancelled (shutdown).
    #[error("tile request cancelled")]
    Cancelled,
}

/// Availability of the tile service as observed by the updater.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ServiceHealth {
    /// Last fetch succeeded (or none attempted yet).
    #[default]
    Ready,
    /// One or more fetches in a row have failed.
    Degraded {
        /// Number of consecutive failed fetches.
        consecutive_failures: u32,
    },
}

/// Source of differential tile updates.
pub trait TileService: Send + Sync {
    /// Fetch the differential for `query`. Must return within a bounded
    /// time; blocking indefinitely is a contract violation.
    fn fetch_differential(&self, query: &TileQuery) -> Result<TileDelta, ServiceError>;
}
