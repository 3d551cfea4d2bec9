//! Tile bookkeeping for the streaming backend.
//!
//! [`TileGeometry`] fixes the tile lattice (origin, tile size, extent in
//! tiles) from the first usable server response; it never changes after
//! that. [`TileTable`] is the cache: a dense slot array indexed by the
//! lattice, plus an id dictionary so server-side evictions (which speak in
//! tile ids) find their slot.

use std::collections::HashMap;
use std::sync::Arc;

use crate::service::{TileId, TileUpload};
use crate::voxel::VoxelGrid;

/// One cached map tile. Immutable once inserted into the table; concurrent
/// readers hold it through an `Arc` while the table moves on.
#[derive(Debug)]
pub struct Tile {
    /// Server-assigned id.
    pub id: TileId,
    /// Voxel grid over the tile's points (the downsampled cloud lives in
    /// the grid as its centroids).
    pub grid: VoxelGrid,
}

/// The tile lattice: where tile (0, 0) sits and how big tiles are.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TileGeometry {
    /// X of the lattice origin (min corner of tile (0, 0)).
    pub origin_x: f64,
    /// Y of the lattice origin.
    pub origin_y: f64,
    /// Tile width in meters.
    pub size_x: f64,
    /// Tile depth in meters.
    pub size_y: f64,
    /// Tiles per row.
    pub width: usize,
    /// Number of rows.
    pub height: usize,
}

impl TileGeometry {
    /// Establish a lattice covering the tiles of a first response.
    ///
    /// Tile size comes from the first upload's bounds; the origin is the
    /// min corner over all uploads and the extent covers their max corner.
    /// Returns `None` (with an error log) for an empty upload set, a
    /// degenerate tile size, or a tile size above `max_tile_size`.
    pub fn from_uploads(uploads: &[TileUpload], max_tile_size: f64) -> Option<Self> {
        let first = uploads.first()?;
        let size_x = first.bounds.size_x();
        let size_y = first.bounds.size_y();
        if size_x <= 0.0 || size_y <= 0.0 {
            log::error!(
                "Tile {} has degenerate bounds ({:.3} x {:.3} m), cannot establish geometry",
                first.id,
                size_x,
                size_y
            );
            return None;
        }
        if size_x > max_tile_size || size_y > max_tile_size {
            log::error!(
                "Tile size {:.1} x {:.1} m exceeds the configured maximum of {:.1} m",
                size_x,
                size_y,
                max_tile_size
            );
            return None;
        }

        let mut origin_x = f64::INFINITY;
        let mut origin_y = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut max_y = f64::NEG_INFINITY;
        for upload in uploads {
            origin_x = origin_x.min(upload.bounds.min_x);
            origin_y = origin_y.min(upload.bounds.min_y);
            max_x = max_x.max(upload.bounds.max_x);
            max_y = max_y.max(upload.bounds.max_y);
        }

        let width = (((max_x - origin_x) / size_x).ceil() as usize).max(1);
        let height = (((max_y - origin_y) / size_y).ceil() as usize).max(1);

        Some(Self {
            origin_x,
            origin_y,
            size_x,
            size_y,
            width,
            height,
        })
    }

    /// Flat tile index for a world position, or `None` outside the lattice.
    ///
    /// `index = col + width * row` with `col = floor((x - origin_x) / size_x)`
    /// and `row = floor((y - origin_y) / size_y)`.
    pub fn tile_index(&self, x: f64, y: f64) -> Option<usize> {
        let col = ((x - self.origin_x) / self.size_x).floor() as i64;
        let row = ((y - self.origin_y) / self.size_y).floor() as i64;
        if col < 0 || row < 0 || col >= self.width as i64 || row >= self.height as i64 {
            return None;
        }
        Some(col as usize + row as usize * self.width)
    }

    /// Total number of slots in the lattice.
    pub fn tile_count(&self) -> usize {
        self.width * self.height
    }
}

/// Dense tile cache with id lookup.
#[derive(Debug, Default)]
pub struct TileTable {
    slots: Vec<Option<Arc<Tile>>>,
    index_by_id: HashMap<TileId, usize>,
}

impl TileTable {
    /// Create a table with `capacity` empty slots.
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity],
            index_by_id: HashMap::new(),
        }
    }

    /// Insert a tile at a slot, replacing whatever was there.
    ///
    /// Keeps the id dictionary consistent when a slot is reused by a new id
    /// or an id moves to a new slot. Returns false for an out-of-range index.
    pub fn insert(&mut self, index: usize, tile: Arc<Tile>) -> bool {
        if index >= self.slots.len() {
            return false;
        }
        if let Some(old) = self.slots[index].take()
            && old.id != tile.id
        {
            self.index_by_id.remove(&old.id);
        }
        if let Some(previous) = self.index_by_id.insert(tile.id.clone(), index)
            && previous != index
        {
            self.slots[previous] = None;
        }
        self.slots[index] = Some(tile);
        true
    }

    /// Evict a tile by id. Returns whether it was cached.
    pub fn remove_by_id(&mut self, id: &str) -> bool {
        match self.index_by_id.remove(id) {
            Some(index) => {
                self.slots[index] = None;
                true
            }
            None => false,
        }
    }

    /// Clone out the tile handle at a slot, if present and in range.
    pub fn get(&self, index: usize) -> Option<Arc<Tile>> {
        self.slots.get(index).and_then(|slot| slot.clone())
    }

    /// Ids of all cached tiles.
    pub fn cached_ids(&self) -> Vec<TileId> {
        self.index_by_id.keys().cloned().collect()
    }

    /// Number of cached tiles.
    pub fn tile_count(&self) -> usize {
        self.index_by_id.len()
    }

    /// Whether the cache holds no tiles.
    pub fn is_empty(&self) -> bool {
        self.index_by_id.is_empty()
    }

    /// Iterate over cached tiles in slot order.
    pub fn tiles(&self) -> impl Iterator<Item = &Arc<Tile>> {
        self.slots.iter().filter_map(|slot| slot.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PointCloud3;
    use crate::service::TileBounds;

    fn upload(id: &str, min_x: f64, min_y: f64, size: f64) -> TileUpload {
        TileUpload {
            id: id.to_string(),
            cloud: PointCloud3::new(),
            bounds: TileBounds {
                min_x,
                min_y,
                max_x: min_x + size,
                max_y: min_y + size,
            },
        }
    }

    fn tile(id: &str) -> Arc<Tile> {
        Arc::new(Tile {
            id: id.to_string(),
            grid: VoxelGrid::build(&PointCloud3::new(), 1.0, 1.0, 1.0),
        })
    }

    #[test]
    fn test_geometry_from_single_upload() {
        let geometry = TileGeometry::from_uploads(&[upload("a", 10.0, 20.0, 10.0)], 100.0)
            .expect("geometry");

        assert_eq!(geometry.origin_x, 10.0);
        assert_eq!(geometry.origin_y, 20.0);
        assert_eq!(geometry.size_x, 10.0);
        assert_eq!((geometry.width, geometry.height), (1, 1));
        assert_eq!(geometry.tile_count(), 1);
    }

    #[test]
    fn test_geometry_spans_all_uploads() {
        let uploads = [
            upload("a", 0.0, 0.0, 10.0),
            upload("b", 20.0, 10.0, 10.0),
        ];
        let geometry = TileGeometry::from_uploads(&uploads, 100.0).expect("geometry");

        assert_eq!((geometry.origin_x, geometry.origin_y), (0.0, 0.0));
        // Extent (30, 20) at tile size 10 -> 3 x 2 lattice.
        assert_eq!((geometry.width, geometry.height), (3, 2));
    }

    #[test]
    fn test_geometry_rejects_oversized_tiles() {
        assert!(TileGeometry::from_uploads(&[upload("a", 0.0, 0.0, 200.0)], 100.0).is_none());
    }

    #[test]
    fn test_geometry_rejects_degenerate_tiles() {
        let mut degenerate = upload("a", 0.0, 0.0, 10.0);
        degenerate.bounds.max_x = 0.0;
        assert!(TileGeometry::from_uploads(&[degenerate], 100.0).is_none());
        assert!(TileGeometry::from_uploads(&[], 100.0).is_none());
    }

    #[test]
    fn test_tile_index_formula() {
        let geometry = TileGeometry {
            origin_x: 0.0,
            origin_y: 0.0,
            size_x: 10.0,
            size_y: 10.0,
            width: 3,
            height: 2,
        };

        assert_eq!(geometry.tile_index(5.0, 5.0), Some(0));
        assert_eq!(geometry.tile_index(25.0, 5.0), Some(2));
        assert_eq!(geometry.tile_index(5.0, 15.0), Some(3));
        assert_eq!(geometry.tile_index(29.9, 19.9), Some(5));
        // Outside the lattice in any direction.
        assert_eq!(geometry.tile_index(-0.1, 5.0), None);
        assert_eq!(geometry.tile_index(5.0, -0.1), None);
        assert_eq!(geometry.tile_index(30.1, 5.0), None);
        assert_eq!(geometry.tile_index(5.0, 20.1), None);
    }

    #[test]
    fn test_tile_index_with_offset_origin() {
        let geometry = TileGeometry {
            origin_x: -15.0,
            origin_y: 5.0,
            size_x: 10.0,
            size_y: 10.0,
            width: 2,
            height: 2,
        };

        assert_eq!(geometry.tile_index(-10.0, 10.0), Some(0));
        assert_eq!(geometry.tile_index(-1.0, 16.0), Some(3));
    }

    #[test]
    fn test_table_insert_and_get() {
        let mut table = TileTable::new(4);
        assert!(table.is_empty());

        assert!(table.insert(2, tile("a")));
        assert_eq!(table.tile_count(), 1);
        assert!(table.get(2).is_some());
        assert!(table.get(0).is_none());
        assert!(table.get(99).is_none());
        assert!(!table.insert(4, tile("b")));
    }

    #[test]
    fn test_table_remove_by_id() {
        let mut table = TileTable::new(4);
        table.insert(1, tile("a"));

        assert!(table.remove_by_id("a"));
        assert!(table.get(1).is_none());
        assert!(table.is_empty());
        assert!(!table.remove_by_id("a"));
        assert!(!table.remove_by_id("never-cached"));
    }

    #[test]
    fn test_table_slot_reuse_updates_dictionary() {
        let mut table = TileTable::new(4);
        table.insert(1, tile("a"));
        table.insert(1, tile("b"));

        assert_eq!(table.tile_count(), 1);
        assert!(!table.remove_by_id("a"));
        assert!(table.remove_by_id("b"));
    }

    #[test]
    fn test_table_id_moving_slots_clears_old_slot() {
        let mut table = TileTable::new(4);
        table.insert(1, tile("a"));
        table.insert(3, tile("a"));

        assert_eq!(table.tile_count(), 1);
        assert!(table.get(1).is_none());
        assert!(table.get(3).is_some());
    }

    #[test]
    fn test_cached_ids() {
        let mut table = TileTable::new(4);
        table.insert(0, tile("a"));
        table.insert(2, tile("b"));

        let mut ids = table.cached_ids();
        ids.sort();
        assert_eq!(ids, vec!["a".to_string(), "b".to_string()]);
    }
}
