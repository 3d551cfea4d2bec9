//! Streaming map backend: tiles fetched around the agent on demand.
//!
//! All mutable state (agent position, tile lattice, tile cache, service
//! health) lives behind one mutex with short critical sections. A query
//! takes the lock only to snapshot the lattice and clone tile handles; the
//! voxel-stencil math runs on those handles with the lock released. The
//! sub-checks of one query therefore may observe different cache states —
//! a concurrent insertion or eviction between sub-checks shows up as a
//! conservative "not close", never as a torn read. Map updates arrive on
//! the order of seconds while queries arrive at sensor rate, so this trade
//! is deliberate.
//!
//! ```text
//!   localization ─▶ update_position ─┐
//!                                    ├─▶ Mutex<StreamState> ◀─ queries
//!   updater tick ─▶ refresh ─▶ fetch ┘        (tile cache)
//!                      │
//!                      └─ displacement gate: only when the agent moved
//!                         far enough since the last issued request
//! ```

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::ProximityMap;
use crate::config::MapLoaderConfig;
use crate::core::{Bounds3, Point3, PointCloud3};
use crate::diagnostics::{
    CloudSink, DiagnosticLevel, DiagnosticStatus, DiagnosticsSink, StatusBoard,
};
use crate::map::tiles::{Tile, TileGeometry, TileTable};
use crate::query::is_close_to_neighbor_voxels;
use crate::service::{ServiceHealth, TileDelta, TileQuery, TileService};
use crate::voxel::{VoxelGrid, check_feasibility};

/// Mutable state of the streaming backend, guarded by one lock.
struct StreamState {
    /// Latest agent position from localization.
    position: Option<Point3>,
    /// Position at which the last differential request was issued.
    last_fetch_position: Option<Point3>,
    /// Tile lattice; set by the first usable response, immutable after.
    geometry: Option<TileGeometry>,
    /// Tile cache.
    table: TileTable,
    /// Consecutive failed fetches since the last success.
    consecutive_failures: u32,
}

/// Dynamic (tile-streamed) proximity backend.
pub struct StreamingMap {
    leaf_size: f64,
    downsize_ratio_z: f64,
    publish_debug: bool,
    radius: f64,
    update_distance: f64,
    max_tile_size: f64,
    tick_interval: Duration,
    service: Arc<dyn TileService>,
    state: Mutex<StreamState>,
    board: StatusBoard,
    debug_sink: Option<Arc<dyn CloudSink>>,
}

impl StreamingMap {
    /// Create a backend that fetches tiles through `service`.
    ///
    /// Queries answer false until the first response is applied.
    pub fn new(config: &MapLoaderConfig, service: Arc<dyn TileService>) -> Self {
        let board = StatusBoard::new();
        board.set(DiagnosticLevel::Ok, "Map loader initialized");
        Self {
            leaf_size: config.distance_threshold,
            downsize_ratio_z: config.downsize_ratio_z_axis,
            publish_debug: config.publish_debug_map,
            radius: config.streaming.map_loader_radius,
            update_distance: config.streaming.map_update_distance_threshold,
            max_tile_size: config.streaming.max_map_grid_size,
            tick_interval: config.streaming.tick_interval(),
            service,
            state: Mutex::new(StreamState {
                position: None,
                last_fetch_position: None,
                geometry: None,
                table: TileTable::default(),
                consecutive_failures: 0,
            }),
            board,
            debug_sink: None,
        }
    }

    /// Attach a sink for debug republish of the concatenated tile cache.
    pub fn with_debug_sink(mut self, sink: Arc<dyn CloudSink>) -> Self {
        self.debug_sink = Some(sink);
        self
    }

    /// Route diagnostic updates to `sink`.
    pub fn with_diagnostics_sink(mut self, sink: Arc<dyn DiagnosticsSink>) -> Self {
        self.board = StatusBoard::with_sink(sink);
        self.board.set(DiagnosticLevel::Ok, "Map loader initialized");
        self
    }

    /// Record the latest agent position. Called from localization at high
    /// rate; only stores the value.
    pub fn update_position(&self, position: Point3) {
        self.state.lock().position = Some(position);
    }

    /// Latest recorded agent position.
    pub fn position(&self) -> Option<Point3> {
        self.state.lock().position
    }

    /// Run one update cycle: decide whether the agent has moved far enough,
    /// and if so fetch and apply a differential.
    ///
    /// The reference position advances when the request is issued, not when
    /// it completes, and rolls back on a failed fetch so the next cycle
    /// retries. [`MapUpdater`](crate::map::MapUpdater) calls this on a
    /// timer; tests and manual integrations call it directly.
    pub fn refresh(&self) {
        let (center, cached_ids, previous) = {
            let mut state = self.state.lock();
            let Some(position) = state.position else {
                return;
            };
            let moved_enough = match state.last_fetch_position {
                None => true,
                Some(last) => position.distance_xy(last) > self.update_distance,
            };
            if !moved_enough {
                return;
            }
            let previous = state.last_fetch_position;
            state.last_fetch_position = Some(position);
            (position, state.table.cached_ids(), previous)
        };

        let query = TileQuery {
            center,
            radius: self.radius,
            cached_ids,
        };
        log::debug!(
            "Requesting differential map update around ({:.1}, {:.1}), radius {:.0} m",
            center.x,
            center.y,
            self.radius
        );

        match self.service.fetch_differential(&query) {
            Ok(delta) => {
                self.state.lock().consecutive_failures = 0;
                self.apply_delta(&delta);
            }
            Err(e) => {
                log::warn!("Differential map update failed: {}", e);
                let mut state = self.state.lock();
                state.last_fetch_position = previous;
                state.consecutive_failures += 1;
            }
        }
    }

    /// Apply a differential response to the tile cache.
    ///
    /// An empty delta is a complete no-op (no lattice establishment, no
    /// debug republish). Voxel grids for added tiles are built before
    /// taking the lock; insertions, evictions, and (on the first usable
    /// response) lattice establishment happen under it.
    pub fn apply_delta(&self, delta: &TileDelta) {
        if delta.is_empty() {
            return;
        }

        let leaf_z = self.leaf_size * self.downsize_ratio_z;
        let mut prepared = Vec::with_capacity(delta.added.len());
        for upload in &delta.added {
            let bounds = Bounds3::from_cloud(&upload.cloud);
            check_feasibility(&bounds, self.leaf_size, self.leaf_size, leaf_z, &self.board);
            let grid = VoxelGrid::build(&upload.cloud, self.leaf_size, self.leaf_size, leaf_z);
            prepared.push((upload.id.clone(), upload.bounds, grid));
        }

        {
            let mut state = self.state.lock();
            if state.geometry.is_none() && !delta.added.is_empty() {
                if let Some(geometry) =
                    TileGeometry::from_uploads(&delta.added, self.max_tile_size)
                {
                    log::info!(
                        "Tile lattice established: {}x{} tiles of {:.1}x{:.1} m at ({:.1}, {:.1})",
                        geometry.width,
                        geometry.height,
                        geometry.size_x,
                        geometry.size_y,
                        geometry.origin_x,
                        geometry.origin_y
                    );
                    state.table = TileTable::new(geometry.tile_count());
                    state.geometry = Some(geometry);
                }
            }

            match state.geometry {
                Some(geometry) => {
                    for (id, bounds, grid) in prepared {
                        let (cx, cy) = bounds.center();
                        match geometry.tile_index(cx, cy) {
                            Some(index) => {
                                state.table.insert(index, Arc::new(Tile { id, grid }));
                            }
                            None => {
                                log::warn!("Dropping tile {} outside the established lattice", id);
                            }
                        }
                    }
                }
                None => {
                    if !prepared.is_empty() {
                        log::warn!(
                            "Discarding {} tiles: no tile lattice established",
                            prepared.len()
                        );
                    }
                }
            }

            for id in &delta.removed {
                if state.table.remove_by_id(id) {
                    log::debug!("Evicted tile {}", id);
                }
            }
        }

        if self.publish_debug
            && let Some(sink) = &self.debug_sink
        {
            sink.publish(&self.downsampled_cloud());
        }
    }

    /// Concatenation of all cached tiles' downsampled clouds.
    pub fn downsampled_cloud(&self) -> PointCloud3 {
        let tiles: Vec<Arc<Tile>> = {
            let state = self.state.lock();
            state.table.tiles().cloned().collect()
        };
        let total = tiles.iter().map(|t| t.grid.len()).sum();
        let mut cloud = PointCloud3::with_capacity(total);
        for tile in tiles {
            cloud.extend_from(tile.grid.points());
        }
        cloud
    }

    /// Number of cached tiles.
    pub fn tile_count(&self) -> usize {
        self.state.lock().table.tile_count()
    }

    /// Availability of the tile service as seen by the update cycle.
    pub fn service_health(&self) -> ServiceHealth {
        match self.state.lock().consecutive_failures {
            0 => ServiceHealth::Ready,
            n => ServiceHealth::Degraded {
                consecutive_failures: n,
            },
        }
    }

    /// Current diagnostic status.
    pub fn diagnostics(&self) -> DiagnosticStatus {
        self.board.get()
    }

    /// Interval between update cycles, from configuration.
    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }
}

impl ProximityMap for StreamingMap {
    fn is_close_to_map(&self, point: Point3, threshold: f64) -> bool {
        let threshold_z = threshold * self.downsize_ratio_z;

        // Snapshot the lattice and the home tile under the lock, then test
        // off-lock. The lattice is immutable once set, so using the
        // snapshot for the probe indices below stays consistent.
        let (geometry, home_index, home_tile) = {
            let state = self.state.lock();
            let Some(geometry) = state.geometry else {
                return false;
            };
            if state.table.is_empty() {
                return false;
            }
            let home_index = geometry.tile_index(f64::from(point.x), f64::from(point.y));
            let home_tile = home_index.and_then(|index| state.table.get(index));
            (geometry, home_index, home_tile)
        };

        if let Some(tile) = home_tile
            && is_close_to_neighbor_voxels(point, threshold, threshold_z, &tile.grid)
        {
            return true;
        }

        // Probe the four axis-adjacent tiles the threshold can reach.
        // Diagonal tiles are intentionally not probed.
        let d = threshold as f32;
        let probes = [
            Point3::new(point.x - d, point.y, point.z),
            Point3::new(point.x + d, point.y, point.z),
            Point3::new(point.x, point.y - d, point.z),
            Point3::new(point.x, point.y + d, point.z),
        ];
        for probe in probes {
            let Some(index) = geometry.tile_index(f64::from(probe.x), f64::from(probe.y)) else {
                continue;
            };
            if Some(index) == home_index {
                continue;
            }
            let tile = {
                let state = self.state.lock();
                state.table.get(index)
            };
            if let Some(tile) = tile
                && is_close_to_neighbor_voxels(point, threshold, threshold_z, &tile.grid)
            {
                return true;
            }
        }
        false
    }

    fn is_initialized(&self) -> bool {
        let state = self.state.lock();
        state.geometry.is_some() && !state.table.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::{ServiceError, TileBounds, TileUpload};

    /// Service double that hands out scripted deltas and records queries.
    struct ScriptedService {
        deltas: Mutex<Vec<Result<TileDelta, ServiceError>>>,
        queries: Mutex<Vec<TileQuery>>,
    }

    impl ScriptedService {
        fn new(deltas: Vec<Result<TileDelta, ServiceError>>) -> Self {
            Self {
                deltas: Mutex::new(deltas),
                queries: Mutex::new(Vec::new()),
            }
        }

        fn query_count(&self) -> usize {
            self.queries.lock().len()
        }
    }

    impl TileService for ScriptedService {
        fn fetch_differential(&self, query: &TileQuery) -> Result<TileDelta, ServiceError> {
            self.queries.lock().push(query.clone());
            let mut deltas = self.deltas.lock();
            if deltas.is_empty() {
                Ok(TileDelta::default())
            } else {
                deltas.remove(0)
            }
        }
    }

    fn config() -> MapLoaderConfig {
        let mut cfg = MapLoaderConfig::default();
        cfg.distance_threshold = 1.0;
        cfg.downsize_ratio_z_axis = 1.0;
        cfg.streaming.map_update_distance_threshold = 10.0;
        cfg
    }

    fn upload(id: &str, min_x: f64, min_y: f64, size: f64, points: &[Point3]) -> TileUpload {
        TileUpload {
            id: id.to_string(),
            cloud: PointCloud3::from_points(points),
            bounds: TileBounds {
                min_x,
                min_y,
                max_x: min_x + size,
                max_y: min_y + size,
            },
        }
    }

    #[test]
    fn test_uninitialized_answers_false() {
        let service = Arc::new(ScriptedService::new(Vec::new()));
        let map = StreamingMap::new(&config(), service);

        assert!(!map.is_initialized());
        assert!(!map.is_close_to_map(Point3::ZERO, 100.0));
    }

    #[test]
    fn test_apply_delta_initializes_and_serves() {
        let service = Arc::new(ScriptedService::new(Vec::new()));
        let map = StreamingMap::new(&config(), service);

        map.apply_delta(&TileDelta {
            added: vec![upload(
                "t00",
                0.0,
                0.0,
                10.0,
                &[Point3::new(5.0, 5.0, 0.0)],
            )],
            removed: Vec::new(),
        });

        assert!(map.is_initialized());
        assert_eq!(map.tile_count(), 1);
        assert!(map.is_close_to_map(Point3::new(5.2, 5.2, 0.2), 0.5));
        assert!(!map.is_close_to_map(Point3::new(8.0, 8.0, 0.0), 0.5));
    }

    #[test]
    fn test_empty_delta_is_noop() {
        let service = Arc::new(ScriptedService::new(Vec::new()));
        let map = StreamingMap::new(&config(), service);

        map.apply_delta(&TileDelta::default());

        assert!(!map.is_initialized());
        assert_eq!(map.tile_count(), 0);
    }

    #[test]
    fn test_eviction_empties_region() {
        let service = Arc::new(ScriptedService::new(Vec::new()));
        let map = StreamingMap::new(&config(), service);

        map.apply_delta(&TileDelta {
            added: vec![
                upload("t00", 0.0, 0.0, 10.0, &[Point3::new(5.0, 5.0, 0.0)]),
                upload("t10", 10.0, 0.0, 10.0, &[Point3::new(15.0, 5.0, 0.0)]),
            ],
            removed: Vec::new(),
        });
        assert!(map.is_close_to_map(Point3::new(15.2, 5.0, 0.0), 0.5));

        map.apply_delta(&TileDelta {
            added: Vec::new(),
            removed: vec!["t10".to_string()],
        });

        assert!(!map.is_close_to_map(Point3::new(15.2, 5.0, 0.0), 0.5));
        assert!(map.is_close_to_map(Point3::new(5.2, 5.0, 0.0), 0.5));
        assert_eq!(map.tile_count(), 1);
    }

    #[test]
    fn test_refresh_gates_on_displacement() {
        let service = Arc::new(ScriptedService::new(Vec::new()));
        let map = StreamingMap::new(&config(), service.clone());

        // No position yet: no request.
        map.refresh();
        assert_eq!(service.query_count(), 0);

        // First position: always requests.
        map.update_position(Point3::new(0.0, 0.0, 0.0));
        map.refresh();
        assert_eq!(service.query_count(), 1);

        // Small move: gated.
        map.update_position(Point3::new(3.0, 0.0, 0.0));
        map.refresh();
        map.refresh();
        assert_eq!(service.query_count(), 1);

        // Past the threshold: exactly one more request, and the reference
        // position resets so the next tick is gated again.
        map.update_position(Point3::new(10.5, 0.0, 0.0));
        map.refresh();
        assert_eq!(service.query_count(), 2);
        map.refresh();
        assert_eq!(service.query_count(), 2);
    }

    #[test]
    fn test_refresh_advertises_cached_ids() {
        let first = TileDelta {
            added: vec![upload("t00", 0.0, 0.0, 10.0, &[Point3::new(5.0, 5.0, 0.0)])],
            removed: Vec::new(),
        };
        let service = Arc::new(ScriptedService::new(vec![Ok(first)]));
        let map = StreamingMap::new(&config(), service.clone());

        map.update_position(Point3::ZERO);
        map.refresh();
        map.update_position(Point3::new(20.0, 0.0, 0.0));
        map.refresh();

        let queries = service.queries.lock();
        assert_eq!(queries.len(), 2);
        assert!(queries[0].cached_ids.is_empty());
        assert_eq!(queries[1].cached_ids, vec!["t00".to_string()]);
    }

    #[test]
    fn test_failed_fetch_rolls_back_and_degrades() {
        let service = Arc::new(ScriptedService::new(vec![
            Err(ServiceError::Unavailable("down".to_string())),
            Ok(TileDelta::default()),
        ]));
        let map = StreamingMap::new(&config(), service.clone());

        map.update_position(Point3::ZERO);
        map.refresh();
        assert_eq!(service.query_count(), 1);
        assert_eq!(
            map.service_health(),
            ServiceHealth::Degraded {
                consecutive_failures: 1
            }
        );

        // The reference position rolled back, so the next cycle retries
        // without any further movement.
        map.refresh();
        assert_eq!(service.query_count(), 2);
        assert_eq!(map.service_health(), ServiceHealth::Ready);

        // And after the success the gate holds again.
        map.refresh();
        assert_eq!(service.query_count(), 2);
    }

    #[test]
    fn test_out_of_lattice_tile_dropped() {
        let service = Arc::new(ScriptedService::new(Vec::new()));
        let map = StreamingMap::new(&config(), service);

        map.apply_delta(&TileDelta {
            added: vec![upload("t00", 0.0, 0.0, 10.0, &[Point3::new(5.0, 5.0, 0.0)])],
            removed: Vec::new(),
        });
        // Far outside the 1x1 lattice established above.
        map.apply_delta(&TileDelta {
            added: vec![upload("far", 500.0, 500.0, 10.0, &[Point3::new(505.0, 505.0, 0.0)])],
            removed: Vec::new(),
        });

        assert_eq!(map.tile_count(), 1);
        assert!(!map.is_close_to_map(Point3::new(505.0, 505.0, 0.0), 1.0));
    }

    #[test]
    fn test_oversized_tiles_rejected() {
        let mut cfg = config();
        cfg.streaming.max_map_grid_size = 50.0;
        let service = Arc::new(ScriptedService::new(Vec::new()));
        let map = StreamingMap::new(&cfg, service);

        map.apply_delta(&TileDelta {
            added: vec![upload("huge", 0.0, 0.0, 200.0, &[Point3::new(5.0, 5.0, 0.0)])],
            removed: Vec::new(),
        });

        assert!(!map.is_initialized());
        assert_eq!(map.tile_count(), 0);
    }

    #[test]
    fn test_downsampled_cloud_concatenates_tiles() {
        let service = Arc::new(ScriptedService::new(Vec::new()));
        let map = StreamingMap::new(&config(), service);

        map.apply_delta(&TileDelta {
            added: vec![
                upload("t00", 0.0, 0.0, 10.0, &[Point3::new(5.0, 5.0, 0.0)]),
                upload(
                    "t10",
                    10.0,
                    0.0,
                    10.0,
                    &[Point3::new(15.0, 5.0, 0.0), Point3::new(15.1, 5.1, 0.1)],
                ),
            ],
            removed: Vec::new(),
        });

        // Both t10 points share one voxel at leaf 1.0.
        assert_eq!(map.downsampled_cloud().len(), 2);
    }
}
