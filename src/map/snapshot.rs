//! Static map backend: the whole reference map as one immutable snapshot.
//!
//! A rebuild runs the feasibility guard, voxelizes the incoming cloud off
//! any lock, then swaps the new snapshot in under a brief write lock and
//! raises the initialized flag with release ordering. Queries gate on the
//! flag with acquire ordering, clone the snapshot handle under a brief read
//! lock, and run the stencil test without holding anything — a concurrent
//! rebuild never blocks queries, and in-flight queries finish against the
//! snapshot they started with.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;

use crate::ProximityMap;
use crate::config::MapLoaderConfig;
use crate::core::{Bounds3, Point3, PointCloud3};
use crate::diagnostics::{
    CloudSink, DiagnosticLevel, DiagnosticStatus, DiagnosticsSink, StatusBoard,
};
use crate::query::is_close_to_neighbor_voxels;
use crate::voxel::{VoxelGrid, check_feasibility};

/// One published version of the map. Never mutated after publication.
#[derive(Debug)]
pub struct MapSnapshot {
    /// Coordinate frame the map was delivered in.
    pub frame_id: String,
    /// Voxel grid over the full map.
    pub grid: VoxelGrid,
}

/// Static (whole-map) proximity backend.
pub struct SnapshotMap {
    leaf_size: f64,
    downsize_ratio_z: f64,
    publish_debug: bool,
    snapshot: RwLock<Option<Arc<MapSnapshot>>>,
    initialized: AtomicBool,
    board: StatusBoard,
    debug_sink: Option<Arc<dyn CloudSink>>,
}

impl SnapshotMap {
    /// Create an uninitialized backend. Queries answer false until the
    /// first [`rebuild`](Self::rebuild).
    pub fn new(config: &MapLoaderConfig) -> Self {
        let board = StatusBoard::new();
        board.set(DiagnosticLevel::Ok, "Map loader initialized");
        Self {
            leaf_size: config.distance_threshold,
            downsize_ratio_z: config.downsize_ratio_z_axis,
            publish_debug: config.publish_debug_map,
            snapshot: RwLock::new(None),
            initialized: AtomicBool::new(false),
            board,
            debug_sink: None,
        }
    }

    /// Attach a sink for debug republish of the downsampled map.
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

    /// Replace the map with a new snapshot built from `cloud`.
    ///
    /// The feasibility verdict is advisory; the build proceeds either way.
    pub fn rebuild(&self, cloud: &PointCloud3, frame_id: &str) {
        log::info!(
            "Rebuilding map snapshot from {} points (frame '{}')",
            cloud.len(),
            frame_id
        );

        let leaf_z = self.leaf_size * self.downsize_ratio_z;
        let bounds = Bounds3::from_cloud(cloud);
        check_feasibility(&bounds, self.leaf_size, self.leaf_size, leaf_z, &self.board);

        let grid = VoxelGrid::build(cloud, self.leaf_size, self.leaf_size, leaf_z);
        let snapshot = Arc::new(MapSnapshot {
            frame_id: frame_id.to_string(),
            grid,
        });

        *self.snapshot.write() = Some(snapshot.clone());
        self.initialized.store(true, Ordering::Release);

        log::info!(
            "Map snapshot published: {} voxels at leaf {:.2} m",
            snapshot.grid.len(),
            self.leaf_size
        );

        if self.publish_debug
            && let Some(sink) = &self.debug_sink
        {
            sink.publish(snapshot.grid.points());
        }
    }

    /// Frame id of the current snapshot, if one is published.
    pub fn frame_id(&self) -> Option<String> {
        self.snapshot.read().as_ref().map(|s| s.frame_id.clone())
    }

    /// The downsampled map (voxel centroids) of the current snapshot.
    /// Empty before the first rebuild.
    pub fn downsampled_cloud(&self) -> PointCloud3 {
        match self.current() {
            Some(snapshot) => snapshot.grid.points().clone(),
            None => PointCloud3::new(),
        }
    }

    /// Current diagnostic status.
    pub fn diagnostics(&self) -> DiagnosticStatus {
        self.board.get()
    }

    fn current(&self) -> Option<Arc<MapSnapshot>> {
        self.snapshot.read().clone()
    }
}

impl ProximityMap for SnapshotMap {
    fn is_close_to_map(&self, point: Point3, threshold: f64) -> bool {
        if !self.initialized.load(Ordering::Acquire) {
            return false;
        }
        let Some(snapshot) = self.current() else {
            return false;
        };
        is_close_to_neighbor_voxels(
            point,
            threshold,
            threshold * self.downsize_ratio_z,
            &snapshot.grid,
        )
    }

    fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }
}
