//! Test utilities for map loader evaluation.
//!
//! Helpers for building synthetic reference clouds, tile uploads, and a
//! scripted tile service double.

#![allow(dead_code)]

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use samipa_map::core::{Point3, PointCloud3};
use samipa_map::{ServiceError, TileDelta, TileQuery, TileService, TileUpload};
use samipa_map::service::TileBounds;

/// Route crate logs to the test harness when `RUST_LOG` is set.
pub fn init_logging() {
    env_logger::try_init().ok();
}

/// A flat square of map points at height `z`, sampled on a `spacing` lattice
/// starting at `(min_x, min_y)`.
pub fn flat_square_cloud(min_x: f32, min_y: f32, size: f32, spacing: f32, z: f32) -> PointCloud3 {
    let steps = (size / spacing) as usize;
    let mut cloud = PointCloud3::with_capacity(steps * steps);
    for i in 0..steps {
        for j in 0..steps {
            cloud.push(min_x + i as f32 * spacing, min_y + j as f32 * spacing, z);
        }
    }
    cloud
}

/// Uniformly scattered points in `[-extent, extent]` on all three axes,
/// deterministic for a given seed.
pub fn scatter_cloud(n: usize, extent: f32, seed: u64) -> PointCloud3 {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut cloud = PointCloud3::with_capacity(n);
    for _ in 0..n {
        cloud.push(
            rng.gen_range(-extent..extent),
            rng.gen_range(-extent..extent),
            rng.gen_range(-extent..extent),
        );
    }
    cloud
}

/// A tile upload covering the square `(min_x, min_y)` to
/// `(min_x + size, min_y + size)`.
pub fn square_upload(id: &str, min_x: f64, min_y: f64, size: f64, cloud: PointCloud3) -> TileUpload {
    TileUpload {
        id: id.to_string(),
        cloud,
        bounds: TileBounds {
            min_x,
            min_y,
            max_x: min_x + size,
            max_y: min_y + size,
        },
    }
}

/// Convenience: one upload holding the listed points.
pub fn point_upload(id: &str, min_x: f64, min_y: f64, size: f64, points: &[Point3]) -> TileUpload {
    square_upload(id, min_x, min_y, size, PointCloud3::from_points(points))
}

/// Tile service double handing out a scripted sequence of responses and
/// recording every query it receives.
pub struct MockTileService {
    responses: Mutex<Vec<Result<TileDelta, ServiceError>>>,
    queries: Mutex<Vec<TileQuery>>,
}

impl MockTileService {
    pub fn new(responses: Vec<Result<TileDelta, ServiceError>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            queries: Mutex::new(Vec::new()),
        }
    }

    /// A service whose every response is an empty delta.
    pub fn idle() -> Self {
        Self::new(Vec::new())
    }

    pub fn query_count(&self) -> usize {
        self.queries.lock().len()
    }

    pub fn queries(&self) -> Vec<TileQuery> {
        self.queries.lock().clone()
    }
}

impl TileService for MockTileService {
    fn fetch_differential(&self, query: &TileQuery) -> Result<TileDelta, ServiceError> {
        self.queries.lock().push(query.clone());
        let mut responses = self.responses.lock();
        if responses.is_empty() {
            Ok(TileDelta::default())
        } else {
            responses.remove(0)
        }
    }
}
