//! Map backends and the tile cache they share.

mod snapshot;
mod streaming;
mod tiles;
mod updater;

pub use snapshot::{MapSnapshot, SnapshotMap};
pub use streaming::StreamingMap;
pub use tiles::{Tile, TileGeometry, TileTable};
pub use updater::MapUpdater;
