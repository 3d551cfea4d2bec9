//! Feasibility guard for voxel grid layouts.
//!
//! A voxel layout is addressed with 32-bit indices, so a map whose extent
//! divided by the leaf size yields more than `i32::MAX` voxels cannot be
//! fully addressed. The guard computes the hypothetical voxel count in
//! 64-bit arithmetic and reports the verdict on the loader's [`StatusBoard`].
//!
//! The guard is advisory: callers build the grid regardless of the verdict
//! (out-of-range voxels simply become unaddressable), so an oversized map
//! degrades answers instead of aborting the load. Monitoring is expected to
//! watch the ERROR status.

use crate::core::Bounds3;
use crate::diagnostics::{DiagnosticLevel, StatusBoard};

/// Hypothetical voxel count for `bounds` at the given leaf sizes.
///
/// Per axis: `ceil(extent / leaf) + 1`. The product is computed in i64 and
/// saturates at `i64::MAX` on overflow (still unambiguously infeasible).
/// Empty bounds count as zero voxels.
pub fn voxel_count(bounds: &Bounds3, leaf_x: f64, leaf_y: f64, leaf_z: f64) -> i64 {
    if bounds.is_empty() {
        return 0;
    }
    let (ex, ey, ez) = bounds.extents();
    let nx = (ex / leaf_x).ceil() as i64 + 1;
    let ny = (ey / leaf_y).ceil() as i64 + 1;
    let nz = (ez / leaf_z).ceil() as i64 + 1;
    nx.checked_mul(ny)
        .and_then(|v| v.checked_mul(nz))
        .unwrap_or(i64::MAX)
}

/// Check whether a grid over `bounds` fits the 32-bit voxel layout.
///
/// Publishes OK or ERROR to `board` and returns the verdict. Call sites
/// ignore the return value and proceed to build; it exists for tests and
/// for callers that want to act on it themselves.
pub fn check_feasibility(
    bounds: &Bounds3,
    leaf_x: f64,
    leaf_y: f64,
    leaf_z: f64,
    board: &StatusBoard,
) -> bool {
    let count = voxel_count(bounds, leaf_x, leaf_y, leaf_z);
    if count > i64::from(i32::MAX) {
        log::error!(
            "Voxel grid is not feasible: {} voxels exceeds the 32-bit layout limit",
            count
        );
        board.set(
            DiagnosticLevel::Error,
            format!(
                "Voxel grid is not feasible ({} voxels overflows the int32 limit). \
                 Consider streaming the map in tiles, splitting the map smaller, \
                 or raising the distance threshold for a larger leaf size.",
                count
            ),
        );
        return false;
    }
    board.set(
        DiagnosticLevel::Ok,
        "Voxel grid is within the feasible range",
    );
    true
}
