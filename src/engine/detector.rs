//! Explosion detection over a window snapshot.
//!
//! A candidate explosion is an upward move that is still in progress and
//! sustained across the window, not a single spike already decaying. The
//! midpoint-mean condition filters windows dominated by one outlier tick.

use crate::types::WindowSnapshot;

/// Flag a candidate explosion.
///
/// All four must hold:
/// - the high occurred after the low (the move is upward in time),
/// - net movement over the window is positive,
/// - the window's mean sits above the midpoint of its range,
/// - relative growth from low to high exceeds `threshold`.
pub fn detect(snapshot: &WindowSnapshot, threshold: f64) -> bool {
    snapshot.max.time > snapshot.min.time
        && snapshot.last.value > snapshot.first.value
        && snapshot.mean > (snapshot.max.value - snapshot.min.value) / 2.0 + snapshot.min.value
        && snapshot.growth() > threshold
}
