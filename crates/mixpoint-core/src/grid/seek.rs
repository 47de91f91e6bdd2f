//! Grid-relative seek resolution
//!
//! Snaps free seeks (wheel, drag, click) to a nearby marker and steps
//! forward/backward by grid markers.

use super::BeatGrid;
use crate::types::SeekDirection;

/// Resolve a seek request against a beat grid
///
/// - `requested` without `direction`: snap to the closest of the three
///   markers around `requested` (previous, current, next), where "current"
///   is the first marker after `requested`. Current wins ties so scrolling
///   does not jitter between two markers.
/// - `Previous`: two markers before the one at/after `current_time`.
/// - `Next`: the marker at/after `current_time`.
///
/// Requests past the last marker resolve to the last marker.
pub fn resolve_seek(
    grid: &BeatGrid,
    current_time: f64,
    requested: Option<f64>,
    direction: Option<SeekDirection>,
) -> f64 {
    let markers = grid.markers();
    let Some(&last) = markers.last() else {
        return requested.unwrap_or(current_time);
    };

    match direction {
        Some(SeekDirection::Next) => grid
            .index_at_or_after(current_time)
            .map(|idx| markers[idx])
            .unwrap_or(last),
        Some(SeekDirection::Previous) => {
            let idx = grid
                .index_at_or_after(current_time)
                .unwrap_or(markers.len() - 1);
            markers[idx.saturating_sub(2)]
        }
        None => {
            let target = requested.unwrap_or(current_time);
            match grid.index_after(target) {
                Some(idx) => snap_around(markers, idx, target),
                None => last,
            }
        }
    }
}

/// Pick between the markers around `idx` (the first marker after `target`)
fn snap_around(markers: &[f64], idx: usize, target: f64) -> f64 {
    let current = markers[idx];
    let previous = idx.checked_sub(1).map(|i| markers[i]);
    let next = markers.get(idx + 1).copied();

    let distance = |m: Option<f64>| m.map(|m| (m - target).abs()).unwrap_or(f64::INFINITY);
    let (d_prev, d_curr, d_next) = (distance(previous), (current - target).abs(), distance(next));

    if d_prev < d_curr && d_prev <= d_next {
        previous.unwrap_or(current)
    } else if d_curr <= d_next {
        current
    } else if d_prev <= d_next {
        previous.unwrap_or(current)
    } else {
        next.unwrap_or(current)
    }
}
