//! Beat grid generation
//!
//! Converts detected tempo and first-beat offset into a fixed-interval
//! marker sequence spanning the whole track.

use serde::Serialize;

use crate::error::{MixError, Result};
use crate::track::{Track, TrackPreferences};
use crate::types::BeatResolution;

/// Ordered beat markers in seconds
///
/// Markers are strictly increasing, never negative, and the last marker is
/// always the track duration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BeatGrid {
    markers: Vec<f64>,
    /// Seconds between grid steps (beat interval / subdivisions)
    step: f64,
}

impl BeatGrid {
    /// Compute the grid for a track with its current preferences
    pub fn for_track(track: &Track, prefs: &TrackPreferences) -> Result<Self> {
        compute_grid(
            track.duration_seconds,
            track.bpm,
            track.beat_offset_seconds,
            track.adjusted_beat_offset_seconds,
            prefs.adjusted_bpm,
            prefs.beat_resolution,
        )
    }

    /// Get the markers
    pub fn markers(&self) -> &[f64] {
        &self.markers
    }

    /// Number of markers
    pub fn len(&self) -> usize {
        self.markers.len()
    }

    /// Always false for a computed grid
    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    /// Seconds between consecutive grid steps
    pub fn step(&self) -> f64 {
        self.step
    }

    pub fn first(&self) -> Option<f64> {
        self.markers.first().copied()
    }

    pub fn last(&self) -> Option<f64> {
        self.markers.last().copied()
    }

    /// Index of the marker we are on or past (last marker <= time)
    pub fn beat_index_at(&self, time: f64) -> Option<usize> {
        self.markers.iter().rposition(|&m| m <= time)
    }

    /// Index of the first marker at or after `time`
    pub(crate) fn index_at_or_after(&self, time: f64) -> Option<usize> {
        self.markers.iter().position(|&m| m >= time)
    }

    /// Index of the first marker strictly after `time`
    pub(crate) fn index_after(&self, time: f64) -> Option<usize> {
        self.markers.iter().position(|&m| m > time)
    }

    #[cfg(test)]
    pub(crate) fn from_markers(markers: Vec<f64>) -> Self {
        Self { markers, step: 1.0 }
    }
}

/// Build the beat grid for a track
///
/// # Arguments
/// * `duration` - Track duration in seconds
/// * `bpm` - Detected BPM
/// * `offset` - Detected first-beat time in seconds
/// * `adjusted_offset` - User override of the first beat
/// * `adjusted_bpm` - User override of the tempo
/// * `resolution` - Grid subdivision per beat
///
/// The start is normalized backward to the earliest beat at or before the
/// track start, so detectors reporting an offset several beats in still
/// produce a grid that covers the intro.
pub fn compute_grid(
    duration: f64,
    bpm: f64,
    offset: f64,
    adjusted_offset: Option<f64>,
    adjusted_bpm: Option<f64>,
    resolution: BeatResolution,
) -> Result<BeatGrid> {
    let effective_bpm = adjusted_bpm.unwrap_or(bpm);
    if !effective_bpm.is_finite() || effective_bpm <= 0.0 {
        return Err(MixError::InvalidMetadata(format!(
            "bpm must be positive, got {}",
            effective_bpm
        )));
    }
    if !duration.is_finite() || duration <= 0.0 {
        return Err(MixError::InvalidMetadata(format!(
            "duration must be positive, got {}",
            duration
        )));
    }

    let beat_interval = 60.0 / effective_bpm;
    let step = beat_interval / resolution.subdivisions() as f64;

    let mut start = adjusted_offset.unwrap_or(offset);
    if !start.is_finite() {
        return Err(MixError::InvalidMetadata(format!(
            "beat offset must be finite, got {}",
            start
        )));
    }

    // Whole beats back towards zero; the remainder keeps the phase and an
    // exact multiple lands on the first beat rather than on zero
    if start > 0.0 {
        let phase = start.rem_euclid(beat_interval);
        start = if phase > 0.0 { phase } else { beat_interval };
    } else if start < 0.0 {
        start = start.rem_euclid(step);
    }

    let mut markers = Vec::with_capacity((duration / step) as usize + 2);
    let mut i = 0u64;
    loop {
        let marker = start + i as f64 * step;
        if marker >= duration {
            break;
        }
        markers.push(marker);
        i += 1;
    }

    if markers.is_empty() {
        // First beat lands past the end of a very short track
        markers.push(0.0);
    }
    markers.push(duration);

    log::debug!(
        "[GRID] {} markers ({} bpm, start {:.3}s, step {:.3}s, duration {:.2}s)",
        markers.len(),
        effective_bpm,
        start,
        step,
        duration
    );

    Ok(BeatGrid { markers, step })
}
