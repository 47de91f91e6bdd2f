//! Track metadata and per-track preferences
//!
//! `Track` is owned by the persistence layer and read-only to the core.
//! `TrackPreferences` is mutated through partial patches so that concurrent
//! writers never clobber fields they did not touch.

use serde::{Deserialize, Serialize};

use crate::types::{BeatResolution, Stem, TrackId};

/// Analysed track metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    /// File name as added by the user (e.g. "Artist - Title.mp3")
    pub name: String,
    pub duration_seconds: f64,
    /// Detected BPM (after double-time normalization)
    pub bpm: f64,
    /// Time of the first detected beat
    pub beat_offset_seconds: f64,
    /// User override of the first beat
    #[serde(default)]
    pub adjusted_beat_offset_seconds: Option<f64>,
}

impl Track {
    /// File name without its extension
    pub fn base_name(&self) -> &str {
        match self.name.rfind('.') {
            Some(dot) if dot > 0 => &self.name[..dot],
            _ => &self.name,
        }
    }

    /// Folder holding this track's separated stems
    pub fn stems_folder_name(&self) -> String {
        format!("{} - stems", self.base_name())
    }
}

/// User-adjustable settings for a single track
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackPreferences {
    pub adjusted_bpm: Option<f64>,
    pub beat_resolution: BeatResolution,
    pub mixpoint_seconds: f64,
    pub stem_zoom_focus: Option<Stem>,
}

impl TrackPreferences {
    /// Merge a partial update over this snapshot
    pub fn apply(&mut self, patch: &TrackPreferencesPatch) {
        if let Some(bpm) = patch.adjusted_bpm {
            self.adjusted_bpm = Some(bpm);
        }
        if let Some(resolution) = patch.beat_resolution {
            self.beat_resolution = resolution;
        }
        if let Some(mixpoint) = patch.mixpoint_seconds {
            self.mixpoint_seconds = mixpoint;
        }
        if let Some(focus) = patch.stem_zoom_focus {
            self.stem_zoom_focus = focus;
        }
    }
}

/// Partial update of `TrackPreferences`; `None` fields are left untouched
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackPreferencesPatch {
    pub adjusted_bpm: Option<f64>,
    pub beat_resolution: Option<BeatResolution>,
    pub mixpoint_seconds: Option<f64>,
    /// `Some(None)` clears the focus
    pub stem_zoom_focus: Option<Option<Stem>>,
}

impl TrackPreferencesPatch {
    pub fn adjusted_bpm(bpm: f64) -> Self {
        Self {
            adjusted_bpm: Some(bpm),
            ..Self::default()
        }
    }

    pub fn beat_resolution(resolution: BeatResolution) -> Self {
        Self {
            beat_resolution: Some(resolution),
            ..Self::default()
        }
    }

    pub fn mixpoint(seconds: f64) -> Self {
        Self {
            mixpoint_seconds: Some(seconds),
            ..Self::default()
        }
    }
}
