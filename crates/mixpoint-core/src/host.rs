//! Interfaces implemented by the host application
//!
//! The core never touches storage, the file system picker or the BPM
//! detection algorithm directly. The host provides them through these
//! traits; stem storage, the separation service and the audio backend have
//! their own traits next to the code that drives them
//! ([`crate::stems::StemStorage`], [`crate::stems::SeparationClient`],
//! [`crate::engine::AudioBackend`]).

use crate::error::Result;
use crate::track::{Track, TrackPreferences, TrackPreferencesPatch};
use crate::types::{StereoSample, TrackId};

/// Track and preference storage
pub trait Persistence {
    /// Load track metadata
    fn load_track(&self, id: TrackId) -> Result<Track>;

    /// Load the latest preferences snapshot for a track
    fn load_preferences(&self, id: TrackId) -> Result<TrackPreferences>;

    /// Merge a partial update over the latest stored preferences
    fn save_preferences(&mut self, id: TrackId, patch: TrackPreferencesPatch) -> Result<()>;

    /// Drop a track from the active mix slots
    fn remove_from_mix(&mut self, id: TrackId) -> Result<()>;
}

/// Raw file access for track audio
pub trait FileAccess {
    /// Read the encoded file bytes; fails with `PermissionDenied` when the
    /// user has not granted access
    fn read_bytes(&self, id: TrackId) -> Result<Vec<u8>>;
}

/// Decoded PCM handed to the detector
#[derive(Debug, Clone, Default)]
pub struct DecodedAudio {
    pub sample_rate: u32,
    pub frames: Vec<StereoSample>,
}

impl DecodedAudio {
    /// Duration in seconds
    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames.len() as f64 / self.sample_rate as f64
    }
}

/// Tempo and first-beat estimate from a detector
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub bpm: f64,
    pub offset_seconds: f64,
}

/// BPM detection oracle
pub trait BpmDetector {
    /// Estimate tempo and first-beat offset; fails with `DetectionFailure`
    /// when no tempo can be determined
    fn detect(&self, audio: &DecodedAudio) -> Result<Detection>;
}
