//! Common types for Mixpoint
//!
//! This module contains the fundamental identifiers and sample types used
//! throughout the mixing core: track ids, stems, grid resolution, mix slots
//! and the stereo frame type used for level metering.

use serde::{Deserialize, Serialize};

/// Number of concurrent mix slots (left and right of the crossfader)
pub const MIX_SLOTS: usize = 2;

/// Number of stems per track (Drums, Bass, Vocals, Other)
pub const NUM_STEMS: usize = 4;

/// Default number of entries kept by the asset cache
pub const CACHE_CAPACITY: usize = 25;

/// Audio sample type (32-bit float)
pub type Sample = f32;

/// Track identifier
///
/// Assigned by the persistence layer as an auto-increment key, so ordering
/// by id is ordering by insertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(pub u64);

impl std::fmt::Display for TrackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "track#{}", self.0)
    }
}

/// Stem identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(usize)]
pub enum Stem {
    Drums = 0,
    Bass = 1,
    Vocals = 2,
    Other = 3,
}

impl Stem {
    /// Get all stems in order
    pub const ALL: [Stem; NUM_STEMS] = [Stem::Drums, Stem::Bass, Stem::Vocals, Stem::Other];

    /// Convert from index (0-3) to Stem
    pub fn from_index(idx: usize) -> Option<Self> {
        match idx {
            0 => Some(Stem::Drums),
            1 => Some(Stem::Bass),
            2 => Some(Stem::Vocals),
            3 => Some(Stem::Other),
            _ => None,
        }
    }

    /// Get the name of this stem
    pub fn name(&self) -> &'static str {
        match self {
            Stem::Drums => "drums",
            Stem::Bass => "bass",
            Stem::Vocals => "vocals",
            Stem::Other => "other",
        }
    }

    /// Index into per-stem arrays
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Beat grid subdivision per detected beat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BeatResolution {
    #[default]
    #[serde(rename = "1:1")]
    Whole,
    #[serde(rename = "1:2")]
    Half,
    #[serde(rename = "1:4")]
    Quarter,
}

impl BeatResolution {
    /// Number of grid steps per detected beat
    pub fn subdivisions(self) -> u32 {
        match self {
            BeatResolution::Whole => 1,
            BeatResolution::Half => 2,
            BeatResolution::Quarter => 4,
        }
    }
}

/// Direction for beat-stepping seeks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeekDirection {
    Next,
    Previous,
}

/// Mix slot identifier (0 = left of the crossfader, 1 = right)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotId(pub usize);

impl SlotId {
    pub const LEFT: SlotId = SlotId(0);
    pub const RIGHT: SlotId = SlotId(1);

    /// Create a slot id, rejecting indices past the last slot
    pub fn new(index: usize) -> Option<Self> {
        (index < MIX_SLOTS).then_some(Self(index))
    }
}

/// A single stereo sample (left and right channels)
///
/// Uses `#[repr(C)]` to ensure predictable memory layout: [left, right].
/// This enables zero-copy conversion between `&[StereoSample]` and `&[f32]`
/// (interleaved format) using bytemuck.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct StereoSample {
    pub left: Sample,
    pub right: Sample,
}

impl StereoSample {
    /// Create a new stereo sample
    #[inline]
    pub fn new(left: Sample, right: Sample) -> Self {
        Self { left, right }
    }

    /// Create a mono sample (same value in both channels)
    #[inline]
    pub fn mono(value: Sample) -> Self {
        Self { left: value, right: value }
    }
}

/// Zero-copy view of stereo frames as interleaved f32 [L, R, L, R, ...]
#[inline]
pub fn as_interleaved(frames: &[StereoSample]) -> &[Sample] {
    bytemuck::cast_slice(frames)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stem_enumeration() {
        assert_eq!(Stem::ALL.len(), 4);
        assert_eq!(Stem::Vocals.name(), "vocals");
        assert_eq!(Stem::Bass as usize, 1);
        assert_eq!(Stem::from_index(3), Some(Stem::Other));
        assert_eq!(Stem::from_index(4), None);
    }

    #[test]
    fn test_resolution_subdivisions() {
        assert_eq!(BeatResolution::Whole.subdivisions(), 1);
        assert_eq!(BeatResolution::Half.subdivisions(), 2);
        assert_eq!(BeatResolution::Quarter.subdivisions(), 4);
    }

    #[test]
    fn test_resolution_serde_names() {
        let json = serde_json::to_string(&BeatResolution::Quarter).unwrap();
        assert_eq!(json, "\"1:4\"");
        let parsed: BeatResolution = serde_json::from_str("\"1:2\"").unwrap();
        assert_eq!(parsed, BeatResolution::Half);
    }

    #[test]
    fn test_slot_bounds() {
        assert_eq!(SlotId::new(1), Some(SlotId::RIGHT));
        assert!(SlotId::new(2).is_none());
    }

    #[test]
    fn test_interleaved_view() {
        let frames = [StereoSample::new(1.0, 2.0), StereoSample::mono(0.5)];
        assert_eq!(as_interleaved(&frames), &[1.0, 2.0, 0.5, 0.5]);
    }
}
