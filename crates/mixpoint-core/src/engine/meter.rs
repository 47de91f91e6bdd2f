//! Output level metering
//!
//! Levels are taken from the most recent buffer a player produced. RMS
//! and peak are computed over both channels of the interleaved view.

use serde::Serialize;

use crate::types::{as_interleaved, StereoSample};

/// RMS and peak level of one buffer (linear, 0.0 = silence)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LevelMeter {
    pub rms: f32,
    pub peak: f32,
}

impl LevelMeter {
    pub const SILENT: LevelMeter = LevelMeter { rms: 0.0, peak: 0.0 };

    /// Measure a stereo buffer
    pub fn from_frames(frames: &[StereoSample]) -> Self {
        let samples = as_interleaved(frames);
        if samples.is_empty() {
            return Self::SILENT;
        }

        let mut sum_sq = 0.0f64;
        let mut peak = 0.0f32;
        for &s in samples {
            sum_sq += (s as f64) * (s as f64);
            peak = peak.max(s.abs());
        }

        Self {
            rms: (sum_sq / samples.len() as f64).sqrt() as f32,
            peak,
        }
    }

    /// Per-field maximum of two meters
    pub fn max(self, other: LevelMeter) -> LevelMeter {
        LevelMeter {
            rms: self.rms.max(other.rms),
            peak: self.peak.max(other.peak),
        }
    }

    /// Scale by a linear gain
    pub fn scaled(self, gain: f32) -> LevelMeter {
        LevelMeter {
            rms: self.rms * gain,
            peak: self.peak * gain,
        }
    }
}
