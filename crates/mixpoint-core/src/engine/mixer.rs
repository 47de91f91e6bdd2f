//! Crossfade and stem gain mixing
//!
//! The crossfader uses an equal-power-like cosine curve: both sides sit at
//! full gain in the center and each side fades to silence at the far end.
//!
//! ```text
//! slider:  0 ─────────── 50 ─────────── 100
//! left:    1.0           1.0            0.0
//! right:   0.0           1.0            1.0
//! ```

use std::f64::consts::PI;

use crate::types::{SlotId, Stem, MIX_SLOTS, NUM_STEMS};

/// Left and right gains for a crossfader position in percent
///
/// The position is clamped to `0..=100`.
pub fn crossfade_gains(slider_percent: f32) -> (f32, f32) {
    let x = (slider_percent.clamp(0.0, 100.0) / 100.0) as f64;
    let left = (1.0 + (x * PI).cos()).min(1.0);
    let right = (1.0 + ((1.0 - x) * PI).cos()).min(1.0);
    (left as f32, right as f32)
}

/// Crossfader and stem slider state for both mix slots
#[derive(Debug, Clone, PartialEq)]
pub struct CrossfadeMixer {
    crossfader: f32,
    stem_sliders: [[f32; NUM_STEMS]; MIX_SLOTS],
}

impl Default for CrossfadeMixer {
    fn default() -> Self {
        Self {
            crossfader: 50.0,
            stem_sliders: [[1.0; NUM_STEMS]; MIX_SLOTS],
        }
    }
}

impl CrossfadeMixer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn crossfader(&self) -> f32 {
        self.crossfader
    }

    pub fn set_crossfader(&mut self, percent: f32) {
        self.crossfader = percent.clamp(0.0, 100.0);
    }

    /// Track gain for a slot (slot 0 is left, slot 1 right)
    pub fn track_gain(&self, slot: SlotId) -> f32 {
        let (left, right) = crossfade_gains(self.crossfader);
        if slot == SlotId::LEFT {
            left
        } else {
            right
        }
    }

    pub fn stem_slider(&self, slot: SlotId, stem: Stem) -> f32 {
        self.stem_sliders
            .get(slot.0)
            .map(|s| s[stem.index()])
            .unwrap_or(1.0)
    }

    pub fn set_stem_slider(&mut self, slot: SlotId, stem: Stem, gain: f32) {
        if let Some(sliders) = self.stem_sliders.get_mut(slot.0) {
            sliders[stem.index()] = gain.clamp(0.0, 1.0);
        }
    }

    /// Effective stem gain: track gain times stem slider
    pub fn stem_gain(&self, slot: SlotId, stem: Stem) -> f32 {
        self.track_gain(slot) * self.stem_slider(slot, stem)
    }

    /// Reset a slot's stem sliders when its track leaves
    pub fn release_slot(&mut self, slot: SlotId) {
        if let Some(sliders) = self.stem_sliders.get_mut(slot.0) {
            *sliders = [1.0; NUM_STEMS];
        }
    }
}
