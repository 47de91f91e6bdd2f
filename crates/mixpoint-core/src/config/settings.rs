//! Mixpoint core settings
//!
//! All tunables of the mixing core live here so hosts can persist them in
//! one YAML file next to their own preferences.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::{CACHE_CAPACITY, MIX_SLOTS};

/// Top-level configuration for the mixing core
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixpointConfig {
    pub cache: CacheConfig,
    pub separation: SeparationConfig,
    pub analysis: AnalysisConfig,
    pub playback: PlaybackConfig,
}

impl MixpointConfig {
    /// Clamp every section to supported values
    pub fn validate(&mut self) {
        self.cache.validate();
        self.separation.validate();
        self.analysis.validate();
        self.playback.validate();
    }
}

/// Decoded asset cache settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of cached tracks (main file + stems count as one entry)
    /// Default: 25
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: CACHE_CAPACITY,
        }
    }
}

impl CacheConfig {
    pub fn validate(&mut self) {
        self.capacity = self.capacity.max(1);
    }
}

/// Remote stem separation job settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeparationConfig {
    /// Seconds between job status polls
    /// Default: 10.0
    pub poll_interval_secs: f64,

    /// Give up after this many polls (None = poll until the job ends)
    /// Default: None
    pub max_polls: Option<u32>,
}

const DEFAULT_POLL_INTERVAL_SECS: f64 = 10.0;
const MAX_POLL_INTERVAL_SECS: f64 = 600.0;

impl Default for SeparationConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            max_polls: None,
        }
    }
}

impl SeparationConfig {
    pub fn validate(&mut self) {
        if !self.poll_interval_secs.is_finite() || self.poll_interval_secs < 0.0 {
            self.poll_interval_secs = DEFAULT_POLL_INTERVAL_SECS;
        }
        self.poll_interval_secs = self.poll_interval_secs.min(MAX_POLL_INTERVAL_SECS);
    }

    /// Poll interval as a `Duration`
    ///
    /// Values that never went through `validate` fall back to the default
    /// instead of failing.
    pub fn poll_interval(&self) -> Duration {
        let secs = self.poll_interval_secs;
        if !secs.is_finite() {
            return Duration::from_secs_f64(DEFAULT_POLL_INTERVAL_SECS);
        }
        Duration::try_from_secs_f64(secs.min(MAX_POLL_INTERVAL_SECS))
            .unwrap_or(Duration::from_secs_f64(DEFAULT_POLL_INTERVAL_SECS))
    }
}

/// BPM detection normalization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Detected tempos above this are treated as double-time and halved
    /// Default: 160.0
    pub double_time_threshold: f64,

    /// Detected tempos below this are treated as half-time and doubled
    /// Default: None (never doubled)
    pub half_time_floor: Option<f64>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            double_time_threshold: 160.0,
            half_time_floor: None,
        }
    }
}

impl AnalysisConfig {
    pub fn validate(&mut self) {
        if !self.double_time_threshold.is_finite() || self.double_time_threshold <= 0.0 {
            self.double_time_threshold = 160.0;
        }
        // A floor at or above half the threshold would flip-flop tempos
        if let Some(floor) = self.half_time_floor {
            if !floor.is_finite() || floor <= 0.0 || floor * 2.0 > self.double_time_threshold {
                log::warn!("[CONFIG] Ignoring half_time_floor {}", floor);
                self.half_time_floor = None;
            }
        }
    }
}

/// Playback synchronizer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Number of mix slots; the crossfader has exactly two sides
    /// Default: 2
    pub mix_slots: usize,

    /// Mute the main player while stem players are attached
    /// Default: true
    pub mute_main_with_stems: bool,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            mix_slots: MIX_SLOTS,
            mute_main_with_stems: true,
        }
    }
}

impl PlaybackConfig {
    pub fn validate(&mut self) {
        if self.mix_slots != MIX_SLOTS {
            log::warn!(
                "[CONFIG] mix_slots must be {}, got {}",
                MIX_SLOTS,
                self.mix_slots
            );
            self.mix_slots = MIX_SLOTS;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = MixpointConfig::default();
        assert_eq!(config.cache.capacity, 25);
        assert_eq!(config.separation.poll_interval(), Duration::from_secs(10));
        assert_eq!(config.analysis.double_time_threshold, 160.0);
        assert!(config.analysis.half_time_floor.is_none());
        assert_eq!(config.playback.mix_slots, 2);
    }

    #[test]
    fn test_validate_clamps() {
        let mut config = MixpointConfig::default();
        config.cache.capacity = 0;
        config.separation.poll_interval_secs = -3.0;
        config.analysis.half_time_floor = Some(100.0);
        config.playback.mix_slots = 4;

        config.validate();

        assert_eq!(config.cache.capacity, 1);
        assert_eq!(config.separation.poll_interval_secs, 10.0);
        assert!(config.analysis.half_time_floor.is_none());
        assert_eq!(config.playback.mix_slots, 2);
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let config: MixpointConfig =
            serde_yaml::from_str("separation:\n  poll_interval_secs: 2.5\n").unwrap();
        assert_eq!(config.separation.poll_interval_secs, 2.5);
        assert_eq!(config.cache.capacity, 25);
    }

    #[test]
    fn test_unvalidated_poll_interval_falls_back() {
        for secs in [-1.0, f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let config = SeparationConfig {
                poll_interval_secs: secs,
                max_polls: None,
            };
            assert_eq!(config.poll_interval(), Duration::from_secs(10), "secs = {}", secs);
        }
    }
}
