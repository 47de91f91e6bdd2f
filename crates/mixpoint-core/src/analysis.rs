//! Track analysis on import
//!
//! Wraps the BPM detection oracle: failures fall back to a neutral tempo so
//! the track still loads, and double-time estimates are folded back into
//! the DJ tempo range.

use crate::config::AnalysisConfig;
use crate::error::Result;
use crate::host::{BpmDetector, DecodedAudio, Detection};
use crate::track::Track;
use crate::types::TrackId;

/// Tempo used when detection fails
pub const FALLBACK_BPM: f64 = 1.0;

/// Normalize a detector result
///
/// - failure → `bpm = 1, offset = 0` (logged, never surfaced)
/// - `bpm > double_time_threshold` → halved
/// - `bpm < half_time_floor` (when configured) → doubled
pub fn normalize_detection(result: Result<Detection>, config: &AnalysisConfig) -> Detection {
    let mut detection = match result {
        Ok(d) if d.bpm.is_finite() && d.bpm > 0.0 => d,
        Ok(d) => {
            log::warn!("[ANALYSIS] Detector returned unusable bpm {}, using fallback", d.bpm);
            return fallback();
        }
        Err(e) => {
            log::warn!("[ANALYSIS] BPM detection failed: {}, using fallback", e);
            return fallback();
        }
    };

    if detection.bpm > config.double_time_threshold {
        log::debug!("[ANALYSIS] Halving double-time estimate {:.2}", detection.bpm);
        detection.bpm /= 2.0;
    } else if let Some(floor) = config.half_time_floor {
        if detection.bpm < floor {
            log::debug!("[ANALYSIS] Doubling half-time estimate {:.2}", detection.bpm);
            detection.bpm *= 2.0;
        }
    }

    if !detection.offset_seconds.is_finite() || detection.offset_seconds < 0.0 {
        detection.offset_seconds = 0.0;
    }

    detection
}

fn fallback() -> Detection {
    Detection {
        bpm: FALLBACK_BPM,
        offset_seconds: 0.0,
    }
}

/// Build track metadata for a newly added file
pub fn analyze_track(
    id: TrackId,
    name: impl Into<String>,
    audio: &DecodedAudio,
    detector: &dyn BpmDetector,
    config: &AnalysisConfig,
) -> Track {
    let name = name.into();
    let detection = normalize_detection(detector.detect(audio), config);

    log::info!(
        "[ANALYSIS] {} ({}): {:.2} bpm, first beat at {:.3}s",
        name,
        id,
        detection.bpm,
        detection.offset_seconds
    );

    Track {
        id,
        name,
        duration_seconds: audio.duration_seconds(),
        bpm: detection.bpm,
        beat_offset_seconds: detection.offset_seconds,
        adjusted_beat_offset_seconds: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MixError;
    use crate::types::StereoSample;

    struct FixedDetector(Option<Detection>);

    impl BpmDetector for FixedDetector {
        fn detect(&self, _audio: &DecodedAudio) -> Result<Detection> {
            self.0
                .ok_or_else(|| MixError::DetectionFailure("no onsets".into()))
        }
    }

    fn detection(bpm: f64, offset_seconds: f64) -> Result<Detection> {
        Ok(Detection { bpm, offset_seconds })
    }

    #[test]
    fn test_failure_falls_back() {
        let config = AnalysisConfig::default();
        let d = normalize_detection(Err(MixError::DetectionFailure("x".into())), &config);
        assert_eq!(d, Detection { bpm: 1.0, offset_seconds: 0.0 });
    }

    #[test]
    fn test_double_time_is_halved() {
        let config = AnalysisConfig::default();
        assert_eq!(normalize_detection(detection(174.0, 0.1), &config).bpm, 87.0);
        assert_eq!(normalize_detection(detection(160.0, 0.1), &config).bpm, 160.0);
        assert_eq!(normalize_detection(detection(64.0, 0.1), &config).bpm, 64.0);
    }

    #[test]
    fn test_half_time_floor_doubles_when_configured() {
        let config = AnalysisConfig {
            half_time_floor: Some(70.0),
            ..AnalysisConfig::default()
        };
        assert_eq!(normalize_detection(detection(64.0, 0.1), &config).bpm, 128.0);
        assert_eq!(normalize_detection(detection(90.0, 0.1), &config).bpm, 90.0);
    }

    #[test]
    fn test_analyze_track_builds_metadata() {
        let audio = DecodedAudio {
            sample_rate: 100,
            frames: vec![StereoSample::default(); 1000],
        };
        let config = AnalysisConfig::default();

        let track = analyze_track(
            TrackId(7),
            "Song.mp3",
            &audio,
            &FixedDetector(Some(Detection { bpm: 256.0, offset_seconds: 0.3 })),
            &config,
        );
        assert_eq!(track.duration_seconds, 10.0);
        assert_eq!(track.bpm, 128.0);
        assert_eq!(track.beat_offset_seconds, 0.3);

        let track = analyze_track(TrackId(8), "Noise.wav", &audio, &FixedDetector(None), &config);
        assert_eq!(track.bpm, FALLBACK_BPM);
    }
}
