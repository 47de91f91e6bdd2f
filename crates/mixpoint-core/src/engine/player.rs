//! Player handles over the host audio backend
//!
//! The backend owns the single audio context and turns blobs into players.
//! The synchronizer wraps each player in a `PlayerHandle` that mirrors its
//! transport state, so reads never round-trip into the backend except for
//! the playhead.

use crate::assets::Blob;
use crate::engine::LevelMeter;
use crate::error::Result;
use crate::types::StereoSample;

/// One decoded audio source bound to the shared context
pub trait AudioPlayer {
    fn play(&mut self);
    fn pause(&mut self);
    fn seek(&mut self, seconds: f64);
    fn set_rate(&mut self, rate: f32);
    fn set_gain(&mut self, gain: f32);
    /// Playhead in seconds
    fn current_time(&self) -> f64;
    /// Most recent buffer sent to the output, for metering
    fn latest_frames(&self) -> &[StereoSample];
    /// Detach from the context; the player is not used again
    fn disconnect(&mut self);
}

/// Host audio system
pub trait AudioBackend {
    type Player: AudioPlayer;

    /// Open the shared audio context. Called once per session.
    fn open_context(&mut self) -> Result<()>;

    /// Decode a blob into a player
    fn create_player(&mut self, blob: Blob) -> Result<Self::Player>;
}

/// Synchronizer-owned state around one player
#[derive(Debug)]
pub struct PlayerHandle<P: AudioPlayer> {
    player: P,
    is_playing: bool,
    position_seconds: f64,
    gain: f32,
    playback_rate: f32,
}

impl<P: AudioPlayer> PlayerHandle<P> {
    pub fn new(player: P) -> Self {
        Self {
            player,
            is_playing: false,
            position_seconds: 0.0,
            gain: 1.0,
            playback_rate: 1.0,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn position(&self) -> f64 {
        self.position_seconds
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    pub fn playback_rate(&self) -> f32 {
        self.playback_rate
    }

    pub fn play(&mut self) {
        if !self.is_playing {
            self.player.play();
            self.is_playing = true;
        }
    }

    pub fn pause(&mut self) {
        if self.is_playing {
            self.player.pause();
            self.is_playing = false;
        }
    }

    pub fn seek(&mut self, seconds: f64) {
        let seconds = seconds.max(0.0);
        self.player.seek(seconds);
        self.position_seconds = seconds;
    }

    pub fn set_rate(&mut self, rate: f32) {
        self.player.set_rate(rate);
        self.playback_rate = rate;
    }

    /// Set the output gain, clamped to `0.0..=1.0`
    pub fn set_gain(&mut self, gain: f32) {
        let gain = gain.clamp(0.0, 1.0);
        self.player.set_gain(gain);
        self.gain = gain;
    }

    /// Read the playhead from the backend
    pub fn refresh_position(&mut self) -> f64 {
        self.position_seconds = self.player.current_time();
        self.position_seconds
    }

    /// Level of the latest output buffer, after gain
    pub fn meter(&self) -> LevelMeter {
        LevelMeter::from_frames(self.player.latest_frames()).scaled(self.gain)
    }

    /// Stop and detach the player
    pub fn destroy(mut self) {
        self.pause();
        self.player.disconnect();
    }

    #[cfg(test)]
    pub(crate) fn inner(&self) -> &P {
        &self.player
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockPlayer;

    #[test]
    fn test_play_pause_only_forward_changes() {
        let mut handle = PlayerHandle::new(MockPlayer::default());
        handle.play();
        handle.play();
        assert!(handle.is_playing());
        assert_eq!(handle.inner().state().play_calls, 1);

        handle.pause();
        handle.pause();
        assert!(!handle.is_playing());
        assert_eq!(handle.inner().state().pause_calls, 1);
    }

    #[test]
    fn test_gain_is_clamped() {
        let mut handle = PlayerHandle::new(MockPlayer::default());
        handle.set_gain(1.7);
        assert_eq!(handle.gain(), 1.0);
        assert_eq!(handle.inner().state().gain, 1.0);
        handle.set_gain(-0.2);
        assert_eq!(handle.gain(), 0.0);
    }

    #[test]
    fn test_seek_and_refresh() {
        let mut handle = PlayerHandle::new(MockPlayer::default());
        handle.seek(12.5);
        assert_eq!(handle.position(), 12.5);
        handle.inner().state_mut().time = 13.0;
        assert_eq!(handle.refresh_position(), 13.0);
    }

    #[test]
    fn test_destroy_disconnects() {
        let player = MockPlayer::default();
        let probe = player.clone();
        let mut handle = PlayerHandle::new(player);
        handle.play();
        handle.destroy();
        assert!(probe.state().disconnected);
        assert!(!probe.state().playing);
    }
}
