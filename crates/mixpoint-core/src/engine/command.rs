//! Typed command queue for the playback synchronizer
//!
//! Controls send `SyncCommand`s over a crossbeam channel; the thread that
//! owns the synchronizer drains them with `process_commands`.
//!
//! ```ignore
//! let (tx, rx) = command_channel();
//! let deck_a = TrackControl::new(track_a, tx.clone());
//! deck_a.set_bpm(130.0);
//!
//! // owner thread
//! sync.process_commands(&rx);
//! ```

use crossbeam::channel::{self, Receiver, SendError, Sender};

use crate::types::{BeatResolution, SeekDirection, Stem, TrackId};

/// Operations on the synchronizer
#[derive(Debug, Clone, PartialEq)]
pub enum SyncCommand {
    /// Play one track, or every loaded track
    Play(Option<TrackId>),
    /// Pause one track, or every loaded track
    Pause(Option<TrackId>),
    Seek {
        id: TrackId,
        time: Option<f64>,
        direction: Option<SeekDirection>,
    },
    /// Set the mixpoint; `None` uses the playhead
    SetMixpoint { id: TrackId, time: Option<f64> },
    SetBpm { id: TrackId, bpm: f64 },
    SetBeatResolution { id: TrackId, resolution: BeatResolution },
    SetCrossfader(f32),
    SetStemGain { id: TrackId, stem: Stem, gain: f32 },
    Eject(TrackId),
    ReloadMetadata(TrackId),
}

/// Create an unbounded command channel
pub fn command_channel() -> (Sender<SyncCommand>, Receiver<SyncCommand>) {
    channel::unbounded()
}

/// Per-track control handle
///
/// Every command sent through it is stamped with its track id.
#[derive(Debug, Clone)]
pub struct TrackControl {
    id: TrackId,
    tx: Sender<SyncCommand>,
}

impl TrackControl {
    pub fn new(id: TrackId, tx: Sender<SyncCommand>) -> Self {
        Self { id, tx }
    }

    pub fn id(&self) -> TrackId {
        self.id
    }

    fn send(&self, cmd: SyncCommand) -> Result<(), SendError<SyncCommand>> {
        self.tx.send(cmd)
    }

    pub fn play(&self) -> Result<(), SendError<SyncCommand>> {
        self.send(SyncCommand::Play(Some(self.id)))
    }

    pub fn pause(&self) -> Result<(), SendError<SyncCommand>> {
        self.send(SyncCommand::Pause(Some(self.id)))
    }

    pub fn seek_to(&self, time: f64) -> Result<(), SendError<SyncCommand>> {
        self.send(SyncCommand::Seek {
            id: self.id,
            time: Some(time),
            direction: None,
        })
    }

    pub fn seek_beat(&self, direction: SeekDirection) -> Result<(), SendError<SyncCommand>> {
        self.send(SyncCommand::Seek {
            id: self.id,
            time: None,
            direction: Some(direction),
        })
    }

    pub fn set_mixpoint(&self, time: Option<f64>) -> Result<(), SendError<SyncCommand>> {
        self.send(SyncCommand::SetMixpoint { id: self.id, time })
    }

    pub fn set_bpm(&self, bpm: f64) -> Result<(), SendError<SyncCommand>> {
        self.send(SyncCommand::SetBpm { id: self.id, bpm })
    }

    pub fn set_beat_resolution(
        &self,
        resolution: BeatResolution,
    ) -> Result<(), SendError<SyncCommand>> {
        self.send(SyncCommand::SetBeatResolution {
            id: self.id,
            resolution,
        })
    }

    pub fn set_stem_gain(&self, stem: Stem, gain: f32) -> Result<(), SendError<SyncCommand>> {
        self.send(SyncCommand::SetStemGain {
            id: self.id,
            stem,
            gain,
        })
    }

    pub fn eject(&self) -> Result<(), SendError<SyncCommand>> {
        self.send(SyncCommand::Eject(self.id))
    }

    pub fn reload_metadata(&self) -> Result<(), SendError<SyncCommand>> {
        self.send(SyncCommand::ReloadMetadata(self.id))
    }
}
