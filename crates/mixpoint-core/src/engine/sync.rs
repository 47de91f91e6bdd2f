//! Playback synchronizer
//!
//! Owns every player handle in the mix and keeps each track's main player
//! and stem players moving together. All state lives in this struct; it
//! is driven from one thread by direct calls, `process_commands` and
//! periodic `tick` calls.
//!
//! ```text
//! load_track ──► main player ──┬── attach_stems ──► 4 stem players
//!                              │
//! play / pause / seek / set_bpm apply to main and stems in one pass
//!                              │
//! tick ──► MixSnapshot (positions, meters) ──► rendering
//! ```

use std::collections::BTreeMap;

use crossbeam::channel::Receiver;
use serde::Serialize;

use crate::assets::{Blob, TrackAssetCache};
use crate::config::PlaybackConfig;
use crate::engine::{
    AudioBackend, AudioPlayer, CrossfadeMixer, LevelMeter, PlayerHandle, SyncCommand,
};
use crate::error::{MixError, Result};
use crate::grid::{resolve_seek, BeatGrid};
use crate::host::Persistence;
use crate::stems::{CancelHandle, StemReadinessMachine, StemState};
use crate::track::{Track, TrackPreferences, TrackPreferencesPatch};
use crate::types::{BeatResolution, SeekDirection, SlotId, Stem, TrackId, MIX_SLOTS};

/// Mixpoint changes smaller than this are ignored
const MIXPOINT_EPSILON: f64 = 1e-3;

/// Read-only view of one track for rendering
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackSnapshot {
    pub id: TrackId,
    pub slot: SlotId,
    pub position_seconds: f64,
    pub duration_seconds: f64,
    pub is_playing: bool,
    pub playback_rate: f32,
    /// Crossfader gain of the track's slot
    pub gain: f32,
    /// Beat marker the playhead is on or past
    pub beat_index: Option<usize>,
    /// Loudest of the stem meters, or the main player without stems
    pub meter: LevelMeter,
    /// Per-stem meters, empty without stems
    pub stem_meters: Vec<(Stem, LevelMeter)>,
}

/// Read-only view of the whole mix
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MixSnapshot {
    pub crossfader: f32,
    pub tracks: Vec<TrackSnapshot>,
}

struct LoadedTrack<P: AudioPlayer> {
    track: Track,
    prefs: TrackPreferences,
    slot: SlotId,
    grid: Option<BeatGrid>,
    main: PlayerHandle<P>,
    stems: Vec<(Stem, PlayerHandle<P>)>,
}

impl<P: AudioPlayer> LoadedTrack<P> {
    fn is_playing(&self) -> bool {
        self.main.is_playing()
    }

    fn rate(&self) -> f32 {
        playback_rate(&self.track, &self.prefs)
    }

    fn regrid(&mut self) {
        self.grid = match BeatGrid::for_track(&self.track, &self.prefs) {
            Ok(grid) => Some(grid),
            Err(e) => {
                log::warn!("[GRID] {} left ungridded: {}", self.track.id, e);
                None
            }
        };
    }

    fn play(&mut self) {
        self.main.play();
        for (_, handle) in &mut self.stems {
            handle.play();
        }
    }

    fn pause(&mut self) {
        self.main.pause();
        for (_, handle) in &mut self.stems {
            handle.pause();
        }
    }

    fn seek(&mut self, seconds: f64) {
        self.main.seek(seconds);
        for (_, handle) in &mut self.stems {
            handle.seek(seconds);
        }
    }

    fn set_rate(&mut self, rate: f32) {
        self.main.set_rate(rate);
        for (_, handle) in &mut self.stems {
            handle.set_rate(rate);
        }
    }

    fn destroy_stems(&mut self) {
        for (_, handle) in self.stems.drain(..) {
            handle.destroy();
        }
    }

    fn destroy(mut self) {
        self.destroy_stems();
        self.main.destroy();
    }
}

/// Playback rate that turns the detected tempo into the adjusted one
fn playback_rate(track: &Track, prefs: &TrackPreferences) -> f32 {
    match prefs.adjusted_bpm {
        Some(adjusted) if track.bpm.is_finite() && track.bpm > 0.0 => (adjusted / track.bpm) as f32,
        _ => 1.0,
    }
}

/// Keeps the players of up to two tracks in lockstep
pub struct PlaybackSynchronizer<B: AudioBackend, P: Persistence> {
    backend: B,
    persistence: P,
    config: PlaybackConfig,
    context_open: bool,
    running: bool,
    mixer: CrossfadeMixer,
    slots: [Option<TrackId>; MIX_SLOTS],
    tracks: BTreeMap<TrackId, LoadedTrack<B::Player>>,
    separations: BTreeMap<TrackId, CancelHandle>,
}

impl<B: AudioBackend, P: Persistence> PlaybackSynchronizer<B, P> {
    pub fn new(backend: B, persistence: P, config: PlaybackConfig) -> Self {
        Self {
            backend,
            persistence,
            config,
            context_open: false,
            running: false,
            mixer: CrossfadeMixer::new(),
            slots: [None; MIX_SLOTS],
            tracks: BTreeMap::new(),
            separations: BTreeMap::new(),
        }
    }

    // ─────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────

    /// True while the tick loop should run
    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_loaded(&self, id: TrackId) -> bool {
        self.tracks.contains_key(&id)
    }

    pub fn slot_track(&self, slot: SlotId) -> Option<TrackId> {
        self.slots.get(slot.0).copied().flatten()
    }

    pub fn is_playing(&self, id: TrackId) -> bool {
        self.tracks.get(&id).is_some_and(|t| t.is_playing())
    }

    pub fn position(&self, id: TrackId) -> Option<f64> {
        self.tracks.get(&id).map(|t| t.main.position())
    }

    pub fn playback_rate(&self, id: TrackId) -> Option<f32> {
        self.tracks.get(&id).map(|t| t.main.playback_rate())
    }

    pub fn grid(&self, id: TrackId) -> Option<&BeatGrid> {
        self.tracks.get(&id).and_then(|t| t.grid.as_ref())
    }

    pub fn preferences(&self, id: TrackId) -> Option<&TrackPreferences> {
        self.tracks.get(&id).map(|t| &t.prefs)
    }

    pub fn has_stems(&self, id: TrackId) -> bool {
        self.tracks.get(&id).is_some_and(|t| !t.stems.is_empty())
    }

    pub fn mixer(&self) -> &CrossfadeMixer {
        &self.mixer
    }

    pub fn persistence(&self) -> &P {
        &self.persistence
    }

    pub fn persistence_mut(&mut self) -> &mut P {
        &mut self.persistence
    }

    #[cfg(test)]
    pub(crate) fn backend(&self) -> &B {
        &self.backend
    }

    #[cfg(test)]
    pub(crate) fn main_handle(&self, id: TrackId) -> Option<&PlayerHandle<B::Player>> {
        self.tracks.get(&id).map(|t| &t.main)
    }

    #[cfg(test)]
    pub(crate) fn stem_handle(&self, id: TrackId, stem: Stem) -> Option<&PlayerHandle<B::Player>> {
        self.tracks
            .get(&id)?
            .stems
            .iter()
            .find(|(s, _)| *s == stem)
            .map(|(_, h)| h)
    }

    // ─────────────────────────────────────────────────────────────────
    // Track lifecycle
    // ─────────────────────────────────────────────────────────────────

    fn ensure_context(&mut self) -> Result<()> {
        if !self.context_open {
            self.backend.open_context()?;
            self.context_open = true;
            log::info!("[SYNC] Audio context opened");
        }
        Ok(())
    }

    /// Put a track into a mix slot
    ///
    /// Whatever else occupied the slot is ejected first. Loading a track
    /// that is already loaded replaces its players and keeps its stored mix
    /// slot. A track whose metadata cannot produce a grid still loads,
    /// without a grid.
    pub fn load_track(&mut self, id: TrackId, slot: SlotId, blob: Blob) -> Result<()> {
        if slot.0 >= MIX_SLOTS {
            return Err(MixError::InvalidSlot(slot.0));
        }

        let track = self.persistence.load_track(id)?;
        let prefs = self.persistence.load_preferences(id)?;

        self.unload(id);
        if let Some(previous) = self.slot_track(slot) {
            self.eject(previous)?;
        }

        self.ensure_context()?;
        let player = self.backend.create_player(blob)?;

        let mut loaded = LoadedTrack {
            track,
            prefs,
            slot,
            grid: None,
            main: PlayerHandle::new(player),
            stems: Vec::new(),
        };
        loaded.regrid();
        let rate = loaded.rate();
        let mixpoint = loaded.prefs.mixpoint_seconds;
        loaded.main.set_rate(rate);
        loaded.main.set_gain(self.mixer.track_gain(slot));
        loaded.main.seek(mixpoint);

        log::info!(
            "[SYNC] Loaded {} into slot {} (rate {:.3}, mixpoint {:.2}s)",
            id,
            slot.0,
            loaded.main.playback_rate(),
            loaded.prefs.mixpoint_seconds
        );
        self.slots[slot.0] = Some(id);
        self.tracks.insert(id, loaded);
        Ok(())
    }

    /// Attach stem players once the track's stems are ready
    ///
    /// Returns whether stems are attached afterwards. Stem players pick up
    /// the main player's rate, position and play state. The main player
    /// keeps running as the clock.
    pub fn attach_stems(
        &mut self,
        id: TrackId,
        machine: &StemReadinessMachine,
        cache: &TrackAssetCache,
    ) -> Result<bool> {
        if machine.track().id != id || machine.state() != StemState::Ready {
            return Ok(false);
        }
        let Some(stems) = cache.get_stems(id).filter(|s| s.is_complete()) else {
            return Ok(false);
        };
        match self.tracks.get(&id) {
            None => return Ok(false),
            Some(loaded) if !loaded.stems.is_empty() => return Ok(true),
            Some(_) => {}
        }

        self.ensure_context()?;
        let mut players = Vec::with_capacity(stems.count());
        for (stem, blob) in stems.iter() {
            match self.backend.create_player(blob.clone()) {
                Ok(player) => players.push((stem, PlayerHandle::new(player))),
                Err(e) => {
                    for (_, handle) in players {
                        handle.destroy();
                    }
                    return Err(e);
                }
            }
        }

        let Some(loaded) = self.tracks.get_mut(&id) else {
            return Ok(false);
        };
        let position = loaded.main.refresh_position();
        let rate = loaded.main.playback_rate();
        let playing = loaded.is_playing();
        for (_, handle) in &mut players {
            handle.set_rate(rate);
            handle.seek(position);
            if playing {
                handle.play();
            }
        }
        loaded.stems = players;
        log::info!("[SYNC] Attached stems to {} at {:.2}s", id, position);

        self.apply_gains(id);
        self.finish_separation(id);
        Ok(true)
    }

    /// Remove stem players and return to the main player
    pub fn detach_stems(&mut self, id: TrackId) {
        let Some(loaded) = self.tracks.get_mut(&id) else {
            return;
        };
        if loaded.stems.is_empty() {
            return;
        }
        loaded.destroy_stems();
        log::info!("[SYNC] Detached stems from {}", id);
        self.apply_gains(id);
    }

    /// Remove a track from the mix
    ///
    /// Pauses and destroys its players, frees its slot, cancels any
    /// separation job registered for it and drops it from the stored mix.
    pub fn eject(&mut self, id: TrackId) -> Result<()> {
        if let Some(handle) = self.separations.remove(&id) {
            log::info!("[SYNC] Cancelling separation for {}", id);
            handle.cancel();
        }

        if let Some(slot) = self.unload(id) {
            log::info!("[SYNC] Ejected {} from slot {}", id, slot.0);
        }
        self.persistence.remove_from_mix(id)
    }

    /// Destroy a track's players and free its slot, leaving storage alone
    fn unload(&mut self, id: TrackId) -> Option<SlotId> {
        let loaded = self.tracks.remove(&id)?;
        let slot = loaded.slot;
        loaded.destroy();
        if let Some(entry) = self.slots.get_mut(slot.0) {
            *entry = None;
        }
        self.mixer.release_slot(slot);
        self.update_running();
        Some(slot)
    }

    /// Tie a running separation job to a track so eject cancels it
    pub fn register_separation(&mut self, id: TrackId, handle: CancelHandle) {
        if let Some(previous) = self.separations.insert(id, handle) {
            previous.cancel();
        }
    }

    /// Forget a finished separation job
    pub fn finish_separation(&mut self, id: TrackId) {
        if self.separations.remove(&id).is_some() {
            log::debug!("[SYNC] Separation for {} finished", id);
        }
    }

    /// Re-read a track after its metadata changed elsewhere
    pub fn reload_metadata(&mut self, id: TrackId) -> Result<()> {
        if !self.is_loaded(id) {
            return Ok(());
        }
        let track = self.persistence.load_track(id)?;
        let prefs = self.persistence.load_preferences(id)?;

        if let Some(loaded) = self.tracks.get_mut(&id) {
            loaded.track = track;
            loaded.prefs = prefs;
            loaded.regrid();
            let rate = loaded.rate();
            loaded.set_rate(rate);
            log::debug!("[SYNC] Reloaded metadata for {}", id);
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────
    // Transport
    // ─────────────────────────────────────────────────────────────────

    fn targets(&self, id: Option<TrackId>) -> Vec<TrackId> {
        match id {
            Some(id) if self.is_loaded(id) => vec![id],
            Some(_) => Vec::new(),
            None => self.tracks.keys().copied().collect(),
        }
    }

    fn update_running(&mut self) {
        let any_playing = self.tracks.values().any(|t| t.is_playing());
        if self.running != any_playing {
            log::debug!("[SYNC] Tick loop {}", if any_playing { "started" } else { "stopped" });
        }
        self.running = any_playing;
    }

    /// Start one track, or every loaded track in one pass
    pub fn play(&mut self, id: Option<TrackId>) {
        for target in self.targets(id) {
            if let Some(loaded) = self.tracks.get_mut(&target) {
                loaded.play();
            }
        }
        self.update_running();
    }

    /// Pause one track, or every loaded track
    pub fn pause(&mut self, id: Option<TrackId>) {
        for target in self.targets(id) {
            if let Some(loaded) = self.tracks.get_mut(&target) {
                loaded.pause();
            }
        }
        self.update_running();
    }

    /// Move a track (main and stems together) along its beat grid
    ///
    /// Returns the resolved position, or `None` when the track is not
    /// loaded.
    pub fn seek(
        &mut self,
        id: TrackId,
        time: Option<f64>,
        direction: Option<SeekDirection>,
    ) -> Option<f64> {
        let loaded = self.tracks.get_mut(&id)?;
        let current = loaded.main.refresh_position();
        let target = match loaded.grid.as_ref() {
            Some(grid) => resolve_seek(grid, current, time, direction),
            None => time.unwrap_or(current),
        };
        let target = target.clamp(0.0, loaded.track.duration_seconds.max(0.0));
        loaded.seek(target);
        log::debug!("[SYNC] {} seek {:.3}s -> {:.3}s", id, current, target);
        Some(target)
    }

    /// Produce a snapshot of the mix; `None` when nothing is playing
    ///
    /// Tracks that reached their end are paused.
    pub fn tick(&mut self) -> Option<MixSnapshot> {
        if !self.running {
            return None;
        }

        let mut tracks = Vec::with_capacity(self.tracks.len());
        for loaded in self.tracks.values_mut() {
            let position = loaded.main.refresh_position();
            for (_, handle) in &mut loaded.stems {
                handle.refresh_position();
            }

            if loaded.is_playing() && position >= loaded.track.duration_seconds {
                log::info!("[SYNC] {} reached the end", loaded.track.id);
                loaded.pause();
            }

            let stem_meters: Vec<(Stem, LevelMeter)> = loaded
                .stems
                .iter()
                .map(|(stem, handle)| (*stem, handle.meter()))
                .collect();
            let meter = if stem_meters.is_empty() {
                loaded.main.meter()
            } else {
                stem_meters
                    .iter()
                    .fold(LevelMeter::SILENT, |acc, (_, m)| acc.max(*m))
            };

            tracks.push(TrackSnapshot {
                id: loaded.track.id,
                slot: loaded.slot,
                position_seconds: position,
                duration_seconds: loaded.track.duration_seconds,
                is_playing: loaded.is_playing(),
                playback_rate: loaded.main.playback_rate(),
                gain: self.mixer.track_gain(loaded.slot),
                beat_index: loaded.grid.as_ref().and_then(|g| g.beat_index_at(position)),
                meter,
                stem_meters,
            });
        }

        self.update_running();
        Some(MixSnapshot {
            crossfader: self.mixer.crossfader(),
            tracks,
        })
    }

    // ─────────────────────────────────────────────────────────────────
    // Track settings
    // ─────────────────────────────────────────────────────────────────

    /// Set the mixpoint (default: the playhead), store it and go there
    pub fn set_mixpoint(&mut self, id: TrackId, time: Option<f64>) -> Result<()> {
        let Some(loaded) = self.tracks.get_mut(&id) else {
            return Ok(());
        };
        let time = match time {
            Some(t) => t,
            None => loaded.main.refresh_position(),
        };
        if (time - loaded.prefs.mixpoint_seconds).abs() < MIXPOINT_EPSILON {
            return Ok(());
        }

        self.persistence
            .save_preferences(id, TrackPreferencesPatch::mixpoint(time))?;
        loaded.prefs.mixpoint_seconds = time;
        loaded.seek(time);
        log::debug!("[SYNC] {} mixpoint set to {:.3}s", id, time);
        Ok(())
    }

    /// Change the adjusted tempo, rescaling main and stem rates together
    pub fn set_bpm(&mut self, id: TrackId, bpm: f64) -> Result<()> {
        if !bpm.is_finite() || bpm <= 0.0 {
            return Err(MixError::InvalidMetadata(format!(
                "bpm must be positive, got {}",
                bpm
            )));
        }
        let Some(loaded) = self.tracks.get_mut(&id) else {
            return Ok(());
        };

        self.persistence
            .save_preferences(id, TrackPreferencesPatch::adjusted_bpm(bpm))?;
        loaded.prefs.adjusted_bpm = Some(bpm);

        let was_playing = loaded.is_playing();
        if was_playing {
            loaded.pause();
        }
        let rate = loaded.rate();
        loaded.set_rate(rate);
        loaded.regrid();
        if was_playing {
            loaded.play();
        }

        log::info!("[SYNC] {} tempo {:.2} bpm (rate {:.4})", id, bpm, rate);
        Ok(())
    }

    /// Change grid subdivision
    pub fn set_beat_resolution(&mut self, id: TrackId, resolution: BeatResolution) -> Result<()> {
        let Some(loaded) = self.tracks.get_mut(&id) else {
            return Ok(());
        };
        if loaded.prefs.beat_resolution == resolution {
            return Ok(());
        }
        self.persistence
            .save_preferences(id, TrackPreferencesPatch::beat_resolution(resolution))?;
        loaded.prefs.beat_resolution = resolution;
        loaded.regrid();
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────
    // Gains
    // ─────────────────────────────────────────────────────────────────

    fn apply_gains(&mut self, id: TrackId) {
        let Some(loaded) = self.tracks.get_mut(&id) else {
            return;
        };
        let slot = loaded.slot;
        let track_gain = self.mixer.track_gain(slot);

        if loaded.stems.is_empty() {
            loaded.main.set_gain(track_gain);
            return;
        }

        let main_gain = if self.config.mute_main_with_stems { 0.0 } else { track_gain };
        loaded.main.set_gain(main_gain);
        for (stem, handle) in &mut loaded.stems {
            handle.set_gain(self.mixer.stem_gain(slot, *stem));
        }
    }

    /// Move the crossfader (percent, 0 = left slot)
    pub fn set_crossfader(&mut self, percent: f32) {
        self.mixer.set_crossfader(percent);
        let ids: Vec<TrackId> = self.tracks.keys().copied().collect();
        for id in ids {
            self.apply_gains(id);
        }
    }

    /// Set one stem's slider for a track
    pub fn set_stem_gain(&mut self, id: TrackId, stem: Stem, gain: f32) {
        let Some(slot) = self.tracks.get(&id).map(|t| t.slot) else {
            return;
        };
        self.mixer.set_stem_slider(slot, stem, gain);
        self.apply_gains(id);
    }

    // ─────────────────────────────────────────────────────────────────
    // Commands
    // ─────────────────────────────────────────────────────────────────

    /// Apply one command; failures are logged
    pub fn apply_command(&mut self, cmd: SyncCommand) {
        let result = match cmd {
            SyncCommand::Play(id) => {
                self.play(id);
                Ok(())
            }
            SyncCommand::Pause(id) => {
                self.pause(id);
                Ok(())
            }
            SyncCommand::Seek { id, time, direction } => {
                self.seek(id, time, direction);
                Ok(())
            }
            SyncCommand::SetMixpoint { id, time } => self.set_mixpoint(id, time),
            SyncCommand::SetBpm { id, bpm } => self.set_bpm(id, bpm),
            SyncCommand::SetBeatResolution { id, resolution } => {
                self.set_beat_resolution(id, resolution)
            }
            SyncCommand::SetCrossfader(percent) => {
                self.set_crossfader(percent);
                Ok(())
            }
            SyncCommand::SetStemGain { id, stem, gain } => {
                self.set_stem_gain(id, stem, gain);
                Ok(())
            }
            SyncCommand::Eject(id) => self.eject(id),
            SyncCommand::ReloadMetadata(id) => self.reload_metadata(id),
        };
        if let Err(e) = result {
            log::error!("[SYNC] Command failed: {}", e);
        }
    }

    /// Drain and apply every queued command; returns how many ran
    pub fn process_commands(&mut self, rx: &Receiver<SyncCommand>) -> usize {
        let mut count = 0;
        while let Ok(cmd) = rx.try_recv() {
            self.apply_command(cmd);
            count += 1;
        }
        count
    }
}
