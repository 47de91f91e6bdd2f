//! In-memory track library
//!
//! A `Persistence` implementation backed by plain maps. Hosts with a real
//! database implement the trait themselves; this one serves embedded use
//! and tests.

use std::collections::BTreeMap;

use crate::error::{MixError, Result};
use crate::host::Persistence;
use crate::prefs::{MixPrefsPatch, PreferenceStore, PrefsPatch};
use crate::track::{Track, TrackPreferences, TrackPreferencesPatch};
use crate::types::{SlotId, TrackId};

/// Tracks plus their preferences
#[derive(Debug, Clone, Default)]
pub struct MemoryLibrary {
    tracks: BTreeMap<TrackId, Track>,
    prefs: PreferenceStore,
}

impl MemoryLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next free id (auto-increment, never reused while higher ids exist)
    pub fn next_id(&self) -> TrackId {
        TrackId(self.tracks.keys().next_back().map(|id| id.0 + 1).unwrap_or(1))
    }

    /// Insert or replace a track
    pub fn insert_track(&mut self, track: Track) {
        log::debug!("[LIBRARY] Stored {} ({})", track.id, track.name);
        self.tracks.insert(track.id, track);
    }

    /// Delete a track and its preferences
    pub fn remove_track(&mut self, id: TrackId) -> Option<Track> {
        self.prefs.forget_track(id);
        self.tracks.remove(&id)
    }

    /// Mutable access for edits such as a user beat-offset override
    pub fn track_mut(&mut self, id: TrackId) -> Option<&mut Track> {
        self.tracks.get_mut(&id)
    }

    /// Put a track into a mix slot
    pub fn assign_slot(&mut self, slot: SlotId, id: TrackId) {
        self.prefs.apply(PrefsPatch::Mix(MixPrefsPatch {
            slot: Some((slot, Some(id))),
            ..Default::default()
        }));
    }

    pub fn prefs(&self) -> &PreferenceStore {
        &self.prefs
    }

    pub fn prefs_mut(&mut self) -> &mut PreferenceStore {
        &mut self.prefs
    }
}

impl Persistence for MemoryLibrary {
    fn load_track(&self, id: TrackId) -> Result<Track> {
        self.tracks
            .get(&id)
            .cloned()
            .ok_or(MixError::TrackNotFound(id))
    }

    fn load_preferences(&self, id: TrackId) -> Result<TrackPreferences> {
        if !self.tracks.contains_key(&id) {
            return Err(MixError::TrackNotFound(id));
        }
        Ok(self.prefs.track(id))
    }

    fn save_preferences(&mut self, id: TrackId, patch: TrackPreferencesPatch) -> Result<()> {
        if !self.tracks.contains_key(&id) {
            return Err(MixError::TrackNotFound(id));
        }
        self.prefs.merge_track(id, &patch);
        Ok(())
    }

    fn remove_from_mix(&mut self, id: TrackId) -> Result<()> {
        if let Some(slot) = self.prefs.remove_from_mix(id) {
            log::debug!("[LIBRARY] {} left mix slot {}", id, slot.0);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(id: u64) -> Track {
        Track {
            id: TrackId(id),
            name: format!("track-{}.mp3", id),
            duration_seconds: 120.0,
            bpm: 124.0,
            beat_offset_seconds: 0.1,
            adjusted_beat_offset_seconds: None,
        }
    }

    #[test]
    fn test_next_id_is_auto_increment() {
        let mut lib = MemoryLibrary::new();
        assert_eq!(lib.next_id(), TrackId(1));
        lib.insert_track(track(1));
        lib.insert_track(track(5));
        assert_eq!(lib.next_id(), TrackId(6));
    }

    #[test]
    fn test_unknown_track_is_an_error() {
        let mut lib = MemoryLibrary::new();
        assert!(matches!(lib.load_track(TrackId(2)), Err(MixError::TrackNotFound(_))));
        assert!(lib
            .save_preferences(TrackId(2), TrackPreferencesPatch::mixpoint(1.0))
            .is_err());
    }

    #[test]
    fn test_preferences_roundtrip_through_trait() {
        let mut lib = MemoryLibrary::new();
        lib.insert_track(track(1));
        lib.save_preferences(TrackId(1), TrackPreferencesPatch::mixpoint(30.0))
            .unwrap();
        assert_eq!(lib.load_preferences(TrackId(1)).unwrap().mixpoint_seconds, 30.0);
    }

    #[test]
    fn test_remove_from_mix_frees_slot() {
        let mut lib = MemoryLibrary::new();
        lib.insert_track(track(1));
        lib.assign_slot(SlotId::LEFT, TrackId(1));
        lib.remove_from_mix(TrackId(1)).unwrap();
        assert_eq!(lib.prefs().mix().tracks, [None, None]);
        // idempotent
        lib.remove_from_mix(TrackId(1)).unwrap();
    }
}
