//! Preference domains
//!
//! Preferences are split into three closed domains (mix, set, user) plus
//! per-track preferences. Every write is a partial patch merged over the
//! latest snapshot, and every snapshot carries the time of its last write.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::track::{TrackPreferences, TrackPreferencesPatch};
use crate::types::{SlotId, TrackId, MIX_SLOTS};

/// Known preference domains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrefsDomain {
    Mix,
    Set,
    User,
}

/// The active mix: which tracks sit in the two slots, and the crossfader
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixPrefs {
    pub tracks: [Option<TrackId>; MIX_SLOTS],
    /// Crossfader position in percent (0 = left, 100 = right)
    pub crossfader: f32,
}

impl Default for MixPrefs {
    fn default() -> Self {
        Self {
            tracks: [None; MIX_SLOTS],
            crossfader: 50.0,
        }
    }
}

impl MixPrefs {
    /// Slot holding `id`, if any
    pub fn slot_of(&self, id: TrackId) -> Option<SlotId> {
        self.tracks
            .iter()
            .position(|t| *t == Some(id))
            .map(SlotId)
    }
}

/// A saved set of tracks
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SetPrefs {
    pub tracks: Vec<TrackId>,
}

/// User-wide settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserPrefs {
    /// Folder where separated stems are kept
    pub stems_directory: Option<PathBuf>,
    /// Whether the user opted in to remote stem separation
    pub separation_enabled: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MixPrefsPatch {
    pub slot: Option<(SlotId, Option<TrackId>)>,
    pub crossfader: Option<f32>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SetPrefsPatch {
    pub tracks: Option<Vec<TrackId>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserPrefsPatch {
    pub stems_directory: Option<Option<PathBuf>>,
    pub separation_enabled: Option<bool>,
}

/// A partial update to one domain
#[derive(Debug, Clone, PartialEq)]
pub enum PrefsPatch {
    Mix(MixPrefsPatch),
    Set(SetPrefsPatch),
    User(UserPrefsPatch),
}

impl PrefsPatch {
    pub fn domain(&self) -> PrefsDomain {
        match self {
            PrefsPatch::Mix(_) => PrefsDomain::Mix,
            PrefsPatch::Set(_) => PrefsDomain::Set,
            PrefsPatch::User(_) => PrefsDomain::User,
        }
    }
}

/// A value with the time it was last written
#[derive(Debug, Clone, PartialEq)]
pub struct Stamped<T> {
    pub value: T,
    pub updated_at: DateTime<Utc>,
}

impl<T> Stamped<T> {
    fn new(value: T) -> Self {
        Self {
            value,
            updated_at: Utc::now(),
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl<T: Default> Default for Stamped<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

/// In-memory preference snapshots for all domains
#[derive(Debug, Clone, Default)]
pub struct PreferenceStore {
    mix: Stamped<MixPrefs>,
    set: Stamped<SetPrefs>,
    user: Stamped<UserPrefs>,
    tracks: BTreeMap<TrackId, Stamped<TrackPreferences>>,
}

impl PreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mix(&self) -> &MixPrefs {
        &self.mix.value
    }

    pub fn set(&self) -> &SetPrefs {
        &self.set.value
    }

    pub fn user(&self) -> &UserPrefs {
        &self.user.value
    }

    /// Time of the last write to a domain
    pub fn updated_at(&self, domain: PrefsDomain) -> DateTime<Utc> {
        match domain {
            PrefsDomain::Mix => self.mix.updated_at,
            PrefsDomain::Set => self.set.updated_at,
            PrefsDomain::User => self.user.updated_at,
        }
    }

    /// Merge a patch into its domain
    pub fn apply(&mut self, patch: PrefsPatch) {
        log::debug!("[PREFS] Applying {:?} patch", patch.domain());
        match patch {
            PrefsPatch::Mix(p) => {
                let mix = &mut self.mix.value;
                if let Some((slot, track)) = p.slot {
                    if let Some(entry) = mix.tracks.get_mut(slot.0) {
                        *entry = track;
                    }
                }
                if let Some(crossfader) = p.crossfader {
                    mix.crossfader = crossfader.clamp(0.0, 100.0);
                }
                self.mix.touch();
            }
            PrefsPatch::Set(p) => {
                if let Some(tracks) = p.tracks {
                    self.set.value.tracks = tracks;
                }
                self.set.touch();
            }
            PrefsPatch::User(p) => {
                let user = &mut self.user.value;
                if let Some(dir) = p.stems_directory {
                    user.stems_directory = dir;
                }
                if let Some(enabled) = p.separation_enabled {
                    user.separation_enabled = enabled;
                }
                self.user.touch();
            }
        }
    }

    /// Current preferences for a track (defaults if never written)
    pub fn track(&self, id: TrackId) -> TrackPreferences {
        self.tracks
            .get(&id)
            .map(|s| s.value.clone())
            .unwrap_or_default()
    }

    /// Time of the last write to a track's preferences
    pub fn track_updated_at(&self, id: TrackId) -> Option<DateTime<Utc>> {
        self.tracks.get(&id).map(|s| s.updated_at)
    }

    /// Merge a partial update over a track's latest preferences
    pub fn merge_track(&mut self, id: TrackId, patch: &TrackPreferencesPatch) {
        let entry = self.tracks.entry(id).or_default();
        entry.value.apply(patch);
        entry.touch();
    }

    /// Remove a track from whichever mix slot holds it
    pub fn remove_from_mix(&mut self, id: TrackId) -> Option<SlotId> {
        let slot = self.mix.value.slot_of(id)?;
        self.apply(PrefsPatch::Mix(MixPrefsPatch {
            slot: Some((slot, None)),
            ..Default::default()
        }));
        Some(slot)
    }

    /// Forget a deleted track entirely
    pub fn forget_track(&mut self, id: TrackId) {
        self.tracks.remove(&id);
        self.remove_from_mix(id);
        if self.set.value.tracks.contains(&id) {
            self.set.value.tracks.retain(|t| *t != id);
            self.set.touch();
        }
    }
}
