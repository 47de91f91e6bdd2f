//! Bounded track asset cache
//!
//! Entries are keyed by `TrackId`. Ids are handed out in insertion order by
//! the persistence layer, so evicting the smallest id drops the oldest
//! track. This is not LRU: reading an entry does not refresh it.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::CacheConfig;
use crate::types::{Stem, TrackId, NUM_STEMS};

/// Immutable audio bytes shared between the cache and players
pub type Blob = Arc<[u8]>;

/// Optional blobs for the four stems of a track
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StemBlobs {
    blobs: [Option<Blob>; NUM_STEMS],
}

impl StemBlobs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, stem: Stem) -> Option<&Blob> {
        self.blobs[stem.index()].as_ref()
    }

    pub fn set(&mut self, stem: Stem, blob: Blob) {
        self.blobs[stem.index()] = Some(blob);
    }

    /// True once all four stems are present
    pub fn is_complete(&self) -> bool {
        self.blobs.iter().all(Option::is_some)
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.iter().all(Option::is_none)
    }

    /// Number of stems present
    pub fn count(&self) -> usize {
        self.blobs.iter().filter(|b| b.is_some()).count()
    }

    /// Copy every present stem from `other` over this set
    pub fn merge(&mut self, other: StemBlobs) {
        for (slot, blob) in self.blobs.iter_mut().zip(other.blobs) {
            if blob.is_some() {
                *slot = blob;
            }
        }
    }

    /// Present stems with their kind
    pub fn iter(&self) -> impl Iterator<Item = (Stem, &Blob)> {
        Stem::ALL
            .into_iter()
            .filter_map(move |stem| self.get(stem).map(|blob| (stem, blob)))
    }
}

#[derive(Debug, Clone, Default)]
struct CacheEntry {
    main: Option<Blob>,
    stems: StemBlobs,
}

/// Capacity-bounded cache of track and stem blobs
#[derive(Debug)]
pub struct TrackAssetCache {
    entries: BTreeMap<TrackId, CacheEntry>,
    capacity: usize,
}

impl Default for TrackAssetCache {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}

impl TrackAssetCache {
    /// Create a cache holding at most `capacity` tracks (minimum 1)
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: BTreeMap::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::with_capacity(config.capacity)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of cached tracks
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: TrackId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Main track bytes, if cached
    pub fn get(&self, id: TrackId) -> Option<Blob> {
        let blob = self.entries.get(&id).and_then(|e| e.main.clone());
        if blob.is_some() {
            log::debug!("[ASSET_CACHE] Cache hit for {}", id);
        }
        blob
    }

    /// Cached stems, if any stem of the track is present
    pub fn get_stems(&self, id: TrackId) -> Option<StemBlobs> {
        self.entries
            .get(&id)
            .filter(|e| !e.stems.is_empty())
            .map(|e| e.stems.clone())
    }

    /// Store the main track bytes
    pub fn put(&mut self, id: TrackId, blob: Blob) {
        log::debug!("[ASSET_CACHE] Stored {} ({} bytes)", id, blob.len());
        self.entry_mut(id).main = Some(blob);
    }

    /// Merge stems into the track's entry, keeping its main blob
    pub fn put_stems(&mut self, id: TrackId, stems: StemBlobs) {
        log::debug!("[ASSET_CACHE] Stored {} stems for {}", stems.count(), id);
        self.entry_mut(id).stems.merge(stems);
    }

    /// Store a single stem
    pub fn put_stem(&mut self, id: TrackId, stem: Stem, blob: Blob) {
        log::debug!("[ASSET_CACHE] Stored {} stem for {}", stem.name(), id);
        self.entry_mut(id).stems.set(stem, blob);
    }

    /// Drop a track's entry
    pub fn remove(&mut self, id: TrackId) -> bool {
        let removed = self.entries.remove(&id).is_some();
        if removed {
            log::debug!("[ASSET_CACHE] Removed {}", id);
        }
        removed
    }

    /// Get or create the entry for `id`, evicting the oldest other track if
    /// the new entry would exceed capacity.
    fn entry_mut(&mut self, id: TrackId) -> &mut CacheEntry {
        if !self.entries.contains_key(&id) {
            while self.entries.len() >= self.capacity {
                let Some(&oldest) = self.entries.keys().next() else {
                    break;
                };
                self.entries.remove(&oldest);
                log::info!("[ASSET_CACHE] Evicted {} (capacity {})", oldest, self.capacity);
            }
        }
        self.entries.entry(id).or_default()
    }
}
