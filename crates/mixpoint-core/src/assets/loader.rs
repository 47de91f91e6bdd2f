//! Cache-first track loading

use std::sync::Arc;

use crate::assets::{Blob, TrackAssetCache};
use crate::config::CacheConfig;
use crate::error::{MixError, Result};
use crate::host::FileAccess;
use crate::types::TrackId;

/// Reads track bytes through the cache
pub struct AssetLoader<F: FileAccess> {
    files: F,
    cache: TrackAssetCache,
}

impl<F: FileAccess> AssetLoader<F> {
    pub fn new(files: F, cache: TrackAssetCache) -> Self {
        Self { files, cache }
    }

    /// Loader with an empty cache sized by the config
    pub fn from_config(files: F, config: &CacheConfig) -> Self {
        Self::new(files, TrackAssetCache::from_config(config))
    }

    /// Get the track bytes, reading and caching them on a miss
    ///
    /// Permission failures are returned to the caller so the host can
    /// prompt; they are never retried here.
    pub fn track_bytes(&mut self, id: TrackId) -> Result<Blob> {
        if let Some(blob) = self.cache.get(id) {
            return Ok(blob);
        }

        log::info!("[ASSET_CACHE] Cache miss, reading {}", id);
        match self.files.read_bytes(id) {
            Ok(bytes) => {
                let blob: Blob = Arc::from(bytes);
                self.cache.put(id, blob.clone());
                Ok(blob)
            }
            Err(e @ MixError::PermissionDenied(_)) => {
                log::warn!("[ASSET_CACHE] No permission to read {}: {}", id, e);
                Err(e)
            }
            Err(e) => {
                log::error!("[ASSET_CACHE] Failed to read {}: {}", id, e);
                Err(e)
            }
        }
    }

    pub fn cache(&self) -> &TrackAssetCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut TrackAssetCache {
        &mut self.cache
    }
}
