//! Decoded audio asset caching and loading
//!
//! The cache keeps the raw bytes of recently used tracks and their stems so
//! re-entering a track into the mix never touches the file system twice.
//!
//! ```text
//! AssetLoader::track_bytes(id)
//!     │
//!     ├─► TrackAssetCache::get()      ← fast path
//!     └─► FileAccess::read_bytes()    ← miss, result cached
//! ```

mod cache;
mod loader;

pub use cache::{Blob, StemBlobs, TrackAssetCache};
pub use loader::AssetLoader;
