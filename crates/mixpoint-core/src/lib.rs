//! Mixpoint Core - beat-grid and synchronized playback engine for DJ mixing
//!
//! Turns track metadata into beat grids, keeps the players of two tracks
//! (and their stems) in lockstep, computes crossfade gains, caches audio
//! assets and tracks stem readiness including remote separation.
//!
//! The host supplies persistence, file access, BPM detection, stem
//! storage, the separation service and the audio backend through the
//! traits in [`host`], [`stems`] and [`engine`].

pub mod analysis;
pub mod assets;
pub mod config;
pub mod engine;
pub mod error;
pub mod grid;
pub mod host;
pub mod library;
pub mod prefs;
pub mod stems;
pub mod track;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{MixError, Result, SeparationError};
pub use types::*;
