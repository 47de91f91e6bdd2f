//! Playback engine - synchronizer, mixer, player handles
//!
//! This module contains the playback side of the mixing core:
//! - PlaybackSynchronizer: owns the players of both mix slots
//! - CrossfadeMixer: crossfader curve and per-stem sliders
//! - PlayerHandle: transport state over a backend player
//! - LevelMeter: RMS/peak of the latest output buffer
//! - SyncCommand: typed commands for queued control

mod command;
mod meter;
mod mixer;
mod player;
mod sync;

pub use command::*;
pub use meter::*;
pub use mixer::*;
pub use player::*;
pub use sync::*;
