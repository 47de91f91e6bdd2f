//! Beat grid computation and grid-relative seeking
//!
//! - [`compute_grid`] turns a track's timing metadata into beat markers
//! - [`resolve_seek`] snaps or steps a seek request against those markers
//!
//! The grid is a derived view: it is never persisted and is recomputed
//! whenever the adjusted BPM, adjusted offset or resolution change.

mod calculator;
mod seek;

pub use calculator::{compute_grid, BeatGrid};
pub use seek::resolve_seek;
