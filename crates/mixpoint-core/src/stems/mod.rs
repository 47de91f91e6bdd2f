//! Stem availability and remote separation
//!
//! Each track's stems move through an explicit readiness state machine:
//!
//! ```text
//! NeedsDirectory ──► NeedsPermission ──► NeedsSeparation ──► Separating
//!       │                  │                   ▲                 │
//!       └──────────────────┴──► Ready ◄── Converting ◄──────────┘
//!                                 (any state) ──► Error
//! ```
//!
//! The probe decides the current state from the cache and the stems
//! directory. Remote separation drives the job states.

mod readiness;
mod separation;
mod storage;

pub use readiness::{StemReadinessMachine, StemState};
pub use separation::{
    cancel_pair, run_separation, CancelHandle, CancelToken, JobPoll, SeparationClient,
    SeparationJob, SeparationProgress, SeparationStage, StemPayload, Submission,
};
pub use storage::{stem_file_name, FsStemStorage, StemStorage, STEM_FILE_EXTENSION};
