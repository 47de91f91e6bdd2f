//! Error types for the mixing core

use thiserror::Error;

use crate::types::TrackId;

/// Errors surfaced by mixing core operations
///
/// Cache misses and operations on torn-down players are not errors; they
/// are `None` results and silent no-ops respectively.
#[derive(Error, Debug)]
pub enum MixError {
    /// Bad or missing BPM/duration; the track stays loaded but ungridded
    #[error("Invalid track metadata: {0}")]
    InvalidMetadata(String),

    /// File or directory access refused; re-prompted on the next user action
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// BPM detection could not determine a tempo
    #[error("BPM detection failed: {0}")]
    DetectionFailure(String),

    #[error(transparent)]
    Separation(#[from] SeparationError),

    #[error("Track not found: {0}")]
    TrackNotFound(TrackId),

    #[error("No mix slot {0}")]
    InvalidSlot(usize),

    /// The audio backend refused to open a context or create a player
    #[error("Audio backend error: {0}")]
    Backend(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MixError {
    /// Map an I/O error, keeping permission failures distinguishable
    pub fn from_io(context: impl std::fmt::Display, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::PermissionDenied {
            MixError::PermissionDenied(format!("{}: {}", context, err))
        } else {
            MixError::Io(err)
        }
    }
}

/// Errors from the remote stem separation job
#[derive(Error, Debug)]
pub enum SeparationError {
    /// The service reported a terminal failure for the job
    #[error("Separation job failed: {0}")]
    JobFailed(String),

    /// The job finished but its stem payload could not be decoded
    #[error("Malformed stem payload: {0}")]
    MalformedPayload(String),

    /// The job was cancelled (track ejected)
    #[error("Separation cancelled")]
    Cancelled,

    /// Transport-level failure talking to the service
    #[error("Separation service error: {0}")]
    Service(String),

    /// A decoded stem could not be written to the stems directory
    #[error("Failed to store stem: {0}")]
    Storage(String),
}

/// Result type for mixing core operations
pub type Result<T> = std::result::Result<T, MixError>;
