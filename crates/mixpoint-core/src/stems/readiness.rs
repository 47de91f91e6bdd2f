//! Stem readiness state machine

use serde::Serialize;

use crate::assets::TrackAssetCache;
use crate::stems::StemStorage;
use crate::track::Track;

/// Where a track stands on the way to playable stems
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StemState {
    NeedsDirectory,
    NeedsPermission,
    NeedsSeparation,
    Separating,
    Converting,
    Ready,
    Error,
}

impl StemState {
    /// Whether `self -> to` is an allowed move
    ///
    /// Staying put is always allowed. Error is reachable from anywhere.
    pub fn can_transition_to(self, to: StemState) -> bool {
        use StemState::*;

        if self == to || to == Error {
            return true;
        }
        matches!(
            (self, to),
            (NeedsDirectory, NeedsPermission)
                | (NeedsDirectory | NeedsPermission | Ready | Error, NeedsSeparation)
                | (NeedsDirectory | NeedsPermission | NeedsSeparation | Error, Ready)
                | (Error, NeedsDirectory | NeedsPermission)
                | (NeedsSeparation, Separating)
                | (Separating, Converting)
                | (Converting, Ready)
                // cancelled job
                | (Separating | Converting, NeedsSeparation)
        )
    }
}

/// Readiness of one track's stems
#[derive(Debug, Clone)]
pub struct StemReadinessMachine {
    track: Track,
    state: StemState,
    job_in_flight: bool,
    last_error: Option<String>,
}

impl StemReadinessMachine {
    /// Start in `NeedsDirectory`; call `probe` to find the real state
    pub fn new(track: Track) -> Self {
        Self {
            track,
            state: StemState::NeedsDirectory,
            job_in_flight: false,
            last_error: None,
        }
    }

    pub fn state(&self) -> StemState {
        self.state
    }

    pub fn track(&self) -> &Track {
        &self.track
    }

    pub fn is_job_in_flight(&self) -> bool {
        self.job_in_flight
    }

    /// Reason for the last move to `Error`
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Determine the current state
    ///
    /// Only side effect besides updating the state: a complete stem set
    /// found on disk is put into the cache. While a separation job runs
    /// the probe returns the job state untouched.
    pub fn probe<S>(&mut self, cache: &mut TrackAssetCache, storage: &S) -> StemState
    where
        S: StemStorage + ?Sized,
    {
        if self.job_in_flight {
            log::debug!("[STEMS] Probe skipped for {}, job in flight", self.track.id);
            return self.state;
        }

        let probed = self.compute(cache, storage);
        if probed != self.state {
            log::info!(
                "[STEMS] {} probed {:?} -> {:?}",
                self.track.id,
                self.state,
                probed
            );
        }
        self.state = probed;
        probed
    }

    fn compute<S>(&mut self, cache: &mut TrackAssetCache, storage: &S) -> StemState
    where
        S: StemStorage + ?Sized,
    {
        let id = self.track.id;

        if cache.get_stems(id).is_some_and(|s| s.is_complete()) {
            return StemState::Ready;
        }

        if storage.directory().is_none() {
            return StemState::NeedsDirectory;
        }

        match storage.has_permission() {
            Ok(true) => {}
            Ok(false) => return StemState::NeedsPermission,
            Err(e) => return self.error_state(e.to_string()),
        }

        match storage.read_stems(&self.track.stems_folder_name()) {
            Ok(Some(stems)) => {
                cache.put_stems(id, stems);
                StemState::Ready
            }
            Ok(None) => StemState::NeedsSeparation,
            Err(e) => self.error_state(e.to_string()),
        }
    }

    fn error_state(&mut self, reason: String) -> StemState {
        log::error!("[STEMS] {}: {}", self.track.id, reason);
        self.last_error = Some(reason);
        StemState::Error
    }

    /// The user picked a stems directory
    pub fn directory_selected<S>(&mut self, cache: &mut TrackAssetCache, storage: &S) -> StemState
    where
        S: StemStorage + ?Sized,
    {
        self.probe(cache, storage)
    }

    /// The user granted access to the stems directory
    pub fn permission_granted<S>(&mut self, cache: &mut TrackAssetCache, storage: &S) -> StemState
    where
        S: StemStorage + ?Sized,
    {
        self.probe(cache, storage)
    }

    /// Move to `to` if the transition table allows it
    ///
    /// Returns false (and logs) for an illegal move. Moving to the current
    /// state is a no-op.
    pub fn transition(&mut self, to: StemState) -> bool {
        if self.state == to {
            return true;
        }
        if !self.state.can_transition_to(to) {
            log::warn!(
                "[STEMS] Rejected transition {:?} -> {:?} for {}",
                self.state,
                to,
                self.track.id
            );
            return false;
        }
        log::debug!("[STEMS] {} {:?} -> {:?}", self.track.id, self.state, to);
        self.state = to;
        true
    }

    /// Enter `Separating`; false if a job is already running or the track
    /// does not need separation
    pub fn begin_job(&mut self) -> bool {
        if self.job_in_flight {
            log::warn!("[STEMS] Separation already running for {}", self.track.id);
            return false;
        }
        if self.state != StemState::NeedsSeparation || !self.transition(StemState::Separating) {
            log::warn!(
                "[STEMS] Cannot start separation for {} in {:?}",
                self.track.id,
                self.state
            );
            return false;
        }
        self.job_in_flight = true;
        true
    }

    /// Leave the job with a final state
    pub(crate) fn end_job(&mut self, to: StemState) {
        self.job_in_flight = false;
        self.transition(to);
    }

    /// Move to `Error`, recording why
    pub fn fail(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        log::error!("[STEMS] {} failed: {}", self.track.id, reason);
        self.last_error = Some(reason);
        self.job_in_flight = false;
        self.state = StemState::Error;
    }
}
