//! Test doubles for the host-facing traits

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::collections::{HashMap, HashSet, VecDeque};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use base64::prelude::{Engine as _, BASE64_STANDARD};

use crate::assets::{Blob, StemBlobs};
use crate::engine::{AudioBackend, AudioPlayer};
use crate::error::{MixError, Result, SeparationError};
use crate::host::FileAccess;
use crate::stems::{JobPoll, SeparationClient, StemPayload, StemStorage, Submission};
use crate::track::Track;
use crate::types::{Stem, StereoSample, TrackId};

pub fn track(id: u64, bpm: f64, offset: f64, duration: f64) -> Track {
    Track {
        id: TrackId(id),
        name: format!("Track {}.mp3", id),
        duration_seconds: duration,
        bpm,
        beat_offset_seconds: offset,
        adjusted_beat_offset_seconds: None,
    }
}

pub fn blob(bytes: &[u8]) -> Blob {
    Arc::from(bytes.to_vec())
}

// ─────────────────────────────────────────────────────────────────────
// Audio backend
// ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct MockPlayerState {
    pub playing: bool,
    pub play_calls: usize,
    pub pause_calls: usize,
    pub time: f64,
    pub rate: f32,
    pub gain: f32,
    pub disconnected: bool,
}

/// Player whose state is shared with its clones for inspection
///
/// Each blob byte becomes one mono frame at `byte / 100`.
#[derive(Debug, Clone, Default)]
pub struct MockPlayer {
    state: Rc<RefCell<MockPlayerState>>,
    frames: Vec<StereoSample>,
}

impl MockPlayer {
    fn from_blob(blob: &[u8]) -> Self {
        Self {
            state: Rc::default(),
            frames: blob.iter().map(|&b| StereoSample::mono(b as f32 / 100.0)).collect(),
        }
    }

    pub fn state(&self) -> Ref<'_, MockPlayerState> {
        self.state.borrow()
    }

    pub fn state_mut(&self) -> RefMut<'_, MockPlayerState> {
        self.state.borrow_mut()
    }
}

impl AudioPlayer for MockPlayer {
    fn play(&mut self) {
        let mut s = self.state_mut();
        s.playing = true;
        s.play_calls += 1;
    }

    fn pause(&mut self) {
        let mut s = self.state_mut();
        s.playing = false;
        s.pause_calls += 1;
    }

    fn seek(&mut self, seconds: f64) {
        self.state_mut().time = seconds;
    }

    fn set_rate(&mut self, rate: f32) {
        self.state_mut().rate = rate;
    }

    fn set_gain(&mut self, gain: f32) {
        self.state_mut().gain = gain;
    }

    fn current_time(&self) -> f64 {
        self.state().time
    }

    fn latest_frames(&self) -> &[StereoSample] {
        &self.frames
    }

    fn disconnect(&mut self) {
        self.state_mut().disconnected = true;
    }
}

#[derive(Debug, Default)]
pub struct MockBackend {
    opens: usize,
    players: Vec<MockPlayer>,
}

impl MockBackend {
    pub fn context_opens(&self) -> usize {
        self.opens
    }

    /// Every player created so far, in creation order
    pub fn players(&self) -> &[MockPlayer] {
        &self.players
    }
}

impl AudioBackend for MockBackend {
    type Player = MockPlayer;

    fn open_context(&mut self) -> Result<()> {
        self.opens += 1;
        Ok(())
    }

    fn create_player(&mut self, blob: Blob) -> Result<MockPlayer> {
        if self.opens == 0 {
            return Err(MixError::Backend("context not open".into()));
        }
        let player = MockPlayer::from_blob(&blob);
        self.players.push(player.clone());
        Ok(player)
    }
}

// ─────────────────────────────────────────────────────────────────────
// Files and stems
// ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MockFiles {
    tracks: HashMap<TrackId, Vec<u8>>,
    denied: HashSet<TrackId>,
    reads: Rc<Cell<usize>>,
}

impl MockFiles {
    pub fn with_track(mut self, id: TrackId, bytes: Vec<u8>) -> Self {
        self.tracks.insert(id, bytes);
        self
    }

    pub fn deny(mut self, id: TrackId) -> Self {
        self.denied.insert(id);
        self
    }

    pub fn reads(&self) -> Rc<Cell<usize>> {
        self.reads.clone()
    }
}

impl FileAccess for MockFiles {
    fn read_bytes(&self, id: TrackId) -> Result<Vec<u8>> {
        self.reads.set(self.reads.get() + 1);
        if self.denied.contains(&id) {
            return Err(MixError::PermissionDenied(format!("{}", id)));
        }
        self.tracks.get(&id).cloned().ok_or(MixError::TrackNotFound(id))
    }
}

#[derive(Debug, Default)]
pub struct MockStemStorage {
    pub directory: Option<PathBuf>,
    pub permission: bool,
    pub fail_reads: bool,
    /// Writes of this stem fail
    pub fail_write_on: Option<Stem>,
    pub sets: HashMap<String, StemBlobs>,
    pub written: Vec<(String, Stem)>,
}

impl MockStemStorage {
    pub fn with_directory() -> Self {
        Self {
            directory: Some(PathBuf::from("/stems")),
            permission: true,
            ..Self::default()
        }
    }

    /// Store four stems with peaks 0.1, 0.2, 0.3 and 0.4
    pub fn add_complete_set(&mut self, folder: &str) {
        let mut stems = StemBlobs::new();
        for stem in Stem::ALL {
            stems.set(stem, blob(&[(stem.index() as u8 + 1) * 10]));
        }
        self.sets.insert(folder.to_string(), stems);
    }
}

impl StemStorage for MockStemStorage {
    fn directory(&self) -> Option<&Path> {
        self.directory.as_deref()
    }

    fn has_permission(&self) -> Result<bool> {
        Ok(self.permission)
    }

    fn read_stems(&self, folder: &str) -> Result<Option<StemBlobs>> {
        if self.fail_reads {
            return Err(MixError::Io(std::io::Error::other("disk unplugged")));
        }
        Ok(self.sets.get(folder).filter(|s| s.is_complete()).cloned())
    }

    fn write_stem(&mut self, folder: &str, stem: Stem, bytes: &[u8]) -> Result<()> {
        if self.fail_write_on == Some(stem) {
            return Err(MixError::Io(std::io::Error::other("disk full")));
        }
        self.written.push((folder.to_string(), stem));
        self.sets
            .entry(folder.to_string())
            .or_default()
            .set(stem, blob(bytes));
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────
// Separation service
// ─────────────────────────────────────────────────────────────────────

/// Scripted separation service; an exhausted script keeps answering
/// "processing"
#[derive(Debug, Default)]
pub struct MockSeparationClient {
    polls: Mutex<VecDeque<JobPoll>>,
    submitted: Mutex<Option<String>>,
    poll_count: AtomicU32,
    done_now: Option<StemPayload>,
}

impl MockSeparationClient {
    pub fn with_polls(polls: Vec<JobPoll>) -> Self {
        Self {
            polls: Mutex::new(polls.into()),
            ..Self::default()
        }
    }

    pub fn pending_then_done(pending: usize) -> Self {
        let mut polls: Vec<JobPoll> = (0..pending)
            .map(|i| JobPoll::Pending(format!("processing ({})", i)))
            .collect();
        polls.push(JobPoll::Done(Self::payload()));
        Self::with_polls(polls)
    }

    /// Finish during submission, returning the stems right away
    pub fn done_now(mut self) -> Self {
        self.done_now = Some(Self::payload());
        self
    }

    pub fn payload() -> StemPayload {
        StemPayload {
            drums: BASE64_STANDARD.encode([1u8]),
            bass: BASE64_STANDARD.encode([2u8]),
            vocals: BASE64_STANDARD.encode([3u8]),
            other: BASE64_STANDARD.encode([4u8]),
        }
    }

    pub fn submitted(&self) -> Option<String> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn poll_count(&self) -> u32 {
        self.poll_count.load(Ordering::SeqCst)
    }
}

impl SeparationClient for MockSeparationClient {
    fn submit(
        &self,
        track_base64: String,
    ) -> impl Future<Output = std::result::Result<Submission, SeparationError>> + Send {
        *self.submitted.lock().unwrap() = Some(track_base64);
        let done_now = self.done_now.clone();
        async move {
            Ok(Submission {
                job_id: "job-1".to_string(),
                done_now,
            })
        }
    }

    fn poll(
        &self,
        _job_id: &str,
    ) -> impl Future<Output = std::result::Result<JobPoll, SeparationError>> + Send {
        self.poll_count.fetch_add(1, Ordering::SeqCst);
        let next = self.polls.lock().unwrap().pop_front();
        async move { Ok(next.unwrap_or_else(|| JobPoll::Pending("processing".to_string()))) }
    }
}
