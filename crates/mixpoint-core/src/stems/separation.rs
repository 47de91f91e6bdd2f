//! Remote stem separation jobs
//!
//! A job uploads the track as base64, polls the service until it reports a
//! result, decodes the four stems and stores them. The stem machine moves
//! `NeedsSeparation -> Separating -> Converting -> Ready`, or to `Error` on
//! any failure. Cancelling returns it to `NeedsSeparation`.
//!
//! The waiting part (`SeparationJob::fetch`) holds no borrow of the stem
//! machine or the asset cache, so other tracks keep loading from the cache
//! while a job runs. `SeparationJob::apply` then settles the outcome in one
//! synchronous step.

use std::future::Future;
use std::sync::Arc;

use base64::prelude::{Engine as _, BASE64_STANDARD};
use serde::Deserialize;
use tokio::sync::watch;

use crate::assets::{Blob, StemBlobs, TrackAssetCache};
use crate::config::SeparationConfig;
use crate::error::{Result, SeparationError};
use crate::stems::{StemReadinessMachine, StemState, StemStorage};
use crate::types::{Stem, NUM_STEMS};

/// Accepted job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub job_id: String,
    /// Stems, when the service finished the job during submission
    pub done_now: Option<StemPayload>,
}

/// One status poll
#[derive(Debug, Clone, PartialEq)]
pub enum JobPoll {
    /// Still running, with the service's status message
    Pending(String),
    Done(StemPayload),
    Failed(String),
}

/// Base64-encoded stems as returned by the service
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StemPayload {
    pub drums: String,
    pub bass: String,
    pub vocals: String,
    pub other: String,
}

impl StemPayload {
    /// Parse a JSON job response body
    pub fn from_json(body: &str) -> std::result::Result<Self, SeparationError> {
        serde_json::from_str(body).map_err(|e| SeparationError::MalformedPayload(e.to_string()))
    }

    pub fn encoded(&self, stem: Stem) -> &str {
        match stem {
            Stem::Drums => &self.drums,
            Stem::Bass => &self.bass,
            Stem::Vocals => &self.vocals,
            Stem::Other => &self.other,
        }
    }

    /// Decode one stem
    pub fn decode(&self, stem: Stem) -> std::result::Result<Vec<u8>, SeparationError> {
        let bytes = BASE64_STANDARD.decode(self.encoded(stem)).map_err(|e| {
            SeparationError::MalformedPayload(format!("{} stem: {}", stem.name(), e))
        })?;
        if bytes.is_empty() {
            return Err(SeparationError::MalformedPayload(format!(
                "{} stem is empty",
                stem.name()
            )));
        }
        Ok(bytes)
    }
}

/// The remote separation service
pub trait SeparationClient {
    /// Submit a base64-encoded track
    fn submit(
        &self,
        track_base64: String,
    ) -> impl Future<Output = std::result::Result<Submission, SeparationError>> + Send;

    /// Ask for the status of a job
    fn poll(
        &self,
        job_id: &str,
    ) -> impl Future<Output = std::result::Result<JobPoll, SeparationError>> + Send;
}

/// Separation stage reported to progress callbacks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeparationStage {
    Submitting,
    Polling,
    Converting,
    Complete,
}

/// Progress update for a running job
#[derive(Debug, Clone, PartialEq)]
pub struct SeparationProgress {
    pub stage: SeparationStage,
    /// Polls so far
    pub attempt: u32,
    /// Status message from the service, or what we are doing
    pub message: String,
}

impl SeparationProgress {
    fn new(stage: SeparationStage, attempt: u32, message: impl Into<String>) -> Self {
        Self {
            stage,
            attempt,
            message: message.into(),
        }
    }
}

/// Owner side of a job's cancellation flag
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Job side of the cancellation flag
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancelled; never resolves if the handle is dropped
    pub async fn cancelled(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Create a linked cancel handle and token
pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx: Arc::new(tx) }, CancelToken { rx })
}

type ProgressFn<'a> = Box<dyn FnMut(SeparationProgress) + Send + 'a>;

/// A configured separation run
pub struct SeparationJob<'a, C: SeparationClient> {
    client: &'a C,
    config: &'a SeparationConfig,
    cancel: CancelToken,
    storage: Option<&'a mut (dyn StemStorage + Send)>,
    progress: Option<ProgressFn<'a>>,
}

impl<'a, C: SeparationClient> SeparationJob<'a, C> {
    pub fn new(client: &'a C, config: &'a SeparationConfig, cancel: CancelToken) -> Self {
        Self {
            client,
            config,
            cancel,
            storage: None,
            progress: None,
        }
    }

    /// Also write decoded stems into the stems directory
    pub fn with_storage(mut self, storage: &'a mut (dyn StemStorage + Send)) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn on_progress(mut self, f: impl FnMut(SeparationProgress) + Send + 'a) -> Self {
        self.progress = Some(Box::new(f));
        self
    }

    fn report(&mut self, progress: SeparationProgress) {
        if let Some(f) = self.progress.as_mut() {
            f(progress);
        }
    }

    /// Run the job to completion
    ///
    /// Shorthand for `begin_job`, `fetch` and `apply` when the caller can
    /// lend the machine and cache for the whole job. Returns the final stem
    /// state. A machine that is not waiting for separation, or already has
    /// a job running, is left untouched.
    pub async fn run(
        mut self,
        machine: &mut StemReadinessMachine,
        cache: &mut TrackAssetCache,
        track_bytes: &[u8],
    ) -> Result<StemState> {
        if !machine.begin_job() {
            return Ok(machine.state());
        }
        log::info!("[SEPARATION] Starting job for {}", machine.track().id);
        let outcome = self.fetch(track_bytes).await;
        self.apply(machine, cache, outcome)
    }

    /// Submit the track and wait for the service's stems
    ///
    /// Call `StemReadinessMachine::begin_job` first and hand the result to
    /// `apply`. Resolves early with `Cancelled` when the token fires.
    pub async fn fetch(
        &mut self,
        track_bytes: &[u8],
    ) -> std::result::Result<StemPayload, SeparationError> {
        let mut cancel = self.cancel.clone();
        tokio::select! {
            result = self.request(track_bytes) => result,
            _ = cancel.cancelled() => Err(SeparationError::Cancelled),
        }
    }

    /// Settle a fetched outcome into the machine and the cache
    ///
    /// Stems are decoded and written to storage first. The cache only sees
    /// them once all four made it, in a single insert.
    pub fn apply(
        &mut self,
        machine: &mut StemReadinessMachine,
        cache: &mut TrackAssetCache,
        outcome: std::result::Result<StemPayload, SeparationError>,
    ) -> Result<StemState> {
        let id = machine.track().id;
        if !machine.is_job_in_flight() {
            log::warn!("[SEPARATION] No job in flight for {}, ignoring result", id);
            return Ok(machine.state());
        }

        let outcome = outcome.and_then(|payload| {
            machine.transition(StemState::Converting);
            let stems = self.store(machine, &payload)?;
            cache.put_stems(id, stems);
            Ok(())
        });

        match outcome {
            Ok(()) => {
                machine.end_job(StemState::Ready);
                self.report(SeparationProgress::new(SeparationStage::Complete, 0, "stems ready"));
                log::info!("[SEPARATION] Stems ready for {}", id);
                Ok(StemState::Ready)
            }
            Err(SeparationError::Cancelled) => {
                log::info!("[SEPARATION] Job for {} cancelled", id);
                machine.end_job(StemState::NeedsSeparation);
                Err(SeparationError::Cancelled.into())
            }
            Err(e) => {
                log::error!("[SEPARATION] Job for {} failed: {}", id, e);
                machine.fail(e.to_string());
                Err(e.into())
            }
        }
    }

    /// Submit and poll until the service hands back a payload
    async fn request(
        &mut self,
        track_bytes: &[u8],
    ) -> std::result::Result<StemPayload, SeparationError> {
        self.report(SeparationProgress::new(SeparationStage::Submitting, 0, "uploading track"));
        let submission = self.client.submit(BASE64_STANDARD.encode(track_bytes)).await?;
        if let Some(payload) = submission.done_now {
            log::debug!("[SEPARATION] Job {} finished on submission", submission.job_id);
            return Ok(payload);
        }
        log::debug!("[SEPARATION] Submitted job {}", submission.job_id);

        let interval = self.config.poll_interval();
        let mut attempt: u32 = 0;

        loop {
            tokio::time::sleep(interval).await;
            attempt += 1;

            match self.client.poll(&submission.job_id).await? {
                JobPoll::Done(payload) => return Ok(payload),
                JobPoll::Failed(reason) => return Err(SeparationError::JobFailed(reason)),
                JobPoll::Pending(message) => {
                    if message.to_lowercase().contains("error") {
                        return Err(SeparationError::JobFailed(message));
                    }
                    log::debug!("[SEPARATION] Poll {}: {}", attempt, message);
                    self.report(SeparationProgress::new(SeparationStage::Polling, attempt, message));
                }
            }

            if self.config.max_polls.is_some_and(|max| attempt >= max) {
                return Err(SeparationError::JobFailed(format!(
                    "no result after {} polls",
                    attempt
                )));
            }
        }
    }

    /// Decode every stem and write them all to storage
    fn store(
        &mut self,
        machine: &StemReadinessMachine,
        payload: &StemPayload,
    ) -> std::result::Result<StemBlobs, SeparationError> {
        self.report(SeparationProgress::new(SeparationStage::Converting, 0, "decoding stems"));

        let mut decoded: Vec<(Stem, Vec<u8>)> = Vec::with_capacity(NUM_STEMS);
        for stem in Stem::ALL {
            decoded.push((stem, payload.decode(stem)?));
        }
        if self.cancel.is_cancelled() {
            return Err(SeparationError::Cancelled);
        }

        let folder = machine.track().stems_folder_name();
        let mut stems = StemBlobs::new();
        for (stem, bytes) in decoded {
            if let Some(storage) = self.storage.as_mut() {
                storage
                    .write_stem(&folder, stem, &bytes)
                    .map_err(|e| SeparationError::Storage(e.to_string()))?;
            }
            let blob: Blob = Arc::from(bytes);
            stems.set(stem, blob);
        }
        Ok(stems)
    }
}

/// Run a separation job with no stem storage and no progress callback
pub async fn run_separation<C: SeparationClient>(
    client: &C,
    machine: &mut StemReadinessMachine,
    cache: &mut TrackAssetCache,
    track_bytes: &[u8],
    config: &SeparationConfig,
    cancel: CancelToken,
) -> Result<StemState> {
    SeparationJob::new(client, config, cancel)
        .run(machine, cache, track_bytes)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MixError;
    use crate::assets::AssetLoader;
    use crate::test_support::{track, MockFiles, MockSeparationClient, MockStemStorage};
    use crate::types::TrackId;
    use std::sync::Mutex;

    fn fast_config() -> SeparationConfig {
        SeparationConfig {
            poll_interval_secs: 0.001,
            max_polls: Some(20),
        }
    }

    fn waiting_machine(cache: &mut TrackAssetCache) -> StemReadinessMachine {
        let storage = MockStemStorage::with_directory();
        let mut machine = StemReadinessMachine::new(track(7, 128.0, 0.0, 180.0));
        assert_eq!(machine.probe(cache, &storage), StemState::NeedsSeparation);
        machine
    }

    #[test]
    fn test_payload_from_json() {
        let payload = StemPayload::from_json(
            r#"{"drums":"AQ==","bass":"Ag==","vocals":"Aw==","other":"BA=="}"#,
        )
        .unwrap();
        assert_eq!(payload.decode(Stem::Vocals).unwrap(), vec![3]);

        assert!(matches!(
            StemPayload::from_json(r#"{"drums":"AQ=="}"#),
            Err(SeparationError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_bad_base64_is_malformed() {
        let mut payload = MockSeparationClient::payload();
        payload.bass = "not base64!".into();
        assert!(matches!(
            payload.decode(Stem::Bass),
            Err(SeparationError::MalformedPayload(_))
        ));
    }

    #[tokio::test]
    async fn test_successful_job_stores_all_stems() {
        let mut cache = TrackAssetCache::default();
        let mut machine = waiting_machine(&mut cache);
        let client = MockSeparationClient::pending_then_done(2);
        let (_handle, token) = cancel_pair();
        let seen = Mutex::new(Vec::new());

        let state = SeparationJob::new(&client, &fast_config(), token)
            .on_progress(|p| seen.lock().unwrap().push(p.stage))
            .run(&mut machine, &mut cache, b"track bytes")
            .await
            .unwrap();

        assert_eq!(state, StemState::Ready);
        assert_eq!(machine.state(), StemState::Ready);
        assert!(!machine.is_job_in_flight());
        assert!(cache.get_stems(machine.track().id).unwrap().is_complete());
        assert_eq!(client.submitted(), Some(BASE64_STANDARD.encode(b"track bytes")));

        let seen = seen.into_inner().unwrap();
        assert_eq!(seen.first(), Some(&SeparationStage::Submitting));
        assert_eq!(seen.last(), Some(&SeparationStage::Complete));
        assert_eq!(
            seen.iter().filter(|s| **s == SeparationStage::Polling).count(),
            2
        );
    }

    #[tokio::test]
    async fn test_error_in_status_message_is_terminal() {
        let mut cache = TrackAssetCache::default();
        let mut machine = waiting_machine(&mut cache);
        let client = MockSeparationClient::with_polls(vec![
            JobPoll::Pending("queued".into()),
            JobPoll::Pending("Internal ERROR: out of memory".into()),
        ]);
        let (_handle, token) = cancel_pair();

        let result = run_separation(&client, &mut machine, &mut cache, b"x", &fast_config(), token).await;

        assert!(matches!(
            result,
            Err(MixError::Separation(SeparationError::JobFailed(_)))
        ));
        assert_eq!(machine.state(), StemState::Error);
        assert!(cache.get_stems(machine.track().id).is_none());
    }

    #[tokio::test]
    async fn test_malformed_stem_stores_nothing() {
        let mut cache = TrackAssetCache::default();
        let mut machine = waiting_machine(&mut cache);
        let mut payload = MockSeparationClient::payload();
        payload.other = String::new();
        let client = MockSeparationClient::with_polls(vec![JobPoll::Done(payload)]);
        let (_handle, token) = cancel_pair();

        let result = run_separation(&client, &mut machine, &mut cache, b"x", &fast_config(), token).await;

        assert!(result.is_err());
        assert_eq!(machine.state(), StemState::Error);
        assert!(cache.get_stems(machine.track().id).is_none());
    }

    #[tokio::test]
    async fn test_max_polls_gives_up() {
        let mut cache = TrackAssetCache::default();
        let mut machine = waiting_machine(&mut cache);
        let client = MockSeparationClient::pending_then_done(50);
        let (_handle, token) = cancel_pair();
        let config = SeparationConfig {
            poll_interval_secs: 0.001,
            max_polls: Some(3),
        };

        let result = run_separation(&client, &mut machine, &mut cache, b"x", &config, token).await;

        assert!(result.is_err());
        assert_eq!(client.poll_count(), 3);
        assert_eq!(machine.state(), StemState::Error);
    }

    #[tokio::test]
    async fn test_cancel_returns_to_needs_separation() {
        let mut cache = TrackAssetCache::default();
        let mut machine = waiting_machine(&mut cache);
        let client = MockSeparationClient::pending_then_done(1000);
        let (handle, token) = cancel_pair();
        handle.cancel();

        let result = run_separation(&client, &mut machine, &mut cache, b"x", &fast_config(), token).await;

        assert!(matches!(
            result,
            Err(MixError::Separation(SeparationError::Cancelled))
        ));
        assert_eq!(machine.state(), StemState::NeedsSeparation);
        assert!(!machine.is_job_in_flight());
    }

    #[tokio::test]
    async fn test_done_now_returns_stems_without_polling() {
        let mut cache = TrackAssetCache::default();
        let mut machine = waiting_machine(&mut cache);
        let client = MockSeparationClient::with_polls(vec![]).done_now();
        let (_handle, token) = cancel_pair();
        let mut storage = MockStemStorage::with_directory();
        let config = SeparationConfig {
            poll_interval_secs: 60.0,
            max_polls: None,
        };

        let state = SeparationJob::new(&client, &config, token)
            .with_storage(&mut storage)
            .run(&mut machine, &mut cache, b"x")
            .await
            .unwrap();

        assert_eq!(state, StemState::Ready);
        assert_eq!(client.poll_count(), 0);
        assert_eq!(storage.written.len(), 4);
        assert!(cache.get_stems(machine.track().id).unwrap().is_complete());
    }

    #[tokio::test]
    async fn test_failed_storage_write_leaves_cache_untouched() {
        let mut cache = TrackAssetCache::default();
        let mut machine = waiting_machine(&mut cache);
        let client = MockSeparationClient::pending_then_done(0);
        let (_handle, token) = cancel_pair();
        let mut storage = MockStemStorage::with_directory();
        storage.fail_write_on = Some(Stem::Vocals);

        let result = SeparationJob::new(&client, &fast_config(), token)
            .with_storage(&mut storage)
            .run(&mut machine, &mut cache, b"x")
            .await;

        assert!(matches!(
            result,
            Err(MixError::Separation(SeparationError::Storage(_)))
        ));
        assert_eq!(machine.state(), StemState::Error);
        assert!(!machine.is_job_in_flight());
        assert!(cache.get_stems(machine.track().id).is_none());
        assert_eq!(storage.written.len(), 2);
    }

    #[tokio::test]
    async fn test_cache_stays_usable_while_job_waits() {
        let other = TrackId(8);
        let files = MockFiles::default().with_track(other, vec![5, 6]);
        let mut loader = AssetLoader::new(files, TrackAssetCache::default());
        let storage = MockStemStorage::with_directory();
        let mut machine = StemReadinessMachine::new(track(7, 128.0, 0.0, 180.0));
        assert_eq!(
            machine.probe(loader.cache_mut(), &storage),
            StemState::NeedsSeparation
        );

        let client = MockSeparationClient::pending_then_done(1);
        let (_handle, token) = cancel_pair();
        let config = fast_config();
        let mut job = SeparationJob::new(&client, &config, token);

        assert!(machine.begin_job());
        let (outcome, (other_bytes, probed)) = tokio::join!(job.fetch(b"x"), async {
            let bytes = loader.track_bytes(other);
            let probed = machine.probe(loader.cache_mut(), &storage);
            (bytes, probed)
        });

        assert_eq!(other_bytes.unwrap().as_ref(), &[5u8, 6][..]);
        assert_eq!(probed, StemState::Separating);

        let state = job.apply(&mut machine, loader.cache_mut(), outcome).unwrap();
        assert_eq!(state, StemState::Ready);
        assert!(loader.cache().contains(other));
        assert!(loader.cache().get_stems(TrackId(7)).unwrap().is_complete());
    }

    #[test]
    fn test_apply_without_job_is_ignored() {
        let mut cache = TrackAssetCache::default();
        let mut machine = waiting_machine(&mut cache);
        let client = MockSeparationClient::default();
        let (_handle, token) = cancel_pair();
        let config = fast_config();

        let state = SeparationJob::new(&client, &config, token)
            .apply(&mut machine, &mut cache, Ok(MockSeparationClient::payload()))
            .unwrap();

        assert_eq!(state, StemState::NeedsSeparation);
        assert!(cache.get_stems(machine.track().id).is_none());
    }

    #[tokio::test]
    async fn test_job_refused_when_not_waiting_for_separation() {
        let mut cache = TrackAssetCache::default();
        let mut machine = StemReadinessMachine::new(track(7, 128.0, 0.0, 180.0));
        let client = MockSeparationClient::pending_then_done(0);
        let (_handle, token) = cancel_pair();

        let state = run_separation(&client, &mut machine, &mut cache, b"x", &fast_config(), token)
            .await
            .unwrap();

        assert_eq!(state, StemState::NeedsDirectory);
        assert_eq!(client.poll_count(), 0);
        assert!(client.submitted().is_none());
    }
}
