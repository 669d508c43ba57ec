use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::config::SessionConfig;
use super::events::{EventBus, SessionEvent};
use super::stats::{SessionStats, StopSummary};
use crate::audio::{
    merge_chunks_to_wav, AudioChunk, CaptureDevice, ChunkRecorder, RecorderError, RecorderStream,
};
use crate::meeting::{
    run_analysis, Analyzer, MeetingPatch, MeetingRecord, MeetingStatus, MeetingStore,
    PersistenceError, MIN_TRANSCRIPT_CHARS,
};
use crate::transcript::{TranscriptAccumulator, TranscriptFragment};
use crate::transcription::{Transcriber, TranscriberFactory};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    NotStarted,
    Creating,
    Active,
    Stopping,
    Finalizing,
    Done,
    Failed,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Recorder(#[from] RecorderError),

    /// Meeting creation failed; the session never became active and no
    /// partial audio was retained.
    #[error("meeting could not be created: {0}")]
    CreateFailed(String),

    /// Finalization could not persist the meeting. Fields written before
    /// the failure stay written.
    #[error("failed to persist meeting: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("operation invalid in state {actual:?} (requires {expected})")]
    InvalidState {
        expected: &'static str,
        actual: SessionState,
    },
}

/// Shared pieces the pump and dispatch tasks work against.
struct Shared {
    accumulator: TranscriptAccumulator,
    events: EventBus,
    state: Mutex<SessionState>,
    meeting_id: Mutex<Option<String>>,
    /// Capture-ordered audio retained for the merged full-session blob.
    retained: Mutex<Vec<AudioChunk>>,
    chunks_captured: AtomicUsize,
    recorder: Mutex<Option<ChunkRecorder>>,
}

impl Shared {
    async fn set_state(&self, next: SessionState) {
        *self.state.lock().await = next;
        self.events.publish(SessionEvent::StateChanged { state: next });
    }

    /// Hand one chunk to the transcription client without waiting for it.
    /// Per-chunk failures are logged and dropped; the next chunk's attempt
    /// is independent.
    async fn dispatch(self: &Arc<Self>, transcriber: Arc<dyn Transcriber>, chunk: AudioChunk) {
        self.retained.lock().await.push(chunk.clone());

        let shared = Arc::clone(self);
        tokio::spawn(async move {
            match transcriber.transcribe(&chunk).await {
                Ok(Some(fragment)) => {
                    if !fragment.is_empty() {
                        shared.accept_fragment(fragment).await;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(
                        "Transcription failed for chunk {} (dropped): {}",
                        chunk.sequence, e
                    );
                }
            }
        });
    }

    async fn accept_fragment(&self, fragment: TranscriptFragment) {
        self.events.publish(SessionEvent::TranscriptUpdate {
            fragment: fragment.clone(),
        });
        self.accumulator.append(fragment).await;
    }

    /// Creating -> Failed: release the microphone, retain nothing.
    async fn fail_creating(&self, message: String) {
        error!("Meeting creation failed: {}", message);

        if let Some(recorder) = self.recorder.lock().await.as_mut() {
            recorder.stop().await;
        }

        self.set_state(SessionState::Failed).await;
        self.events.publish(SessionEvent::SessionError { message });
    }
}

/// The state machine coordinating capture, transcription and persistence
/// for one recording.
///
/// `NotStarted -> Creating -> Active -> Stopping -> Finalizing -> Done`,
/// with `Failed` reachable from any non-terminal state. Capture begins
/// immediately on start; the meeting record is created concurrently, and
/// chunks captured before its id arrives are buffered and dispatched in
/// original order once it does.
pub struct SessionController {
    config: SessionConfig,
    session_key: String,
    store: Arc<dyn MeetingStore>,
    analyzer: Arc<dyn Analyzer>,
    transcriber_factory: TranscriberFactory,
    shared: Arc<Shared>,
    device: Mutex<Option<Box<dyn CaptureDevice>>>,
    transcriber: Mutex<Option<Arc<dyn Transcriber>>>,
    started_at: Mutex<Option<DateTime<Utc>>>,
    pump: Mutex<Option<JoinHandle<()>>>,
    forwarders: Mutex<Vec<JoinHandle<()>>>,
}

impl SessionController {
    pub fn new(
        config: SessionConfig,
        device: Box<dyn CaptureDevice>,
        store: Arc<dyn MeetingStore>,
        analyzer: Arc<dyn Analyzer>,
        transcriber_factory: TranscriberFactory,
    ) -> Self {
        Self {
            config,
            session_key: uuid::Uuid::new_v4().to_string(),
            store,
            analyzer,
            transcriber_factory,
            shared: Arc::new(Shared {
                accumulator: TranscriptAccumulator::new(),
                events: EventBus::default(),
                state: Mutex::new(SessionState::NotStarted),
                meeting_id: Mutex::new(None),
                retained: Mutex::new(Vec::new()),
                chunks_captured: AtomicUsize::new(0),
                recorder: Mutex::new(None),
            }),
            device: Mutex::new(Some(device)),
            transcriber: Mutex::new(None),
            started_at: Mutex::new(None),
            pump: Mutex::new(None),
            forwarders: Mutex::new(Vec::new()),
        }
    }

    /// Client-local key identifying this session before (and independent
    /// of) the server-assigned meeting id.
    pub fn session_key(&self) -> &str {
        &self.session_key
    }

    pub async fn state(&self) -> SessionState {
        *self.shared.state.lock().await
    }

    pub async fn meeting_id(&self) -> Option<String> {
        self.shared.meeting_id.lock().await.clone()
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<SessionEvent> {
        self.shared.events.subscribe()
    }

    /// Begin capturing and concurrently create the meeting record.
    ///
    /// Device acquisition failure is fatal and surfaces here, before any
    /// meeting record exists. Everything after acquisition runs in the
    /// background; the call returns as soon as audio is flowing.
    pub async fn start(&self) -> Result<(), SessionError> {
        {
            let state = self.shared.state.lock().await;
            if *state != SessionState::NotStarted {
                return Err(SessionError::InvalidState {
                    expected: "NOT_STARTED",
                    actual: *state,
                });
            }
        }
        self.shared.set_state(SessionState::Creating).await;

        info!(
            "Starting session {} (\"{}\")",
            self.session_key, self.config.title
        );

        // Acquire the microphone first: if this fails the session is over
        // and no meeting record may be created.
        let device = match self.device.lock().await.take() {
            Some(d) => d,
            None => {
                let state = *self.shared.state.lock().await;
                return Err(SessionError::InvalidState {
                    expected: "NOT_STARTED",
                    actual: state,
                });
            }
        };

        let mut recorder = ChunkRecorder::new(device);
        let stream = match recorder.start(self.config.chunk_interval).await {
            Ok(stream) => stream,
            Err(e) => {
                self.shared.set_state(SessionState::Failed).await;
                self.shared.events.publish(SessionEvent::SessionError {
                    message: e.to_string(),
                });
                return Err(e.into());
            }
        };

        *self.started_at.lock().await = Some(Utc::now());
        *self.shared.recorder.lock().await = Some(recorder);

        // Transcription backend failures never block recording: degrade to
        // the placeholder backend instead.
        let transcriber: Arc<dyn Transcriber> =
            match self.transcriber_factory.for_session(&self.session_key).await {
                Ok(t) => t,
                Err(e) => {
                    warn!(
                        "Transcription backend unavailable, using placeholder: {}",
                        e
                    );
                    Arc::new(crate::transcription::PlaceholderTranscriber)
                }
            };
        *self.transcriber.lock().await = Some(Arc::clone(&transcriber));

        self.spawn_forwarders(&transcriber, stream.meter).await;

        // Create the meeting record concurrently with capture.
        let store = Arc::clone(&self.store);
        let user_id = self.config.user_id.clone();
        let title = self.config.title.clone();
        let create_handle =
            tokio::spawn(async move { store.create(&user_id, &title).await });

        let pump = tokio::spawn(Self::pump(
            Arc::clone(&self.shared),
            transcriber,
            stream.chunks,
            create_handle,
        ));
        *self.pump.lock().await = Some(pump);

        Ok(())
    }

    async fn spawn_forwarders(
        &self,
        transcriber: &Arc<dyn Transcriber>,
        mut meter: mpsc::Receiver<u8>,
    ) {
        let mut forwarders = self.forwarders.lock().await;

        // Loudness meter -> events, fire-and-forget.
        let events = self.shared.events.clone();
        forwarders.push(tokio::spawn(async move {
            while let Some(level) = meter.recv().await {
                events.publish(SessionEvent::AudioLevel { level });
            }
        }));

        // Streaming backends deliver fragments out of band.
        if let Some(mut results) = transcriber.take_results().await {
            let shared = Arc::clone(&self.shared);
            forwarders.push(tokio::spawn(async move {
                while let Some(fragment) = results.recv().await {
                    shared.accept_fragment(fragment).await;
                }
            }));
        }
    }

    /// Chunk loop: buffer while the meeting id is pending, dispatch once
    /// active. Runs until the chunk stream has closed AND creation has
    /// resolved: a capture that ends while the meeting is still being
    /// created must not strand the session in `Creating`.
    async fn pump(
        shared: Arc<Shared>,
        transcriber: Arc<dyn Transcriber>,
        mut chunks: mpsc::Receiver<AudioChunk>,
        mut create_handle: JoinHandle<Result<MeetingRecord, PersistenceError>>,
    ) {
        let mut pending: Vec<AudioChunk> = Vec::new();
        let mut create_done = false;
        let mut chunks_open = true;
        let mut active = false;

        while !create_done || chunks_open {
            tokio::select! {
                created = &mut create_handle, if !create_done => {
                    create_done = true;
                    match created {
                        Ok(Ok(record)) => {
                            info!("Meeting created: {}", record.id);
                            *shared.meeting_id.lock().await = Some(record.id.clone());
                            shared.set_state(SessionState::Active).await;
                            shared.events.publish(SessionEvent::MeetingCreated {
                                meeting_id: record.id,
                            });
                            active = true;
                            // Flush chunks captured while Creating, in
                            // original temporal order.
                            for chunk in pending.drain(..) {
                                shared.dispatch(Arc::clone(&transcriber), chunk).await;
                            }
                        }
                        Ok(Err(e)) => {
                            shared.fail_creating(e.to_string()).await;
                            return;
                        }
                        Err(e) => {
                            shared.fail_creating(format!("create task panicked: {}", e)).await;
                            return;
                        }
                    }
                }
                maybe_chunk = chunks.recv(), if chunks_open => {
                    match maybe_chunk {
                        Some(chunk) => {
                            shared.chunks_captured.fetch_add(1, Ordering::Relaxed);
                            if active {
                                shared.dispatch(Arc::clone(&transcriber), chunk).await;
                            } else {
                                pending.push(chunk);
                            }
                        }
                        // Recorder stopped; stop() drives finalization once
                        // creation has also resolved.
                        None => chunks_open = false,
                    }
                }
            }
        }
    }

    /// Valid only while active. The controller stays `Active` around a
    /// pause; only the recorder is paused.
    pub async fn pause(&self) -> Result<(), SessionError> {
        self.require_active("pause").await?;
        if let Some(recorder) = self.shared.recorder.lock().await.as_mut() {
            recorder.pause();
        }
        Ok(())
    }

    pub async fn resume(&self) -> Result<(), SessionError> {
        self.require_active("resume").await?;
        if let Some(recorder) = self.shared.recorder.lock().await.as_mut() {
            recorder.resume();
        }
        Ok(())
    }

    /// Stop recording and run finalization to `Done`.
    ///
    /// Outstanding transcription calls are not cancelled: results arriving
    /// within the straggler grace window still count; later ones are
    /// discarded by the frozen accumulator. A persistence failure here is
    /// fatal to reaching `Done`, but nothing already written is rolled
    /// back.
    pub async fn stop(&self) -> Result<StopSummary, SessionError> {
        self.require_active("stop").await?;
        self.shared.set_state(SessionState::Stopping).await;

        let duration = match self.shared.recorder.lock().await.as_mut() {
            Some(recorder) => recorder.stop().await,
            None => Default::default(),
        };

        // The chunk stream has closed; wait for the pump to hand off its
        // last chunks, then give in-flight transcriptions a bounded grace.
        if let Some(pump) = self.pump.lock().await.take() {
            if let Err(e) = pump.await {
                error!("Session pump task panicked: {}", e);
            }
        }
        tokio::time::sleep(self.config.straggler_grace).await;

        self.shared.set_state(SessionState::Finalizing).await;

        self.shared.accumulator.freeze().await;
        let canonical = self.shared.accumulator.canonical_transcript().await;
        let transcript = match self.full_transcript().await {
            Some(full) => {
                info!(
                    "Full-audio transcript supersedes {} accumulated chars",
                    canonical.len()
                );
                full
            }
            None => canonical,
        };

        // An active session always has a meeting id; guard anyway so a
        // broken invariant fails the session instead of panicking.
        let meeting_id = match self.meeting_id().await {
            Some(id) => id,
            None => {
                self.shared.set_state(SessionState::Failed).await;
                return Err(SessionError::Persistence(PersistenceError::NotFound));
            }
        };

        let duration_secs = duration.as_secs_f64().round() as u64;
        let patch = MeetingPatch {
            status: Some(MeetingStatus::Processing),
            duration_secs: Some(duration_secs),
            transcript: Some(transcript.clone()),
            ended_at: Some(Utc::now()),
            ..Default::default()
        };

        if let Err(e) = self
            .store
            .update(&self.config.user_id, &meeting_id, patch)
            .await
        {
            error!("Failed to persist final transcript: {}", e);
            self.shared.set_state(SessionState::Failed).await;
            self.shared.events.publish(SessionEvent::SessionError {
                message: format!("processing failed, your recording was saved: {}", e),
            });
            return Err(e.into());
        }

        let analysis_dispatched = transcript.trim().len() >= MIN_TRANSCRIPT_CHARS;
        if analysis_dispatched {
            self.dispatch_analysis(&meeting_id, transcript.clone());
        } else {
            info!(
                "Transcript below analysis threshold ({} chars); meeting stays in PROCESSING",
                transcript.trim().len()
            );
        }

        self.shared.set_state(SessionState::Done).await;
        info!(
            "Session {} done: meeting {}, {}s, {} chars",
            self.session_key,
            meeting_id,
            duration_secs,
            transcript.len()
        );

        Ok(StopSummary {
            meeting_id,
            duration_secs,
            transcript_chars: transcript.len(),
            analysis_dispatched,
        })
    }

    /// Authoritative full-audio re-transcription; `None` means keep the
    /// accumulated transcript (graceful degradation, never blocks stop).
    async fn full_transcript(&self) -> Option<String> {
        let transcriber = self.transcriber.lock().await.clone()?;

        let retained = self.shared.retained.lock().await;
        if retained.is_empty() {
            return None;
        }
        let merged =
            match merge_chunks_to_wav(&retained, self.config.sample_rate, self.config.channels) {
                Ok(m) => m,
                Err(e) => {
                    warn!("Failed to merge session audio: {}", e);
                    return None;
                }
            };
        drop(retained);

        match transcriber.transcribe_full(&merged).await {
            Ok(Some(fragment)) if !fragment.is_empty() => Some(fragment.text),
            Ok(_) => None,
            Err(e) => {
                warn!("Full-audio transcription failed, keeping accumulated transcript: {}", e);
                None
            }
        }
    }

    /// Fire-and-forget analysis. Success promotes the meeting to
    /// `Completed`; failure leaves it in `Processing` for an explicit
    /// re-analyze later and is never a session failure.
    fn dispatch_analysis(&self, meeting_id: &str, transcript: String) {
        let store = Arc::clone(&self.store);
        let analyzer = Arc::clone(&self.analyzer);
        let events = self.shared.events.clone();
        let user_id = self.config.user_id.clone();
        let meeting_id = meeting_id.to_string();

        tokio::spawn(async move {
            match run_analysis(store, analyzer, &user_id, &meeting_id, &transcript).await {
                Ok(_) => events.publish(SessionEvent::AnalysisComplete { meeting_id }),
                Err(e) => warn!("Analysis failed for meeting {}: {}", meeting_id, e),
            }
        });
    }

    pub async fn stats(&self) -> SessionStats {
        let (paused, recorded) = match self.shared.recorder.lock().await.as_ref() {
            Some(recorder) => (recorder.is_paused(), recorder.recorded()),
            None => (false, Default::default()),
        };

        SessionStats {
            session_key: self.session_key.clone(),
            meeting_id: self.meeting_id().await,
            state: self.state().await,
            paused,
            started_at: *self.started_at.lock().await,
            duration_secs: recorded.as_secs_f64(),
            chunks_captured: self.shared.chunks_captured.load(Ordering::Relaxed),
            fragment_count: self.shared.accumulator.len().await,
            final_fragment_count: self.shared.accumulator.final_count().await,
        }
    }

    /// Live view of all fragments, interim ones included.
    pub async fn transcript(&self) -> Vec<TranscriptFragment> {
        self.shared.accumulator.fragments().await
    }

    async fn require_active(&self, op: &'static str) -> Result<(), SessionError> {
        let state = *self.shared.state.lock().await;
        if state != SessionState::Active {
            warn!("Refusing {} in state {:?}", op, state);
            return Err(SessionError::InvalidState {
                expected: "ACTIVE",
                actual: state,
            });
        }
        Ok(())
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        // Background tasks hold only channels and Arcs; abort them so an
        // abandoned session does not keep pumping.
        if let Ok(mut pump) = self.pump.try_lock() {
            if let Some(handle) = pump.take() {
                handle.abort();
            }
        }
        if let Ok(mut forwarders) = self.forwarders.try_lock() {
            for handle in forwarders.drain(..) {
                handle.abort();
            }
        }
    }
}
