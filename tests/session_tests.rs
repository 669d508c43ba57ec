// Integration tests for the recording session controller
//
// These drive full sessions against scripted capture devices and in-test
// collaborator implementations: transcribers that fail on chosen chunks,
// a store that rejects creation, a counting analyzer.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use meetscribe::audio::{CaptureDevice, CaptureStream, DeviceError, PcmFrame, ScriptedDevice};
use meetscribe::meeting::{
    AnalysisError, AnalysisResult, AnalysisSentiment, Analyzer, InMemoryMeetingStore,
    MeetingPatch, MeetingRecord, MeetingStatus, MeetingStore, PersistenceError,
};
use meetscribe::session::{SessionConfig, SessionController, SessionError, SessionState};
use meetscribe::transcript::TranscriptFragment;
use meetscribe::transcription::{Transcriber, TranscriberFactory, TranscriptionError};
use meetscribe::AudioChunk;

// ============================================================================
// Test doubles
// ============================================================================

/// Transcriber returning a deterministic final fragment per chunk, with
/// optional per-sequence failures and an optional full-audio result.
struct MockTranscriber {
    fail_on: Vec<u32>,
    /// Per-sequence texts; empty means `"segment N of the discussion"`.
    texts: Vec<String>,
    full: Option<String>,
    calls: AtomicUsize,
    full_calls: AtomicUsize,
}

impl MockTranscriber {
    fn new() -> Self {
        Self {
            fail_on: Vec::new(),
            texts: Vec::new(),
            full: None,
            calls: AtomicUsize::new(0),
            full_calls: AtomicUsize::new(0),
        }
    }

    fn failing_on(fail_on: Vec<u32>) -> Self {
        Self {
            fail_on,
            ..Self::new()
        }
    }
}

#[async_trait]
impl Transcriber for MockTranscriber {
    async fn transcribe(
        &self,
        chunk: &AudioChunk,
    ) -> Result<Option<TranscriptFragment>, TranscriptionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_on.contains(&chunk.sequence) {
            return Err(TranscriptionError::ServiceUnavailable(
                "simulated outage".into(),
            ));
        }

        let text = match self.texts.get(chunk.sequence as usize) {
            Some(text) => text.clone(),
            None => format!("segment {} of the discussion", chunk.sequence),
        };
        Ok(Some(TranscriptFragment::final_text(
            text,
            chunk.timestamp_ms,
            0.95,
        )))
    }

    async fn transcribe_full(
        &self,
        _audio_wav: &[u8],
    ) -> Result<Option<TranscriptFragment>, TranscriptionError> {
        self.full_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .full
            .clone()
            .map(|text| TranscriptFragment::final_text(text, 0, 0.99)))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

struct CountingAnalyzer {
    calls: AtomicUsize,
}

impl CountingAnalyzer {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Analyzer for CountingAnalyzer {
    async fn analyze(&self, _transcript: &str) -> Result<AnalysisResult, AnalysisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(AnalysisResult {
            title: "Weekly Sync Review".to_string(),
            summary: "The team reviewed progress and agreed on next steps.".to_string(),
            key_points: vec!["progress reviewed".to_string()],
            action_items: vec![],
            next_steps: "Reconvene next week".to_string(),
            sentiment: AnalysisSentiment::Positive,
            key_decisions: vec![],
            concerns: vec![],
            opportunities: vec![],
        })
    }
}

/// Record store whose create always fails.
struct RejectingStore;

#[async_trait]
impl MeetingStore for RejectingStore {
    async fn create(&self, _user_id: &str, _title: &str) -> Result<MeetingRecord, PersistenceError> {
        Err(PersistenceError::Unavailable("record store down".into()))
    }
    async fn get(&self, _user_id: &str, _id: &str) -> Result<MeetingRecord, PersistenceError> {
        Err(PersistenceError::NotFound)
    }
    async fn list(&self, _user_id: &str) -> Result<Vec<MeetingRecord>, PersistenceError> {
        Ok(vec![])
    }
    async fn update(
        &self,
        _user_id: &str,
        _id: &str,
        _patch: MeetingPatch,
    ) -> Result<MeetingRecord, PersistenceError> {
        Err(PersistenceError::NotFound)
    }
    async fn delete(&self, _user_id: &str, _id: &str) -> Result<(), PersistenceError> {
        Err(PersistenceError::NotFound)
    }
}

/// Store whose create resolves only after a delay, so capture can end
/// while the meeting is still being created.
struct DelayedStore {
    inner: InMemoryMeetingStore,
    create_delay: Duration,
}

#[async_trait]
impl MeetingStore for DelayedStore {
    async fn create(&self, user_id: &str, title: &str) -> Result<MeetingRecord, PersistenceError> {
        tokio::time::sleep(self.create_delay).await;
        self.inner.create(user_id, title).await
    }
    async fn get(&self, user_id: &str, id: &str) -> Result<MeetingRecord, PersistenceError> {
        self.inner.get(user_id, id).await
    }
    async fn list(&self, user_id: &str) -> Result<Vec<MeetingRecord>, PersistenceError> {
        self.inner.list(user_id).await
    }
    async fn update(
        &self,
        user_id: &str,
        id: &str,
        patch: MeetingPatch,
    ) -> Result<MeetingRecord, PersistenceError> {
        self.inner.update(user_id, id, patch).await
    }
    async fn delete(&self, user_id: &str, id: &str) -> Result<(), PersistenceError> {
        self.inner.delete(user_id, id).await
    }
}

/// Capture device that exposes whether its handle is still open.
struct TrackingDevice {
    frames: Option<Vec<PcmFrame>>,
    acquired: Arc<AtomicBool>,
    // Keeps the meter channel open for the device's lifetime.
    meter_tx: Option<mpsc::Sender<u8>>,
}

impl TrackingDevice {
    fn new(frames: Vec<PcmFrame>) -> (Self, Arc<AtomicBool>) {
        let acquired = Arc::new(AtomicBool::new(false));
        (
            Self {
                frames: Some(frames),
                acquired: Arc::clone(&acquired),
                meter_tx: None,
            },
            acquired,
        )
    }
}

#[async_trait]
impl CaptureDevice for TrackingDevice {
    async fn acquire(&mut self) -> Result<CaptureStream, DeviceError> {
        let frames = self.frames.take().ok_or(DeviceError::NotFound)?;

        let (frame_tx, frame_rx) = mpsc::channel(frames.len().max(1));
        for frame in frames {
            let _ = frame_tx.try_send(frame);
        }
        // Dropping frame_tx ends the stream once the frames are consumed.

        let (meter_tx, meter_rx) = mpsc::channel(1);
        self.meter_tx = Some(meter_tx);

        self.acquired.store(true, Ordering::SeqCst);
        Ok(CaptureStream {
            frames: frame_rx,
            meter: meter_rx,
        })
    }

    async fn release(&mut self) {
        self.meter_tx = None;
        self.acquired.store(false, Ordering::SeqCst);
    }

    fn is_acquired(&self) -> bool {
        self.acquired.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "tracking"
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Silent 16 kHz mono frames covering `total_ms`, in 100 ms steps.
fn silence(total_ms: u64) -> Vec<PcmFrame> {
    (0..total_ms / 100)
        .map(|_| PcmFrame {
            samples: vec![0i16; 1600],
            sample_rate: 16000,
            channels: 1,
        })
        .collect()
}

fn session_config() -> SessionConfig {
    SessionConfig {
        user_id: "alice".to_string(),
        title: "Weekly sync".to_string(),
        chunk_interval: Duration::from_secs(5),
        straggler_grace: Duration::from_millis(50),
        ..Default::default()
    }
}

async fn wait_for_state(session: &SessionController, want: SessionState) {
    for _ in 0..200 {
        if session.state().await == want {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "timed out waiting for {:?}, still {:?}",
        want,
        session.state().await
    );
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn full_session_persists_transcript_and_completes_analysis() {
    let store = Arc::new(InMemoryMeetingStore::new());
    let analyzer = Arc::new(CountingAnalyzer::new());
    let transcriber = Arc::new(MockTranscriber::new());

    let session = SessionController::new(
        session_config(),
        Box::new(ScriptedDevice::preloaded(silence(12_000))),
        store.clone(),
        analyzer.clone(),
        TranscriberFactory::fixed(transcriber.clone()),
    );

    session.start().await.unwrap();
    wait_for_state(&session, SessionState::Active).await;

    let summary = session.stop().await.unwrap();
    assert_eq!(session.state().await, SessionState::Done);
    assert_eq!(summary.duration_secs, 12);
    assert!(summary.analysis_dispatched);

    // 12s at 5s chunks: sequences 0, 1, 2 in timestamp order.
    let expected = "segment 0 of the discussion segment 1 of the discussion segment 2 of the discussion";
    assert_eq!(summary.transcript_chars, expected.len());

    // Analysis is fire-and-forget; give it a moment to land.
    tokio::time::sleep(Duration::from_millis(200)).await;

    let meeting = store.get("alice", &summary.meeting_id).await.unwrap();
    assert_eq!(meeting.status, MeetingStatus::Completed);
    assert_eq!(meeting.transcript.as_deref(), Some(expected));
    assert_eq!(meeting.duration_secs, Some(12));
    assert!(meeting.summary.is_some());
    assert_eq!(analyzer.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn transcription_failure_on_one_chunk_is_not_fatal() {
    let store = Arc::new(InMemoryMeetingStore::new());
    let analyzer = Arc::new(CountingAnalyzer::new());
    // Chunk 1 of [0, 1, 2] fails; the others still make the transcript.
    let transcriber = Arc::new(MockTranscriber::failing_on(vec![1]));

    let session = SessionController::new(
        session_config(),
        Box::new(ScriptedDevice::preloaded(silence(12_000))),
        store.clone(),
        analyzer.clone(),
        TranscriberFactory::fixed(transcriber.clone()),
    );

    session.start().await.unwrap();
    wait_for_state(&session, SessionState::Active).await;
    let summary = session.stop().await.unwrap();

    assert_eq!(session.state().await, SessionState::Done);
    let stats = session.stats().await;
    assert_eq!(stats.chunks_captured, 3, "capture continued past the failure");
    assert_eq!(transcriber.calls.load(Ordering::SeqCst), 3);

    let meeting = store.get("alice", &summary.meeting_id).await.unwrap();
    let transcript = meeting.transcript.unwrap();
    assert!(transcript.contains("segment 0"));
    assert!(!transcript.contains("segment 1"), "failed chunk is dropped");
    assert!(transcript.contains("segment 2"));
}

#[tokio::test]
async fn create_failure_releases_device_and_sends_no_audio() {
    let (device, acquired) = TrackingDevice::new(silence(2000));
    let transcriber = Arc::new(MockTranscriber::new());

    let session = SessionController::new(
        session_config(),
        Box::new(device),
        Arc::new(RejectingStore),
        Arc::new(CountingAnalyzer::new()),
        TranscriberFactory::fixed(transcriber.clone()),
    );

    session.start().await.unwrap();
    wait_for_state(&session, SessionState::Failed).await;

    assert!(
        !acquired.load(Ordering::SeqCst),
        "no open microphone handle may remain"
    );
    assert_eq!(
        transcriber.calls.load(Ordering::SeqCst),
        0,
        "chunks captured before the failure must not be sent"
    );
    assert!(session.meeting_id().await.is_none());

    // The session is dead; stop is refused.
    assert!(matches!(
        session.stop().await,
        Err(SessionError::InvalidState { .. })
    ));
}

#[tokio::test]
async fn device_failure_blocks_session_start_without_creating_a_meeting() {
    let store = Arc::new(InMemoryMeetingStore::new());

    let session = SessionController::new(
        session_config(),
        Box::new(ScriptedDevice::failing(DeviceError::PermissionDenied)),
        store.clone(),
        Arc::new(CountingAnalyzer::new()),
        TranscriberFactory::fixed(Arc::new(MockTranscriber::new())),
    );

    assert!(matches!(
        session.start().await,
        Err(SessionError::Recorder(_))
    ));
    assert_eq!(session.state().await, SessionState::Failed);
    assert!(store.list("alice").await.unwrap().is_empty());
}

#[tokio::test]
async fn full_audio_transcript_supersedes_accumulated_fragments() {
    let store = Arc::new(InMemoryMeetingStore::new());
    let mut mock = MockTranscriber::new();
    mock.texts = vec!["hello wor".to_string(), "ld how are you".to_string()];
    mock.full = Some("hello world, how are you?".to_string());
    let transcriber = Arc::new(mock);

    let session = SessionController::new(
        session_config(),
        Box::new(ScriptedDevice::preloaded(silence(10_000))),
        store.clone(),
        Arc::new(CountingAnalyzer::new()),
        TranscriberFactory::fixed(transcriber.clone()),
    );

    session.start().await.unwrap();
    wait_for_state(&session, SessionState::Active).await;
    let summary = session.stop().await.unwrap();

    assert_eq!(transcriber.full_calls.load(Ordering::SeqCst), 1);

    let meeting = store.get("alice", &summary.meeting_id).await.unwrap();
    // The full-audio result replaces the incremental join outright.
    assert_eq!(
        meeting.transcript.as_deref(),
        Some("hello world, how are you?")
    );
}

#[tokio::test]
async fn short_transcript_never_dispatches_analysis() {
    let store = Arc::new(InMemoryMeetingStore::new());
    let analyzer = Arc::new(CountingAnalyzer::new());
    let mut mock = MockTranscriber::new();
    mock.texts = vec!["too short".to_string()];
    let transcriber = Arc::new(mock);

    let session = SessionController::new(
        session_config(),
        Box::new(ScriptedDevice::preloaded(silence(4000))),
        store.clone(),
        analyzer.clone(),
        TranscriberFactory::fixed(transcriber),
    );

    session.start().await.unwrap();
    wait_for_state(&session, SessionState::Active).await;
    let summary = session.stop().await.unwrap();

    assert!(!summary.analysis_dispatched);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(analyzer.calls.load(Ordering::SeqCst), 0);

    // Saved, but waiting: the recording itself is never lost.
    let meeting = store.get("alice", &summary.meeting_id).await.unwrap();
    assert_eq!(meeting.status, MeetingStatus::Processing);
    assert_eq!(meeting.transcript.as_deref(), Some("too short"));
}

#[tokio::test]
async fn placeholder_backend_yields_interim_fragments_only() {
    let store = Arc::new(InMemoryMeetingStore::new());
    let analyzer = Arc::new(CountingAnalyzer::new());

    let session = SessionController::new(
        session_config(),
        Box::new(ScriptedDevice::preloaded(silence(12_000))),
        store.clone(),
        analyzer.clone(),
        TranscriberFactory::placeholder(),
    );

    session.start().await.unwrap();
    wait_for_state(&session, SessionState::Active).await;
    let summary = session.stop().await.unwrap();

    assert_eq!(summary.transcript_chars, 0);
    assert!(!summary.analysis_dispatched);

    let fragments = session.transcript().await;
    assert!(!fragments.is_empty(), "placeholder fragments are shown live");
    assert!(fragments.iter().all(|f| !f.is_final));

    let meeting = store.get("alice", &summary.meeting_id).await.unwrap();
    assert_eq!(meeting.status, MeetingStatus::Processing);
    assert_eq!(meeting.transcript.as_deref(), Some(""));
    assert_eq!(analyzer.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn capture_ending_during_creation_still_activates_session() {
    // A 2s capture exhausts its device almost immediately, well before the
    // meeting record exists. The session must still go Active, flush the
    // buffered chunks and be stoppable, not sit in Creating forever.
    let store = Arc::new(DelayedStore {
        inner: InMemoryMeetingStore::new(),
        create_delay: Duration::from_millis(300),
    });
    let transcriber = Arc::new(MockTranscriber::new());

    let session = SessionController::new(
        session_config(),
        Box::new(ScriptedDevice::preloaded(silence(2000))),
        store.clone(),
        Arc::new(CountingAnalyzer::new()),
        TranscriberFactory::fixed(transcriber.clone()),
    );

    session.start().await.unwrap();
    wait_for_state(&session, SessionState::Active).await;
    assert!(session.meeting_id().await.is_some());

    let summary = session.stop().await.unwrap();
    assert_eq!(session.state().await, SessionState::Done);
    assert_eq!(session.stats().await.chunks_captured, 1);
    assert_eq!(
        transcriber.calls.load(Ordering::SeqCst),
        1,
        "the chunk buffered during creation is dispatched"
    );

    let meeting = store.get("alice", &summary.meeting_id).await.unwrap();
    assert_eq!(
        meeting.transcript.as_deref(),
        Some("segment 0 of the discussion")
    );
}

#[tokio::test]
async fn lifecycle_operations_are_guarded_by_state() {
    let session = SessionController::new(
        session_config(),
        Box::new(ScriptedDevice::preloaded(silence(1000))),
        Arc::new(InMemoryMeetingStore::new()),
        Arc::new(CountingAnalyzer::new()),
        TranscriberFactory::fixed(Arc::new(MockTranscriber::new())),
    );

    // Nothing is valid before start.
    assert!(matches!(
        session.stop().await,
        Err(SessionError::InvalidState { .. })
    ));
    assert!(matches!(
        session.pause().await,
        Err(SessionError::InvalidState { .. })
    ));

    session.start().await.unwrap();
    assert!(matches!(
        session.start().await,
        Err(SessionError::InvalidState { .. })
    ));

    wait_for_state(&session, SessionState::Active).await;
    session.stop().await.unwrap();

    // Done is terminal.
    assert!(matches!(
        session.stop().await,
        Err(SessionError::InvalidState { .. })
    ));
}

#[tokio::test]
async fn session_events_trace_the_lifecycle() {
    let session = SessionController::new(
        session_config(),
        Box::new(ScriptedDevice::preloaded(silence(6000))),
        Arc::new(InMemoryMeetingStore::new()),
        Arc::new(CountingAnalyzer::new()),
        TranscriberFactory::fixed(Arc::new(MockTranscriber::new())),
    );

    let mut events = session.subscribe();

    session.start().await.unwrap();
    wait_for_state(&session, SessionState::Active).await;
    session.stop().await.unwrap();

    let mut saw_created = false;
    let mut saw_fragment = false;
    let mut saw_done = false;
    while let Ok(event) = events.try_recv() {
        match event {
            meetscribe::SessionEvent::MeetingCreated { .. } => saw_created = true,
            meetscribe::SessionEvent::TranscriptUpdate { .. } => saw_fragment = true,
            meetscribe::SessionEvent::StateChanged {
                state: SessionState::Done,
            } => saw_done = true,
            _ => {}
        }
    }
    assert!(saw_created);
    assert!(saw_fragment);
    assert!(saw_done);
}
