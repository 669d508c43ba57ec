use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::audio::AudioChunk;
use crate::transcript::TranscriptFragment;

/// Per-request transcription failures.
///
/// Never fatal to a recording session: the failed chunk's fragment is
/// dropped with a log line and the next chunk's attempt is independent.
#[derive(Debug, Error)]
pub enum TranscriptionError {
    #[error("transcription service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("transcription service rate limited")]
    RateLimited,

    #[error("malformed transcription response: {0}")]
    Malformed(String),
}

/// One semantic contract over interchangeable transports.
///
/// Request/reply backends resolve each `transcribe` call to the chunk's own
/// fragment. Streaming backends hand the chunk to the socket, resolve to
/// `None`, and deliver fragments out of band through [`take_results`]
/// instead — the session controller runs the same code path either way.
///
/// [`take_results`]: Transcriber::take_results
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Submit one captured chunk. May take arbitrarily long; callers
    /// dispatch it without blocking chunk capture. `Ok(None)` means no
    /// fragment resolves from this call itself (no speech detected, or a
    /// streaming transport delivering out of band).
    async fn transcribe(
        &self,
        chunk: &AudioChunk,
    ) -> Result<Option<TranscriptFragment>, TranscriptionError>;

    /// Authoritative re-transcription of the complete session audio (WAV),
    /// called once at stop time. `Ok(None)` when the backend does not
    /// support a full-audio pass; the accumulated transcript is used as-is.
    async fn transcribe_full(
        &self,
        audio_wav: &[u8],
    ) -> Result<Option<TranscriptFragment>, TranscriptionError>;

    /// Out-of-band fragment stream, present only on streaming transports.
    /// The controller drains it into the accumulator for the session's
    /// lifetime. Yields at most once.
    async fn take_results(&self) -> Option<mpsc::Receiver<TranscriptFragment>> {
        None
    }

    /// Backend name for logging.
    fn name(&self) -> &str;
}
