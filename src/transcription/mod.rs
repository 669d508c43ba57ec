//! Transcription client: one contract, pluggable transports.

pub mod batch;
pub mod client;
pub mod messages;
pub mod placeholder;
pub mod streaming;

use std::sync::Arc;

use anyhow::Result;
use serde::Deserialize;
use tracing::warn;

pub use batch::BatchTranscriber;
pub use client::{Transcriber, TranscriptionError};
pub use messages::{
    AudioFrameMessage, TranscribeReply, TranscribeRequest, TranscriptMessage, WordInfo,
};
pub use placeholder::PlaceholderTranscriber;
pub use streaming::StreamingTranscriber;

/// Which transport carries transcription for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptionBackend {
    Batch,
    Streaming,
    Placeholder,
}

/// Builds one session-scoped [`Transcriber`] per recording session.
///
/// The backend is chosen by configuration; session logic never branches on
/// the transport. With no NATS connection available the factory degrades to
/// the placeholder backend instead of failing the session.
#[derive(Clone)]
pub struct TranscriberFactory {
    backend: TranscriptionBackend,
    nats: Option<async_nats::Client>,
    /// Preconstructed backend, shared by every session. Used to inject
    /// in-process transcribers (tests, embedded engines).
    fixed: Option<Arc<dyn Transcriber>>,
    batch_subject: String,
    publish_prefix: String,
    results_subject: String,
    sample_rate: u32,
    channels: u16,
    language: String,
}

impl TranscriberFactory {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        backend: TranscriptionBackend,
        nats: Option<async_nats::Client>,
        batch_subject: impl Into<String>,
        publish_prefix: impl Into<String>,
        results_subject: impl Into<String>,
        sample_rate: u32,
        channels: u16,
        language: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            nats,
            fixed: None,
            batch_subject: batch_subject.into(),
            publish_prefix: publish_prefix.into(),
            results_subject: results_subject.into(),
            sample_rate,
            channels,
            language: language.into(),
        }
    }

    /// Placeholder-only factory, for when no service is configured.
    pub fn placeholder() -> Self {
        Self::new(
            TranscriptionBackend::Placeholder,
            None,
            "stt.batch",
            "audio.frame",
            "stt.text.>",
            16000,
            1,
            "en-US",
        )
    }

    /// Factory that hands every session the same preconstructed backend.
    pub fn fixed(transcriber: Arc<dyn Transcriber>) -> Self {
        let mut factory = Self::placeholder();
        factory.fixed = Some(transcriber);
        factory
    }

    pub async fn for_session(&self, session_id: &str) -> Result<Arc<dyn Transcriber>> {
        if let Some(fixed) = &self.fixed {
            return Ok(Arc::clone(fixed));
        }

        let client = match (&self.backend, &self.nats) {
            (TranscriptionBackend::Placeholder, _) => {
                return Ok(Arc::new(PlaceholderTranscriber));
            }
            (_, Some(client)) => client.clone(),
            (_, None) => {
                warn!("Transcription backend requested but NATS is not configured; falling back to placeholder");
                return Ok(Arc::new(PlaceholderTranscriber));
            }
        };

        match self.backend {
            TranscriptionBackend::Batch => Ok(Arc::new(BatchTranscriber::new(
                client,
                self.batch_subject.clone(),
                session_id,
                self.sample_rate,
                self.channels,
                self.language.clone(),
            ))),
            TranscriptionBackend::Streaming => Ok(Arc::new(
                StreamingTranscriber::connect(
                    client,
                    &self.publish_prefix,
                    &self.results_subject,
                    session_id,
                    self.sample_rate,
                    self.channels,
                )
                .await?,
            )),
            TranscriptionBackend::Placeholder => unreachable!(),
        }
    }
}
