use async_trait::async_trait;
use base64::Engine;
use tracing::debug;

use super::client::{Transcriber, TranscriptionError};
use super::messages::{TranscribeReply, TranscribeRequest};
use crate::audio::AudioChunk;
use crate::transcript::TranscriptFragment;

const RATE_LIMITED: &str = "rate_limited";

/// Request/reply transcription over NATS: one round trip per chunk, one
/// more at stop time for the merged full-session audio.
pub struct BatchTranscriber {
    client: async_nats::Client,
    subject: String,
    session_id: String,
    sample_rate: u32,
    channels: u16,
    language: String,
}

impl BatchTranscriber {
    pub fn new(
        client: async_nats::Client,
        subject: impl Into<String>,
        session_id: impl Into<String>,
        sample_rate: u32,
        channels: u16,
        language: impl Into<String>,
    ) -> Self {
        Self {
            client,
            subject: subject.into(),
            session_id: session_id.into(),
            sample_rate,
            channels,
            language: language.into(),
        }
    }

    async fn request(
        &self,
        audio: &[u8],
    ) -> Result<TranscribeReply, TranscriptionError> {
        let request = TranscribeRequest {
            session_id: self.session_id.clone(),
            audio: base64::engine::general_purpose::STANDARD.encode(audio),
            sample_rate: self.sample_rate,
            channels: self.channels,
            language: self.language.clone(),
            punctuate: true,
            diarize: true,
        };

        let payload = serde_json::to_vec(&request)
            .map_err(|e| TranscriptionError::Malformed(e.to_string()))?;

        let reply = self
            .client
            .request(self.subject.clone(), payload.into())
            .await
            .map_err(|e| TranscriptionError::ServiceUnavailable(e.to_string()))?;

        let reply: TranscribeReply = serde_json::from_slice(&reply.payload)
            .map_err(|e| TranscriptionError::Malformed(e.to_string()))?;

        match reply.error.as_deref() {
            Some(RATE_LIMITED) => Err(TranscriptionError::RateLimited),
            Some(other) => Err(TranscriptionError::ServiceUnavailable(other.to_string())),
            None => Ok(reply),
        }
    }

    fn fragment_from_reply(
        reply: TranscribeReply,
        timestamp_ms: u64,
    ) -> Result<Option<TranscriptFragment>, TranscriptionError> {
        let text = reply
            .text
            .ok_or_else(|| TranscriptionError::Malformed("reply missing text".into()))?;

        if text.trim().is_empty() {
            debug!("No speech detected at {} ms", timestamp_ms);
            return Ok(None);
        }

        let mut fragment =
            TranscriptFragment::final_text(text, timestamp_ms, reply.confidence.unwrap_or(0.0));
        fragment.speaker = reply.words.first().and_then(|w| w.speaker);
        Ok(Some(fragment))
    }
}

#[async_trait]
impl Transcriber for BatchTranscriber {
    async fn transcribe(
        &self,
        chunk: &AudioChunk,
    ) -> Result<Option<TranscriptFragment>, TranscriptionError> {
        let reply = self.request(&chunk.data).await?;
        Self::fragment_from_reply(reply, chunk.timestamp_ms)
    }

    async fn transcribe_full(
        &self,
        audio_wav: &[u8],
    ) -> Result<Option<TranscriptFragment>, TranscriptionError> {
        let reply = self.request(audio_wav).await?;
        Self::fragment_from_reply(reply, 0)
    }

    fn name(&self) -> &str {
        "batch"
    }
}
