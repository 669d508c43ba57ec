use async_trait::async_trait;
use tracing::debug;

use super::client::{Transcriber, TranscriptionError};
use crate::audio::AudioChunk;
use crate::transcript::TranscriptFragment;

/// Fallback backend used when no transcription service is configured.
///
/// Returns a clearly-marked interim fragment per chunk so the live view
/// shows that audio is being captured; it never errors and never produces
/// final text, so nothing from it reaches the canonical transcript.
pub struct PlaceholderTranscriber;

#[async_trait]
impl Transcriber for PlaceholderTranscriber {
    async fn transcribe(
        &self,
        chunk: &AudioChunk,
    ) -> Result<Option<TranscriptFragment>, TranscriptionError> {
        debug!(
            "Placeholder fragment for chunk {} ({} bytes)",
            chunk.sequence,
            chunk.len_bytes()
        );
        Ok(Some(TranscriptFragment::interim(
            format!(
                "[{}s] Audio captured (transcription pending...)",
                chunk.timestamp_ms / 1000
            ),
            chunk.timestamp_ms,
        )))
    }

    async fn transcribe_full(
        &self,
        _audio_wav: &[u8],
    ) -> Result<Option<TranscriptFragment>, TranscriptionError> {
        Ok(None)
    }

    fn name(&self) -> &str {
        "placeholder"
    }
}
