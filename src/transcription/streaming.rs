use std::sync::atomic::{AtomicU32, Ordering};

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use futures::stream::StreamExt;
use tokio::sync::{mpsc, Mutex};
use tracing::{info, warn};

use super::client::{Transcriber, TranscriptionError};
use super::messages::{AudioFrameMessage, TranscriptMessage};
use crate::audio::AudioChunk;
use crate::transcript::TranscriptFragment;

/// Streaming transcription over NATS pub/sub.
///
/// Chunks are published as audio frames; interim and final results arrive
/// asynchronously on the results subject and are surfaced through
/// [`Transcriber::take_results`]. A full-audio re-pass is not part of this
/// transport, so `transcribe_full` only publishes the end-of-stream marker.
pub struct StreamingTranscriber {
    client: async_nats::Client,
    publish_subject: String,
    session_id: String,
    sample_rate: u32,
    channels: u16,
    sequence: AtomicU32,
    results: Mutex<Option<mpsc::Receiver<TranscriptFragment>>>,
}

impl StreamingTranscriber {
    /// Subscribe to results for one session and return the transcriber.
    pub async fn connect(
        client: async_nats::Client,
        publish_prefix: &str,
        results_subject: &str,
        session_id: impl Into<String>,
        sample_rate: u32,
        channels: u16,
    ) -> Result<Self> {
        let session_id = session_id.into();

        let mut subscriber = client
            .subscribe(results_subject.to_string())
            .await
            .context("Failed to subscribe to transcription results")?;

        info!(
            "Streaming transcriber subscribed to {} for session {}",
            results_subject, session_id
        );

        let (tx, rx) = mpsc::channel(100);
        let own_session = session_id.clone();

        tokio::spawn(async move {
            while let Some(msg) = subscriber.next().await {
                let message: TranscriptMessage = match serde_json::from_slice(&msg.payload) {
                    Ok(m) => m,
                    Err(e) => {
                        warn!("Failed to parse transcript message: {}", e);
                        continue;
                    }
                };

                // Results for other sessions share the subject.
                if message.session_id != own_session {
                    continue;
                }
                if message.text.trim().is_empty() {
                    continue;
                }

                let mut fragment = if message.partial {
                    TranscriptFragment::interim(message.text, message.timestamp_ms)
                } else {
                    TranscriptFragment::final_text(
                        message.text,
                        message.timestamp_ms,
                        message.confidence,
                    )
                };
                fragment.speaker = message.speaker;

                if tx.send(fragment).await.is_err() {
                    // Session finished and dropped its receiver.
                    break;
                }
            }
            info!("Streaming transcriber listener stopped");
        });

        Ok(Self {
            publish_subject: format!("{}.{}", publish_prefix, session_id),
            client,
            session_id,
            sample_rate,
            channels,
            sequence: AtomicU32::new(0),
            results: Mutex::new(Some(rx)),
        })
    }

    async fn publish_frame(
        &self,
        pcm: &[u8],
        timestamp_ms: u64,
        final_frame: bool,
    ) -> Result<(), TranscriptionError> {
        let message = AudioFrameMessage {
            session_id: self.session_id.clone(),
            sequence: self.sequence.fetch_add(1, Ordering::SeqCst),
            pcm: base64::engine::general_purpose::STANDARD.encode(pcm),
            sample_rate: self.sample_rate,
            channels: self.channels,
            timestamp_ms,
            final_frame,
        };

        let payload = serde_json::to_vec(&message)
            .map_err(|e| TranscriptionError::Malformed(e.to_string()))?;

        self.client
            .publish(self.publish_subject.clone(), payload.into())
            .await
            .map_err(|e| TranscriptionError::ServiceUnavailable(e.to_string()))
    }
}

#[async_trait]
impl Transcriber for StreamingTranscriber {
    async fn transcribe(
        &self,
        chunk: &AudioChunk,
    ) -> Result<Option<TranscriptFragment>, TranscriptionError> {
        self.publish_frame(&chunk.data, chunk.timestamp_ms, false)
            .await?;
        // Fragments arrive through the results stream, not this call.
        Ok(None)
    }

    async fn transcribe_full(
        &self,
        _audio_wav: &[u8],
    ) -> Result<Option<TranscriptFragment>, TranscriptionError> {
        // End-of-stream marker so the service flushes its last utterance.
        self.publish_frame(&[], 0, true).await?;
        Ok(None)
    }

    async fn take_results(&self) -> Option<mpsc::Receiver<TranscriptFragment>> {
        self.results.lock().await.take()
    }

    fn name(&self) -> &str {
        "streaming"
    }
}
