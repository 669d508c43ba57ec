use serde::{Deserialize, Serialize};

/// Batch transcription request, sent over NATS request/reply.
#[derive(Debug, Serialize, Deserialize)]
pub struct TranscribeRequest {
    pub session_id: String,
    /// Base64-encoded audio bytes (raw PCM for chunks, WAV for full audio).
    pub audio: String,
    pub sample_rate: u32,
    pub channels: u16,
    pub language: String,
    pub punctuate: bool,
    pub diarize: bool,
}

/// One recognized word with timing and confidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordInfo {
    pub word: String,
    pub start_ms: u64,
    pub end_ms: u64,
    pub confidence: f32,
    pub speaker: Option<u32>,
}

/// Reply to a [`TranscribeRequest`].
///
/// `error` is set instead of `text` when the service refuses the request;
/// the well-known value `"rate_limited"` maps to its own error variant.
#[derive(Debug, Serialize, Deserialize)]
pub struct TranscribeReply {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub words: Vec<WordInfo>,
    #[serde(default)]
    pub confidence: Option<f32>,
}

/// Audio frame published on the streaming transport.
#[derive(Debug, Serialize, Deserialize)]
pub struct AudioFrameMessage {
    pub session_id: String,
    pub sequence: u32,
    /// Base64-encoded PCM bytes. Empty on the final frame marker.
    pub pcm: String,
    pub sample_rate: u32,
    pub channels: u16,
    /// Capture-relative position of this frame, in milliseconds.
    pub timestamp_ms: u64,
    #[serde(rename = "final")]
    pub final_frame: bool,
}

/// Incremental result received from the streaming transcription service.
#[derive(Debug, Serialize, Deserialize)]
pub struct TranscriptMessage {
    pub session_id: String,
    pub text: String,
    pub partial: bool,
    /// Capture-relative position of the audio this text covers.
    pub timestamp_ms: u64,
    pub confidence: f32,
    #[serde(default)]
    pub speaker: Option<u32>,
}
