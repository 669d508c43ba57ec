use serde::{Deserialize, Serialize};

/// A unit of recognized text for one chunk or the full recording.
///
/// Immutable once produced. Interim fragments (`is_final == false`) are
/// provisional and never contribute to the canonical transcript; they are
/// kept append-only in the live view and never retracted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptFragment {
    pub id: String,

    pub text: String,

    /// Speaker index from diarization, when the service provides one.
    pub speaker: Option<u32>,

    /// Capture-relative timestamp of the audio this text covers, in
    /// milliseconds. Canonical ordering uses this, never arrival order.
    pub timestamp_ms: u64,

    #[serde(rename = "isFinal")]
    pub is_final: bool,

    /// Service confidence in 0.0-1.0.
    pub confidence: f32,
}

impl TranscriptFragment {
    pub fn final_text(text: impl Into<String>, timestamp_ms: u64, confidence: f32) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            text: text.into(),
            speaker: None,
            timestamp_ms,
            is_final: true,
            confidence,
        }
    }

    pub fn interim(text: impl Into<String>, timestamp_ms: u64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            text: text.into(),
            speaker: None,
            timestamp_ms,
            is_final: false,
            confidence: 0.0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}
