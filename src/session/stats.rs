use chrono::{DateTime, Utc};
use serde::Serialize;

use super::controller::SessionState;

/// Point-in-time view of a live session, served over the control API.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    pub session_key: String,

    /// Server-assigned meeting id; absent until creation completes.
    pub meeting_id: Option<String>,

    pub state: SessionState,
    pub paused: bool,

    pub started_at: Option<DateTime<Utc>>,

    /// Recorded audio time so far in seconds, paused intervals excluded.
    pub duration_secs: f64,

    pub chunks_captured: usize,
    pub fragment_count: usize,
    pub final_fragment_count: usize,
}

/// Outcome of a successful stop, returned to the caller that drove it.
#[derive(Debug, Clone, Serialize)]
pub struct StopSummary {
    pub meeting_id: String,
    pub duration_secs: u64,
    pub transcript_chars: usize,
    /// Whether the transcript cleared the length threshold and analysis
    /// was dispatched.
    pub analysis_dispatched: bool,
}
