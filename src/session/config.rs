use std::time::Duration;

use crate::audio::DEFAULT_CHUNK_INTERVAL;

/// Configuration for one recording session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Verified user the meeting record belongs to.
    pub user_id: String,

    /// Title the meeting record is created with. Analysis may replace it
    /// with a generated one later.
    pub title: String,

    /// Interval between emitted audio chunks. Default: 5 seconds.
    pub chunk_interval: Duration,

    /// How long finalization waits for in-flight transcription calls
    /// before snapshotting the canonical transcript. Results arriving
    /// later are discarded.
    pub straggler_grace: Duration,

    /// PCM format the capture device is asked for.
    pub sample_rate: u32,
    pub channels: u16,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            user_id: String::new(),
            title: "Untitled Meeting".to_string(),
            chunk_interval: DEFAULT_CHUNK_INTERVAL,
            straggler_grace: Duration::from_millis(500),
            sample_rate: 16000,
            channels: 1,
        }
    }
}
