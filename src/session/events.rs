use serde::Serialize;
use tokio::sync::broadcast;

use super::controller::SessionState;
use crate::transcript::TranscriptFragment;

/// Typed notifications published by a session for any attached UI.
///
/// This is the explicit message-passing channel that replaces ad hoc
/// cross-window broadcasts: every consumer subscribes to a typed stream
/// scoped to one session.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionEvent {
    StateChanged { state: SessionState },
    MeetingCreated { meeting_id: String },
    TranscriptUpdate { fragment: TranscriptFragment },
    /// Best-effort loudness sample in 0-100, for metering only.
    AudioLevel { level: u8 },
    AnalysisComplete { meeting_id: String },
    SessionError { message: String },
}

/// Broadcast bus for [`SessionEvent`]s. Publishing never blocks and never
/// fails; events are dropped when nobody is listening.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SessionEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn publish(&self, event: SessionEvent) {
        // No receivers is fine; sessions run headless in tests.
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
