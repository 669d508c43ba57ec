use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::audio::CaptureDevice;
use crate::meeting::{Analyzer, EmailGenerator, MeetingStore};
use crate::session::{SessionConfig, SessionController};
use crate::transcription::TranscriberFactory;

/// Produces a fresh capture device per session; the device handle is
/// exclusively owned by one recorder at a time.
pub type DeviceFactory = Arc<dyn Fn() -> Box<dyn CaptureDevice> + Send + Sync>;

/// Shared application state for HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// Live sessions, keyed by client-local session key.
    pub sessions: Arc<RwLock<HashMap<String, Arc<SessionController>>>>,

    pub store: Arc<dyn MeetingStore>,
    pub analyzer: Arc<dyn Analyzer>,
    pub email: Arc<dyn EmailGenerator>,
    pub transcriber_factory: TranscriberFactory,
    pub device_factory: DeviceFactory,

    /// Template for per-session configuration; user and title are filled
    /// in per request.
    pub session_defaults: SessionConfig,
}

impl AppState {
    pub fn new(
        store: Arc<dyn MeetingStore>,
        analyzer: Arc<dyn Analyzer>,
        email: Arc<dyn EmailGenerator>,
        transcriber_factory: TranscriberFactory,
        device_factory: DeviceFactory,
        session_defaults: SessionConfig,
    ) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            store,
            analyzer,
            email,
            transcriber_factory,
            device_factory,
            session_defaults,
        }
    }
}
