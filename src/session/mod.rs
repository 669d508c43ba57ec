//! Recording session management
//!
//! The `SessionController` coordinates the capture device, chunk recorder,
//! transcription client and transcript accumulator against the external
//! meeting record, from "start recording" through finalization.

mod config;
mod controller;
mod events;
mod stats;

pub use config::SessionConfig;
pub use controller::{SessionController, SessionError, SessionState};
pub use events::{EventBus, SessionEvent};
pub use stats::{SessionStats, StopSummary};
