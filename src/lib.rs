pub mod audio;
pub mod config;
pub mod http;
pub mod meeting;
pub mod session;
pub mod transcript;
pub mod transcription;

pub use audio::{
    merge_chunks_to_wav, AudioChunk, CaptureDevice, ChunkRecorder, DeviceError, PcmFrame,
    RecorderState, ScriptedDevice,
};
pub use config::Config;
pub use http::{create_router, AppState};
pub use meeting::{
    Analyzer, EmailGenerator, InMemoryMeetingStore, MeetingPatch, MeetingRecord, MeetingStatus,
    MeetingStore, PersistenceError,
};
pub use session::{
    SessionConfig, SessionController, SessionError, SessionEvent, SessionState, SessionStats,
    StopSummary,
};
pub use transcript::{TranscriptAccumulator, TranscriptFragment};
pub use transcription::{Transcriber, TranscriberFactory, TranscriptionBackend, TranscriptionError};
