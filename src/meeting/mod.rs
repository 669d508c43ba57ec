//! Meeting records and the external collaborators that act on them:
//! the record store, the LLM analysis service and the follow-up email
//! generator.

pub mod analysis;
pub mod email;
pub mod record;
pub mod store;

pub use analysis::{
    run_analysis, AnalysisActionItem, AnalysisError, AnalysisResult, AnalysisSentiment, Analyzer,
    NatsAnalyzer, UnconfiguredAnalyzer, MIN_TRANSCRIPT_CHARS,
};
pub use email::{
    EmailContext, EmailError, EmailGenerator, NatsEmailGenerator, Tone, UnconfiguredEmailGenerator,
};
pub use record::{ActionItem, MeetingPatch, MeetingRecord, MeetingStatus, Priority, Sentiment};
pub use store::{InMemoryMeetingStore, MeetingStore, PersistenceError};
