use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a meeting record.
///
/// The session controller is the sole writer of `InProgress`/`Processing`
/// during a live session; the analysis path is the sole writer of
/// `Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MeetingStatus {
    Scheduled,
    InProgress,
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
    Mixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Low,
    Medium,
    High,
}

/// Actionable task extracted from a meeting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionItem {
    pub id: String,
    pub text: String,
    pub assignee: Option<String>,
    pub due_date: Option<String>,
    pub priority: Priority,
    pub completed: bool,
}

/// The durable artifact of a recording session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeetingRecord {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub status: MeetingStatus,
    pub transcript: Option<String>,
    pub duration_secs: Option<u64>,
    pub summary: Option<String>,
    pub action_items: Option<Vec<ActionItem>>,
    pub sentiment: Option<Sentiment>,
    pub follow_up_email: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial update applied to a meeting record. `None` fields are untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeetingPatch {
    pub title: Option<String>,
    pub status: Option<MeetingStatus>,
    pub transcript: Option<String>,
    pub duration_secs: Option<u64>,
    pub summary: Option<String>,
    pub action_items: Option<Vec<ActionItem>>,
    pub sentiment: Option<Sentiment>,
    pub follow_up_email: Option<String>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl MeetingPatch {
    pub fn apply(self, record: &mut MeetingRecord) {
        if let Some(title) = self.title {
            record.title = title;
        }
        if let Some(status) = self.status {
            record.status = status;
        }
        if let Some(transcript) = self.transcript {
            record.transcript = Some(transcript);
        }
        if let Some(duration) = self.duration_secs {
            record.duration_secs = Some(duration);
        }
        if let Some(summary) = self.summary {
            record.summary = Some(summary);
        }
        if let Some(items) = self.action_items {
            record.action_items = Some(items);
        }
        if let Some(sentiment) = self.sentiment {
            record.sentiment = Some(sentiment);
        }
        if let Some(email) = self.follow_up_email {
            record.follow_up_email = Some(email);
        }
        if let Some(ended_at) = self.ended_at {
            record.ended_at = Some(ended_at);
        }
        record.updated_at = Utc::now();
    }
}
