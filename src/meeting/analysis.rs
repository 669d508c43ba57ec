use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info};

use super::record::{ActionItem, MeetingPatch, MeetingStatus, Priority, Sentiment};
use super::store::MeetingStore;

/// Shortest transcript worth analyzing. Checked locally before any remote
/// call is made.
pub const MIN_TRANSCRIPT_CHARS: usize = 50;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("transcript too short for analysis ({0} chars, need {MIN_TRANSCRIPT_CHARS})")]
    TranscriptTooShort(usize),

    #[error("analysis service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("malformed analysis response: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisSentiment {
    Positive,
    Neutral,
    Negative,
    Concerned,
}

impl From<AnalysisSentiment> for Sentiment {
    fn from(value: AnalysisSentiment) -> Self {
        match value {
            AnalysisSentiment::Positive => Sentiment::Positive,
            AnalysisSentiment::Neutral => Sentiment::Neutral,
            AnalysisSentiment::Negative => Sentiment::Negative,
            AnalysisSentiment::Concerned => Sentiment::Mixed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisPriority {
    Low,
    Medium,
    High,
}

impl From<AnalysisPriority> for Priority {
    fn from(value: AnalysisPriority) -> Self {
        match value {
            AnalysisPriority::Low => Priority::Low,
            AnalysisPriority::Medium => Priority::Medium,
            AnalysisPriority::High => Priority::High,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisActionItem {
    pub task: String,
    pub owner: Option<String>,
    pub deadline: Option<String>,
    pub priority: AnalysisPriority,
}

/// Structured insight returned by the analysis service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub title: String,
    pub summary: String,
    pub key_points: Vec<String>,
    pub action_items: Vec<AnalysisActionItem>,
    pub next_steps: String,
    pub sentiment: AnalysisSentiment,
    #[serde(default)]
    pub key_decisions: Vec<String>,
    #[serde(default)]
    pub concerns: Vec<String>,
    #[serde(default)]
    pub opportunities: Vec<String>,
}

/// Opaque analysis collaborator: transcript text in, structured result or
/// failure out.
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(&self, transcript: &str) -> Result<AnalysisResult, AnalysisError>;
}

#[derive(Serialize)]
struct AnalyzeRequest<'a> {
    transcript: &'a str,
}

#[derive(Deserialize)]
struct AnalyzeReply {
    #[serde(default)]
    error: Option<String>,
    #[serde(flatten)]
    result: Option<AnalysisResult>,
}

/// Analysis over NATS request/reply, backed by the LLM analysis service.
pub struct NatsAnalyzer {
    client: async_nats::Client,
    subject: String,
}

impl NatsAnalyzer {
    pub fn new(client: async_nats::Client, subject: impl Into<String>) -> Self {
        Self {
            client,
            subject: subject.into(),
        }
    }
}

#[async_trait]
impl Analyzer for NatsAnalyzer {
    async fn analyze(&self, transcript: &str) -> Result<AnalysisResult, AnalysisError> {
        let trimmed = transcript.trim();
        if trimmed.len() < MIN_TRANSCRIPT_CHARS {
            return Err(AnalysisError::TranscriptTooShort(trimmed.len()));
        }

        let payload = serde_json::to_vec(&AnalyzeRequest { transcript: trimmed })
            .map_err(|e| AnalysisError::Malformed(e.to_string()))?;

        let reply = self
            .client
            .request(self.subject.clone(), payload.into())
            .await
            .map_err(|e| AnalysisError::ServiceUnavailable(e.to_string()))?;

        let reply: AnalyzeReply = serde_json::from_slice(&reply.payload)
            .map_err(|e| AnalysisError::Malformed(e.to_string()))?;

        if let Some(error) = reply.error {
            return Err(AnalysisError::ServiceUnavailable(error));
        }

        reply
            .result
            .ok_or_else(|| AnalysisError::Malformed("reply missing analysis result".into()))
    }
}

/// Stands in when no analysis service is configured. Meetings stay in
/// `PROCESSING` until one is.
pub struct UnconfiguredAnalyzer;

#[async_trait]
impl Analyzer for UnconfiguredAnalyzer {
    async fn analyze(&self, _transcript: &str) -> Result<AnalysisResult, AnalysisError> {
        Err(AnalysisError::ServiceUnavailable(
            "analysis service not configured".into(),
        ))
    }
}

/// Analyze a persisted transcript and write the insight back to the store.
///
/// Success promotes the meeting to `Completed` and fills summary, action
/// items and sentiment. Failure leaves the meeting in `Processing` for the
/// user to retry via an explicit re-analyze; it is never surfaced to the
/// recording flow.
pub async fn run_analysis(
    store: Arc<dyn MeetingStore>,
    analyzer: Arc<dyn Analyzer>,
    user_id: &str,
    meeting_id: &str,
    transcript: &str,
) -> Result<AnalysisResult, AnalysisError> {
    let analysis = analyzer.analyze(transcript).await?;

    let action_items: Vec<ActionItem> = analysis
        .action_items
        .iter()
        .map(|item| ActionItem {
            id: uuid::Uuid::new_v4().to_string(),
            text: item.task.clone(),
            assignee: item.owner.clone(),
            due_date: item.deadline.clone(),
            priority: item.priority.into(),
            completed: false,
        })
        .collect();

    let patch = MeetingPatch {
        title: Some(analysis.title.clone()),
        status: Some(MeetingStatus::Completed),
        summary: Some(analysis.summary.clone()),
        action_items: Some(action_items),
        sentiment: Some(analysis.sentiment.into()),
        ..Default::default()
    };

    match store.update(user_id, meeting_id, patch).await {
        Ok(_) => {
            info!("Analysis complete for meeting {}", meeting_id);
            Ok(analysis)
        }
        Err(e) => {
            error!("Failed to persist analysis for {}: {}", meeting_id, e);
            Err(AnalysisError::ServiceUnavailable(e.to_string()))
        }
    }
}
