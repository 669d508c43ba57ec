use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::record::MeetingRecord;

#[derive(Debug, Error)]
pub enum EmailError {
    /// Follow-up email generation needs a completed analysis first.
    #[error("meeting has no summary yet")]
    NoSummary,

    #[error("email service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("malformed email response: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Formal,
    Casual,
    Friendly,
}

impl Default for Tone {
    fn default() -> Self {
        Tone::Friendly
    }
}

/// Meeting facts handed to the email generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailContext {
    pub title: String,
    pub date: String,
    pub summary: String,
    pub action_items: Vec<String>,
    pub sentiment: Option<String>,
}

impl EmailContext {
    /// Build the context from a persisted record. Fails when no summary
    /// exists yet: email generation is only valid after analysis.
    pub fn from_record(record: &MeetingRecord) -> Result<Self, EmailError> {
        let summary = record.summary.clone().ok_or(EmailError::NoSummary)?;
        Ok(Self {
            title: record.title.clone(),
            date: record
                .started_at
                .map(|t| t.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            summary,
            action_items: record
                .action_items
                .iter()
                .flatten()
                .map(|item| {
                    format!(
                        "{} (Owner: {}, Due: {})",
                        item.text,
                        item.assignee.as_deref().unwrap_or("TBD"),
                        item.due_date.as_deref().unwrap_or("TBD"),
                    )
                })
                .collect(),
            sentiment: record.sentiment.map(|s| format!("{:?}", s)),
        })
    }
}

/// Opaque follow-up email collaborator.
#[async_trait]
pub trait EmailGenerator: Send + Sync {
    async fn generate(&self, context: &EmailContext, tone: Tone) -> Result<String, EmailError>;
}

/// Stands in when no email service is configured.
pub struct UnconfiguredEmailGenerator;

#[async_trait]
impl EmailGenerator for UnconfiguredEmailGenerator {
    async fn generate(&self, _context: &EmailContext, _tone: Tone) -> Result<String, EmailError> {
        Err(EmailError::ServiceUnavailable(
            "email service not configured".into(),
        ))
    }
}

#[derive(Serialize)]
struct EmailRequest<'a> {
    context: &'a EmailContext,
    tone: Tone,
}

#[derive(Deserialize)]
struct EmailReply {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    body: Option<String>,
}

/// Email generation over NATS request/reply.
pub struct NatsEmailGenerator {
    client: async_nats::Client,
    subject: String,
}

impl NatsEmailGenerator {
    pub fn new(client: async_nats::Client, subject: impl Into<String>) -> Self {
        Self {
            client,
            subject: subject.into(),
        }
    }
}

#[async_trait]
impl EmailGenerator for NatsEmailGenerator {
    async fn generate(&self, context: &EmailContext, tone: Tone) -> Result<String, EmailError> {
        let payload = serde_json::to_vec(&EmailRequest { context, tone })
            .map_err(|e| EmailError::Malformed(e.to_string()))?;

        let reply = self
            .client
            .request(self.subject.clone(), payload.into())
            .await
            .map_err(|e| EmailError::ServiceUnavailable(e.to_string()))?;

        let reply: EmailReply = serde_json::from_slice(&reply.payload)
            .map_err(|e| EmailError::Malformed(e.to_string()))?;

        if let Some(error) = reply.error {
            return Err(EmailError::ServiceUnavailable(error));
        }

        reply
            .body
            .ok_or_else(|| EmailError::Malformed("reply missing email body".into()))
    }
}
