use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;

use super::record::{MeetingPatch, MeetingRecord, MeetingStatus};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PersistenceError {
    /// Also returned for records owned by another user: a foreign record is
    /// indistinguishable from a missing one.
    #[error("meeting not found")]
    NotFound,

    #[error("meeting store unavailable: {0}")]
    Unavailable(String),
}

/// External meeting record store. All operations are scoped to the
/// authenticated user.
#[async_trait]
pub trait MeetingStore: Send + Sync {
    async fn create(&self, user_id: &str, title: &str) -> Result<MeetingRecord, PersistenceError>;

    async fn get(&self, user_id: &str, id: &str) -> Result<MeetingRecord, PersistenceError>;

    async fn list(&self, user_id: &str) -> Result<Vec<MeetingRecord>, PersistenceError>;

    async fn update(
        &self,
        user_id: &str,
        id: &str,
        patch: MeetingPatch,
    ) -> Result<MeetingRecord, PersistenceError>;

    async fn delete(&self, user_id: &str, id: &str) -> Result<(), PersistenceError>;
}

/// Process-local store backing development and tests. The production
/// deployment swaps in a database-backed implementation behind the same
/// trait.
#[derive(Default)]
pub struct InMemoryMeetingStore {
    records: RwLock<HashMap<String, MeetingRecord>>,
}

impl InMemoryMeetingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MeetingStore for InMemoryMeetingStore {
    async fn create(&self, user_id: &str, title: &str) -> Result<MeetingRecord, PersistenceError> {
        let now = Utc::now();
        let record = MeetingRecord {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            title: title.to_string(),
            status: MeetingStatus::InProgress,
            transcript: None,
            duration_secs: None,
            summary: None,
            action_items: None,
            sentiment: None,
            follow_up_email: None,
            started_at: Some(now),
            ended_at: None,
            created_at: now,
            updated_at: now,
        };

        info!("Meeting created: {} ({})", record.id, record.title);

        self.records
            .write()
            .await
            .insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn get(&self, user_id: &str, id: &str) -> Result<MeetingRecord, PersistenceError> {
        let records = self.records.read().await;
        records
            .get(id)
            .filter(|r| r.user_id == user_id)
            .cloned()
            .ok_or(PersistenceError::NotFound)
    }

    async fn list(&self, user_id: &str) -> Result<Vec<MeetingRecord>, PersistenceError> {
        let records = self.records.read().await;
        let mut meetings: Vec<MeetingRecord> = records
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        meetings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(meetings)
    }

    async fn update(
        &self,
        user_id: &str,
        id: &str,
        patch: MeetingPatch,
    ) -> Result<MeetingRecord, PersistenceError> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(id)
            .filter(|r| r.user_id == user_id)
            .ok_or(PersistenceError::NotFound)?;
        patch.apply(record);
        Ok(record.clone())
    }

    async fn delete(&self, user_id: &str, id: &str) -> Result<(), PersistenceError> {
        let mut records = self.records.write().await;
        match records.get(id) {
            Some(r) if r.user_id == user_id => {
                records.remove(id);
                info!("Meeting deleted: {}", id);
                Ok(())
            }
            _ => Err(PersistenceError::NotFound),
        }
    }
}
