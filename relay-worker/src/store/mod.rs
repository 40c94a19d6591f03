//! Durable record store.
//!
//! Every accepted submission gets a record here before it is queued. The
//! record is the source of truth submitters poll: `processed` flips to true
//! once, after the message has been delivered and finalized.

pub mod sqlite;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::StoreError;
use crate::queue::Message;

pub use sqlite::SqliteRecordStore;

/// Fields of a submission before an id is assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecord {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub enqueued_at: DateTime<Utc>,
}

impl NewRecord {
    pub fn new(to: String, subject: String, body: String) -> Self {
        Self {
            to,
            subject,
            body,
            enqueued_at: Utc::now(),
        }
    }

    /// The queue message for this record once `id` is known.
    pub fn into_message(self, id: String) -> Message {
        Message {
            id,
            to: self.to,
            subject: self.subject,
            body: self.body,
            enqueued_at: self.enqueued_at,
            done_at: None,
            processed: false,
        }
    }
}

/// Operations the relay needs from the durable store.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert an unprocessed record and return its new id.
    async fn insert(&self, record: &NewRecord) -> Result<String, StoreError>;

    /// Mark a record processed with its delivery time.
    ///
    /// Succeeds without change if the record is already processed. Fails with
    /// [`StoreError::NotFound`] for an unknown id.
    async fn mark_processed(&self, id: &str, done_at: DateTime<Utc>) -> Result<(), StoreError>;

    async fn get(&self, id: &str) -> Result<Option<Message>, StoreError>;
}

/// New record identifier.
pub fn new_record_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// In-process record store for tests and local runs.
#[derive(Clone, Default)]
pub struct MemoryRecordStore {
    records: Arc<Mutex<HashMap<String, Message>>>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle whether operations succeed.
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store switched off".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn insert(&self, record: &NewRecord) -> Result<String, StoreError> {
        self.check()?;
        let id = new_record_id();
        let message = record.clone().into_message(id.clone());
        self.records.lock().await.insert(id.clone(), message);
        Ok(id)
    }

    async fn mark_processed(&self, id: &str, done_at: DateTime<Utc>) -> Result<(), StoreError> {
        self.check()?;
        let mut records = self.records.lock().await;
        let record = records
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        if !record.processed {
            record.processed = true;
            record.done_at = Some(done_at);
        }
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Message>, StoreError> {
        self.check()?;
        Ok(self.records.lock().await.get(id).cloned())
    }
}
