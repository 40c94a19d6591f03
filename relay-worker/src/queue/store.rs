//! Queue store capability.
//!
//! A list-based key-value backend. Lists hold message ids; the encoded
//! message for each id lives in a separate record hash so that list
//! membership never depends on the exact bytes of a serialization.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::BackendError;

/// Operations the pipeline needs from a queue backend.
///
/// Every operation must be safe to call concurrently from several tasks or
/// processes sharing the same backend.
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Append `entry` to the head of `list`.
    async fn push(&self, list: &str, entry: &str) -> Result<(), BackendError>;

    /// Remove the first occurrence of `entry` from `list`.
    ///
    /// Returns whether an occurrence was found. A missing entry is not an error.
    async fn remove_one(&self, list: &str, entry: &str) -> Result<bool, BackendError>;

    /// Atomically pop the tail of `source` and push it to the head of `dest`.
    ///
    /// Returns `None` when `source` is empty. Each entry is handed to exactly
    /// one caller.
    async fn move_atomic(&self, source: &str, dest: &str) -> Result<Option<String>, BackendError>;

    /// Number of entries in `list`.
    async fn len(&self, list: &str) -> Result<usize, BackendError>;

    /// Store the encoded record for `id` in `hash`, replacing any previous one.
    async fn put_record(&self, hash: &str, id: &str, record: &[u8]) -> Result<(), BackendError>;

    async fn get_record(&self, hash: &str, id: &str) -> Result<Option<Vec<u8>>, BackendError>;

    async fn delete_record(&self, hash: &str, id: &str) -> Result<(), BackendError>;
}

#[derive(Default)]
struct MemoryState {
    lists: HashMap<String, VecDeque<String>>,
    hashes: HashMap<String, HashMap<String, Vec<u8>>>,
}

/// In-process queue store.
///
/// Cloning shares the underlying state. Used by tests and local runs; the
/// `set_available` switch simulates a backend outage.
#[derive(Clone, Default)]
pub struct MemoryQueueStore {
    state: Arc<Mutex<MemoryState>>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryQueueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle whether operations succeed.
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Snapshot of `list`, head first.
    pub async fn entries(&self, list: &str) -> Vec<String> {
        let state = self.state.lock().await;
        state
            .lists
            .get(list)
            .map(|l| l.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Insert a raw record without going through the codec.
    pub async fn insert_raw(&self, hash: &str, id: &str, record: &[u8]) {
        let mut state = self.state.lock().await;
        state
            .hashes
            .entry(hash.to_string())
            .or_default()
            .insert(id.to_string(), record.to_vec());
    }

    fn check(&self) -> Result<(), BackendError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(BackendError::Unavailable("memory store switched off".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl QueueStore for MemoryQueueStore {
    async fn push(&self, list: &str, entry: &str) -> Result<(), BackendError> {
        self.check()?;
        let mut state = self.state.lock().await;
        state
            .lists
            .entry(list.to_string())
            .or_default()
            .push_front(entry.to_string());
        Ok(())
    }

    async fn remove_one(&self, list: &str, entry: &str) -> Result<bool, BackendError> {
        self.check()?;
        let mut state = self.state.lock().await;
        let Some(items) = state.lists.get_mut(list) else {
            return Ok(false);
        };
        match items.iter().position(|e| e == entry) {
            Some(index) => {
                items.remove(index);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn move_atomic(&self, source: &str, dest: &str) -> Result<Option<String>, BackendError> {
        self.check()?;
        let mut state = self.state.lock().await;
        let Some(entry) = state.lists.get_mut(source).and_then(|l| l.pop_back()) else {
            return Ok(None);
        };
        state
            .lists
            .entry(dest.to_string())
            .or_default()
            .push_front(entry.clone());
        Ok(Some(entry))
    }

    async fn len(&self, list: &str) -> Result<usize, BackendError> {
        self.check()?;
        let state = self.state.lock().await;
        Ok(state.lists.get(list).map(|l| l.len()).unwrap_or(0))
    }

    async fn put_record(&self, hash: &str, id: &str, record: &[u8]) -> Result<(), BackendError> {
        self.check()?;
        self.insert_raw(hash, id, record).await;
        Ok(())
    }

    async fn get_record(&self, hash: &str, id: &str) -> Result<Option<Vec<u8>>, BackendError> {
        self.check()?;
        let state = self.state.lock().await;
        Ok(state.hashes.get(hash).and_then(|h| h.get(id)).cloned())
    }

    async fn delete_record(&self, hash: &str, id: &str) -> Result<(), BackendError> {
        self.check()?;
        let mut state = self.state.lock().await;
        if let Some(h) = state.hashes.get_mut(hash) {
            h.remove(id);
        }
        Ok(())
    }
}
