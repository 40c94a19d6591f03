//! Finalizer: `done → mark processed → retire`.
//!
//! Claims rotate the done list onto itself, so an entry whose record update
//! fails stays in the done list and is retried on a later cycle.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, warn};

use crate::error::{RelayError, StoreError};
use crate::queue::Pipeline;
use crate::store::RecordStore;
use crate::worker::scheduler::{Cycle, CycleOutcome};

/// Finalizer role of the relay.
pub struct Finalizer {
    pipeline: Pipeline,
    records: Arc<dyn RecordStore>,
}

impl Finalizer {
    pub fn new(pipeline: Pipeline, records: Arc<dyn RecordStore>) -> Self {
        Self { pipeline, records }
    }
}

#[async_trait]
impl Cycle for Finalizer {
    fn role(&self) -> &'static str {
        "finalizer"
    }

    async fn run_cycle(&mut self) -> Result<CycleOutcome, RelayError> {
        let done = self.pipeline.names().done.clone();

        let Some(message) = self.pipeline.claim_next(&done, &done).await? else {
            return Ok(CycleOutcome::Idle);
        };

        let done_at = message.done_at.unwrap_or_else(|| {
            warn!(message_id = %message.id, "message_missing_done_stamp");
            Utc::now()
        });

        match self.records.mark_processed(&message.id, done_at).await {
            Ok(()) => {
                self.pipeline.retire(&done, &message.id).await?;
                info!(message_id = %message.id, done_at = %done_at, "message_processed");
                Ok(CycleOutcome::Worked)
            }
            Err(StoreError::NotFound(id)) => {
                warn!(message_id = %id, "message_record_missing");
                self.pipeline.retire(&done, &message.id).await?;
                Err(StoreError::NotFound(id).into())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::queue::{Message, MemoryQueueStore, QueueNames, QueueStore};
    use crate::store::{MemoryRecordStore, NewRecord};
    use crate::worker::scheduler::{Intervals, PollLoop};

    struct Harness {
        store: MemoryQueueStore,
        pipeline: Pipeline,
        records: MemoryRecordStore,
        names: QueueNames,
    }

    impl Harness {
        fn new() -> Self {
            let store = MemoryQueueStore::new();
            let pipeline = Pipeline::new(Arc::new(store.clone()), QueueNames::default());
            let names = pipeline.names().clone();
            Self {
                store,
                pipeline,
                records: MemoryRecordStore::new(),
                names,
            }
        }

        /// Insert a record and place its delivered message on the done list.
        async fn delivered(&self) -> Message {
            let record = NewRecord::new("a@b.com".to_string(), "S".to_string(), "hi".to_string());
            let id = self.records.insert(&record).await.unwrap();
            let message = record.into_message(id).delivered_at(Utc::now());
            self.pipeline.enqueue(&self.names.done, &message).await.unwrap();
            message
        }

        fn poll_loop(&self) -> PollLoop<Finalizer> {
            let finalizer = Finalizer::new(self.pipeline.clone(), Arc::new(self.records.clone()));
            PollLoop::new(finalizer, intervals())
        }
    }

    fn intervals() -> Intervals {
        Intervals::new(Duration::from_millis(3000), Duration::from_millis(1000))
    }

    #[tokio::test]
    async fn test_finalize_marks_processed_and_retires() {
        let harness = Harness::new();
        let message = harness.delivered().await;
        let mut poll = harness.poll_loop();

        assert_eq!(poll.tick().await, intervals().active);

        let record = harness.records.get(&message.id).await.unwrap().unwrap();
        assert!(record.processed);
        assert_eq!(record.done_at, message.done_at);
        assert!(harness.store.entries(&harness.names.done).await.is_empty());
        assert!(harness
            .store
            .get_record(&harness.names.records, &message.id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_store_failure_keeps_entry_for_retry() {
        let harness = Harness::new();
        let message = harness.delivered().await;
        harness.records.set_available(false);
        let mut poll = harness.poll_loop();

        assert_eq!(poll.tick().await, intervals().idle);
        assert_eq!(harness.store.entries(&harness.names.done).await, vec![message.id.clone()]);

        harness.records.set_available(true);
        assert_eq!(poll.tick().await, intervals().active);
        assert!(harness.records.get(&message.id).await.unwrap().unwrap().processed);
        assert!(harness.store.entries(&harness.names.done).await.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_record_is_retired() {
        let harness = Harness::new();
        let message = Message::new(
            "ghost".to_string(),
            "a@b.com".to_string(),
            "S".to_string(),
            "hi".to_string(),
        )
        .delivered_at(Utc::now());
        harness.pipeline.enqueue(&harness.names.done, &message).await.unwrap();
        let mut poll = harness.poll_loop();

        assert_eq!(poll.tick().await, intervals().idle);
        assert!(harness.store.entries(&harness.names.done).await.is_empty());
    }

    #[tokio::test]
    async fn test_empty_done_list_is_idle() {
        let harness = Harness::new();
        let mut poll = harness.poll_loop();

        assert_eq!(poll.tick().await, intervals().idle);
        assert_eq!(harness.records.len().await, 0);
    }
}
