//! Queue pipeline: moves messages through `pending → in_flight → done`.
//!
//! Per entry the states are absent, pending, in flight, done and retired.
//! [`Pipeline::claim_next`] is the only way work is handed to a consumer;
//! everything else pushes or removes single entries.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{DecodeError, QueueError, QueueResult};
use crate::mail::{decode, encode, validate_structure};
use crate::queue::store::QueueStore;
use crate::queue::types::{Message, QueueDepths, QueueNames};

/// Handle on the queue lists of one deployment.
///
/// Cheap to clone; clones share the backend.
#[derive(Clone)]
pub struct Pipeline {
    store: Arc<dyn QueueStore>,
    names: QueueNames,
}

impl Pipeline {
    pub fn new(store: Arc<dyn QueueStore>, names: QueueNames) -> Self {
        Self { store, names }
    }

    pub fn names(&self) -> &QueueNames {
        &self.names
    }

    /// Place a message on `list` (absent → pending).
    ///
    /// On error the message must not be considered queued.
    pub async fn enqueue(&self, list: &str, message: &Message) -> QueueResult<()> {
        validate_structure(message)?;
        let record = encode(message).map_err(QueueError::Encode)?;

        self.store
            .put_record(&self.names.records, &message.id, &record)
            .await?;

        if let Err(e) = self.store.push(list, &message.id).await {
            if let Err(cleanup) = self.store.delete_record(&self.names.records, &message.id).await {
                warn!(message_id = %message.id, error = %cleanup, "queue_record_cleanup_failed");
            }
            return Err(e.into());
        }

        info!(queue = list, message_id = %message.id, "message_enqueued");
        Ok(())
    }

    /// Claim the oldest entry of `from` by moving it atomically to `to`.
    ///
    /// Returns `Ok(None)` when `from` is empty. An entry whose record is
    /// missing or undecodable is removed from `to` together with its record
    /// and reported as [`QueueError::Poison`]; it is never forwarded.
    ///
    /// If the record read fails after the move, the entry is put back on the
    /// head of `from` so the failed claim has no lasting effect beyond order.
    /// When the backend refuses that too, the entry stays in `to` until
    /// [`Pipeline::recover`] runs.
    pub async fn claim_next(&self, from: &str, to: &str) -> QueueResult<Option<Message>> {
        let Some(entry) = self.store.move_atomic(from, to).await? else {
            return Ok(None);
        };

        let record = match self.store.get_record(&self.names.records, &entry).await {
            Ok(record) => record,
            Err(e) => {
                self.unclaim(from, to, &entry).await;
                return Err(e.into());
            }
        };
        let decoded = match record {
            Some(bytes) => decode(&bytes).and_then(|message| {
                if message.id == entry {
                    Ok(message)
                } else {
                    Err(DecodeError::MissingRecord(entry.clone()))
                }
            }),
            None => Err(DecodeError::MissingRecord(entry.clone())),
        };

        match decoded {
            Ok(message) => {
                debug!(source = from, dest = to, message_id = %message.id, "message_claimed");
                Ok(Some(message))
            }
            Err(source) => {
                self.drop_entry(to, &entry).await?;
                warn!(queue = to, entry = %entry, error = %source, "poison_message_dropped");
                Err(QueueError::Poison {
                    entry,
                    list: to.to_string(),
                    source,
                })
            }
        }
    }

    /// Remove one occurrence of `id` from `list`, keeping its record.
    ///
    /// Returns whether the entry was present; an absent entry is a no-op.
    pub async fn release(&self, list: &str, id: &str) -> QueueResult<bool> {
        Ok(self.store.remove_one(list, id).await?)
    }

    /// Move a claimed message from `from` to `to`, replacing its record.
    ///
    /// Used after a successful send with a `done_at` stamp on `message`.
    pub async fn forward(&self, from: &str, to: &str, message: &Message) -> QueueResult<()> {
        let record = encode(message).map_err(QueueError::Encode)?;
        self.store
            .put_record(&self.names.records, &message.id, &record)
            .await?;
        self.release(from, &message.id).await?;
        self.store.push(to, &message.id).await?;

        debug!(source = from, dest = to, message_id = %message.id, "message_forwarded");
        Ok(())
    }

    /// Drop a message from `list` after a terminal failure, without forwarding.
    pub async fn abandon(&self, list: &str, id: &str) -> QueueResult<()> {
        self.drop_entry(list, id).await?;
        warn!(queue = list, message_id = %id, "message_abandoned");
        Ok(())
    }

    /// Drop a message from `list` once its lifecycle is complete.
    pub async fn retire(&self, list: &str, id: &str) -> QueueResult<()> {
        self.drop_entry(list, id).await?;
        debug!(queue = list, message_id = %id, "message_retired");
        Ok(())
    }

    /// Move every entry of `from` back onto `to`.
    ///
    /// Run at sender startup so work stranded in flight by a crash is sent
    /// again. Returns the number of entries moved.
    pub async fn recover(&self, from: &str, to: &str) -> QueueResult<usize> {
        if from == to {
            return Ok(0);
        }

        let mut moved = 0;
        while let Some(entry) = self.store.move_atomic(from, to).await? {
            debug!(source = from, dest = to, entry = %entry, "message_recovered");
            moved += 1;
        }

        if moved > 0 {
            info!(source = from, dest = to, count = moved, "in_flight_recovered");
        }
        Ok(moved)
    }

    pub async fn depths(&self) -> QueueResult<QueueDepths> {
        Ok(QueueDepths {
            pending: self.store.len(&self.names.pending).await?,
            in_flight: self.store.len(&self.names.in_flight).await?,
            done: self.store.len(&self.names.done).await?,
        })
    }

    /// Undo a claim whose record could not be read.
    async fn unclaim(&self, from: &str, to: &str, id: &str) {
        if from == to {
            return;
        }
        // Push before removing: a failure in between duplicates, never loses
        if let Err(e) = self.store.push(from, id).await {
            warn!(queue = to, entry = %id, error = %e, "unclaim_failed");
            return;
        }
        match self.store.remove_one(to, id).await {
            Ok(_) => info!(source = to, dest = from, entry = %id, "message_unclaimed"),
            Err(e) => warn!(queue = to, entry = %id, error = %e, "unclaim_failed"),
        }
    }

    async fn drop_entry(&self, list: &str, id: &str) -> QueueResult<()> {
        self.store.remove_one(list, id).await?;
        self.store.delete_record(&self.names.records, id).await?;
        Ok(())
    }
}
