//! Queue message types for the three-list rotation.
//!
//! A message moves through the lists as
//! `pending → in_flight → done`, and is then retired once the durable
//! record has been marked processed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default name of the list holding messages waiting to be sent.
pub const PENDING_QUEUE: &str = "messages";

/// Default name of the list holding messages claimed by the sender.
pub const IN_FLIGHT_QUEUE: &str = "processing";

/// Default name of the list holding sent messages awaiting finalization.
pub const DONE_QUEUE: &str = "processed";

/// Default name of the hash holding entry records keyed by message id.
pub const RECORDS_KEY: &str = "messages:records";

/// An outbound email, the unit of work carried through the queues.
///
/// Field order is the wire order; the codec relies on it being stable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Identifier assigned by the durable store
    pub id: String,
    /// Recipient address
    pub to: String,
    pub subject: String,
    pub body: String,
    /// Time of first submission
    pub enqueued_at: DateTime<Utc>,
    /// Time of confirmed delivery
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done_at: Option<DateTime<Utc>>,
    /// Whether the durable record reflects delivery
    #[serde(default)]
    pub processed: bool,
}

impl Message {
    /// Create a message that has just been accepted.
    pub fn new(id: String, to: String, subject: String, body: String) -> Self {
        Self {
            id,
            to,
            subject,
            body,
            enqueued_at: Utc::now(),
            done_at: None,
            processed: false,
        }
    }

    /// Return a copy stamped as delivered at `at`.
    pub fn delivered_at(&self, at: DateTime<Utc>) -> Self {
        Self {
            done_at: Some(at),
            ..self.clone()
        }
    }
}

/// Names of the lists and the record hash a pipeline works on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueNames {
    pub pending: String,
    pub in_flight: String,
    pub done: String,
    pub records: String,
}

impl Default for QueueNames {
    fn default() -> Self {
        Self {
            pending: PENDING_QUEUE.to_string(),
            in_flight: IN_FLIGHT_QUEUE.to_string(),
            done: DONE_QUEUE.to_string(),
            records: RECORDS_KEY.to_string(),
        }
    }
}

/// Number of entries in each list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueueDepths {
    pub pending: usize,
    pub in_flight: usize,
    pub done: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivered_at_keeps_identity_fields() {
        let message = Message::new(
            "abc".to_string(),
            "a@b.com".to_string(),
            "S".to_string(),
            "hi".to_string(),
        );
        let now = Utc::now();
        let delivered = message.delivered_at(now);

        assert_eq!(delivered.id, message.id);
        assert_eq!(delivered.enqueued_at, message.enqueued_at);
        assert_eq!(delivered.done_at, Some(now));
        assert!(message.done_at.is_none());
        assert!(!delivered.processed);
    }

    #[test]
    fn test_done_at_omitted_until_delivered() {
        let message = Message::new(
            "abc".to_string(),
            "a@b.com".to_string(),
            "S".to_string(),
            "hi".to_string(),
        );

        let json = serde_json::to_string(&message).unwrap();
        assert!(!json.contains("done_at"));

        let json = serde_json::to_string(&message.delivered_at(Utc::now())).unwrap();
        assert!(json.contains("done_at"));
    }

    #[test]
    fn test_default_queue_names() {
        let names = QueueNames::default();
        assert_eq!(names.pending, "messages");
        assert_eq!(names.in_flight, "processing");
        assert_eq!(names.done, "processed");
    }
}
