//! MailRelay - queue-driven outbound email delivery.
//!
//! This library provides shared modules for the three MailRelay binaries:
//! - `mailrelay-web`: Intake server accepting submissions
//! - `mailrelay-sender`: Worker sending pending messages through the mail API
//! - `mailrelay-finalizer`: Worker marking delivered messages processed
//!
//! ## Architecture
//!
//! ```text
//! POST /send → record store + pending → Sender → in_flight → done → Finalizer → processed
//! ```

pub mod config;
pub mod error;
pub mod mail;
pub mod queue;
pub mod store;
pub mod util;
pub mod web;
pub mod worker;

// Re-export commonly used types
pub use config::Config;
pub use error::{
    BackendError, DecodeError, QueueError, RelayError, StoreError, TransportError, ValidationError,
};
pub use mail::{MailApiSender, MailSender, TransportPayload};
pub use queue::{Message, Pipeline, QueueNames, QueueStore, RedisQueueStore};
pub use store::{RecordStore, SqliteRecordStore};
pub use web::AppState;
pub use worker::{DeliveryWorker, Finalizer, Intervals, PollLoop};
