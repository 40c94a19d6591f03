//! Worker roles and the poll loop that drives them.
//!
//! ## Roles
//!
//! ```text
//! sender:    pending → in_flight → MailSender::send() → done
//! finalizer: done → RecordStore::mark_processed() → retired
//! ```
//!
//! Each role runs in its own [`PollLoop`], one cycle at a time.

pub mod delivery;
pub mod finalizer;
pub mod scheduler;

pub use delivery::DeliveryWorker;
pub use finalizer::Finalizer;
pub use scheduler::{Cycle, CycleOutcome, Intervals, PollLoop};
