//! Queue module for the three-list message rotation.
//!
//! This module provides:
//! - Message types and list names
//! - The queue store capability with in-memory and Redis backends
//! - The pipeline protocol built on top of it
//!
//! ## Lifecycle
//!
//! ```text
//! enqueue → pending → claim_next → in_flight → forward → done → retire
//!                                      └──── abandon (terminal failure)
//! ```

pub mod pipeline;
pub mod redis_store;
pub mod store;
pub mod types;

pub use pipeline::Pipeline;
pub use redis_store::RedisQueueStore;
pub use store::{MemoryQueueStore, QueueStore};
pub use types::{
    Message, QueueDepths, QueueNames, DONE_QUEUE, IN_FLIGHT_QUEUE, PENDING_QUEUE, RECORDS_KEY,
};
