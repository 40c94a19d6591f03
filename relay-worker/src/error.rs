//! Error types for the mail relay.
//!
//! The taxonomy follows how each failure is handled:
//! - [`ValidationError`]: bad input, rejected before queuing, never retried
//! - [`DecodeError`]: corrupt queue entry, dropped as a poison message
//! - [`TransportError`]: the mail API call failed, the message is abandoned
//! - [`BackendError`]: the queue backend is unreachable, the cycle aborts

use thiserror::Error;

/// Submission or payload validation failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field is absent or empty
    #[error("field `{0}` is missing or empty")]
    Missing(&'static str),

    /// A field exceeds the configured maximum length
    #[error("field `{field}` exceeds {max} characters")]
    TooLong { field: &'static str, max: usize },

    /// The recipient is not a syntactically valid address
    #[error("`{0}` is not a valid email address")]
    InvalidAddress(String),

    /// A header field carries a line break
    #[error("field `{0}` must not contain line breaks")]
    LineBreak(&'static str),
}

/// A queue entry whose record cannot be turned back into a message.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// The entry id has no stored record
    #[error("no record stored for entry `{0}`")]
    MissingRecord(String),

    /// The stored record is not a valid message
    #[error("malformed record: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Mail API delivery failure.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The HTTP request could not be completed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The mail API answered with a non-success status
    #[error("mail API returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The send did not complete in time
    #[error("send timed out after {0} ms")]
    Timeout(u64),

    /// The mail API base URL does not parse
    #[error("invalid mail API URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// No credentials were configured for the mail API
    #[error("mail API credentials are not configured")]
    NotConfigured,
}

/// Queue backend failure.
#[derive(Error, Debug)]
pub enum BackendError {
    /// Redis connection or command error
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// The backend refused the operation
    #[error("queue backend unavailable: {0}")]
    Unavailable(String),
}

/// Durable record store failure.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// No record exists for the id
    #[error("record `{0}` not found")]
    NotFound(String),

    /// A stored value could not be interpreted
    #[error("corrupt record `{id}`: {reason}")]
    Corrupt { id: String, reason: String },

    /// The store refused the operation
    #[error("record store unavailable: {0}")]
    Unavailable(String),
}

/// Pipeline operation failure.
#[derive(Error, Debug)]
pub enum QueueError {
    #[error("invalid message: {0}")]
    Validation(#[from] ValidationError),

    /// The claimed entry was a poison message; it has already been dropped
    #[error("poison entry `{entry}` dropped from `{list}`: {source}")]
    Poison {
        entry: String,
        list: String,
        #[source]
        source: DecodeError,
    },

    #[error("failed to encode message: {0}")]
    Encode(serde_json::Error),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Failure of one worker cycle.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error("transport payload rejected: {0}")]
    Payload(#[from] ValidationError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// The cycle panicked; the loop recovered
    #[error("cycle panicked: {0}")]
    Panicked(String),
}

/// Result type for pipeline operations.
pub type QueueResult<T> = Result<T, QueueError>;
