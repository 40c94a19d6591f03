//! Mail module: everything between a queued message and the mail API.
//!
//! This module provides:
//! - The codec for stored records and transport envelopes
//! - Submission and structural validation
//! - The mail API sender capability and its HTTP client
//!
//! ## Flow
//!
//! ```text
//! Message → build_transport_payload() → TransportPayload → MailSender::send()
//! ```

pub mod codec;
pub mod sender;
pub mod validate;

pub use codec::{build_transport_payload, decode, encode, TransportPayload};
pub use sender::{MailApiSender, MailSender};
pub use validate::{validate_structure, validate_submission, DEFAULT_MAX_FIELD_LENGTH};
