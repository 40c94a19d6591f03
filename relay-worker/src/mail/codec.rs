//! Message codec.
//!
//! Converts messages to and from the record format stored in the queue
//! backend, and builds the raw envelope the mail API expects.

use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine;

use crate::error::{DecodeError, ValidationError};
use crate::mail::validate::check_header_value;
use crate::queue::Message;

/// A built envelope ready for the mail API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportPayload {
    pub message_id: String,
    /// URL-safe base64 of the RFC 5322 message
    pub raw: String,
}

/// Serialize a message to its stored record form.
///
/// Output is deterministic: fields are written in declaration order.
pub fn encode(message: &Message) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(message)
}

/// Parse a stored record back into a message.
pub fn decode(bytes: &[u8]) -> Result<Message, DecodeError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Build the envelope for the mail API.
///
/// Fails when a required field is missing or a header value contains a
/// line break; callers treat that as terminal for the message.
pub fn build_transport_payload(message: &Message) -> Result<TransportPayload, ValidationError> {
    if message.to.is_empty() {
        return Err(ValidationError::Missing("to"));
    }
    if message.subject.is_empty() {
        return Err(ValidationError::Missing("subject"));
    }
    if message.body.is_empty() {
        return Err(ValidationError::Missing("body"));
    }
    check_header_value("to", &message.to)?;
    check_header_value("subject", &message.subject)?;

    let transfer_encoding = if message.body.is_ascii() { "7bit" } else { "8bit" };

    let envelope = [
        "Content-Type: text/plain; charset=\"UTF-8\"".to_string(),
        "MIME-Version: 1.0".to_string(),
        format!("Content-Transfer-Encoding: {}", transfer_encoding),
        format!("To: {}", message.to),
        format!("Subject: {}", encode_header_text(&message.subject)),
        String::new(),
        message.body.replace("\r\n", "\n").replace('\n', "\r\n"),
    ]
    .join("\r\n");

    Ok(TransportPayload {
        message_id: message.id.clone(),
        raw: URL_SAFE.encode(envelope.as_bytes()),
    })
}

/// Bytes of header text per encoded-word; keeps each word under 75 characters.
const ENCODED_WORD_CHUNK: usize = 39;

/// RFC 2047 encoded-words for non-ASCII header text, one per folded line.
fn encode_header_text(text: &str) -> String {
    if text.is_ascii() {
        return text.to_string();
    }

    let mut words = Vec::new();
    let mut chunk = String::new();
    for c in text.chars() {
        if chunk.len() + c.len_utf8() > ENCODED_WORD_CHUNK {
            words.push(encoded_word(&chunk));
            chunk.clear();
        }
        chunk.push(c);
    }
    if !chunk.is_empty() {
        words.push(encoded_word(&chunk));
    }
    words.join("\r\n ")
}

fn encoded_word(chunk: &str) -> String {
    format!("=?UTF-8?B?{}?=", STANDARD.encode(chunk.as_bytes()))
}
