//! Message validation.
//!
//! Two levels of checks:
//! - [`validate_submission`]: what the HTTP intake accepts from producers
//! - [`validate_structure`]: what the pipeline accepts onto a queue

use crate::error::ValidationError;
use crate::queue::Message;

/// Default maximum length for each submitted field.
pub const DEFAULT_MAX_FIELD_LENGTH: usize = 100;

/// Check a producer submission before anything is stored or queued.
///
/// All three fields must be non-empty and at most `max_len` characters, and
/// `to` must be a syntactically valid address.
pub fn validate_submission(
    to: &str,
    subject: &str,
    message: &str,
    max_len: usize,
) -> Result<(), ValidationError> {
    for (field, value) in [("to", to), ("subject", subject), ("message", message)] {
        if value.is_empty() {
            return Err(ValidationError::Missing(field));
        }
        if value.chars().count() > max_len {
            return Err(ValidationError::TooLong { field, max: max_len });
        }
    }

    check_header_value("to", to)?;
    check_header_value("subject", subject)?;

    if !is_valid_address(to) {
        return Err(ValidationError::InvalidAddress(to.to_string()));
    }

    Ok(())
}

/// Check that a message has everything needed to travel through the queues.
pub fn validate_structure(message: &Message) -> Result<(), ValidationError> {
    if message.id.trim().is_empty() {
        return Err(ValidationError::Missing("id"));
    }
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
    Ok(())
}

/// Reject values that would break out of a header line.
pub(crate) fn check_header_value(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.contains(['\r', '\n']) {
        return Err(ValidationError::LineBreak(field));
    }
    Ok(())
}

/// Syntactic address check for a single bare `local@domain` mailbox.
///
/// The value must parse as exactly one address with no display name, and the
/// domain must end in a top-level label that starts with a letter and has at
/// least two characters.
pub fn is_valid_address(address: &str) -> bool {
    let single = match mailparse::addrparse(address) {
        Ok(list) => list.extract_single_info(),
        Err(_) => None,
    };
    let Some(single) = single else {
        return false;
    };
    if single.display_name.is_some() || single.addr != address {
        return false;
    }

    let Some((local, domain)) = address.rsplit_once('@') else {
        return false;
    };
    is_valid_local_part(local) && is_valid_domain(domain)
}

fn is_valid_local_part(local: &str) -> bool {
    if local.is_empty() || local.len() > 64 {
        return false;
    }
    if local.starts_with('.') || local.ends_with('.') || local.contains("..") {
        return false;
    }
    local
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "!#$%&'*+/=?^_`{|}~.-".contains(c))
}

fn is_valid_domain(domain: &str) -> bool {
    if domain.len() > 255 {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    let Some((tld, _)) = labels.split_last() else {
        return false;
    };
    if labels.len() < 2 || !is_valid_tld(tld) {
        return false;
    }
    labels.iter().all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    })
}

/// Letter first, two or more characters, no doubled hyphens.
fn is_valid_tld(tld: &str) -> bool {
    tld.len() >= 2
        && tld.starts_with(|c: char| c.is_ascii_alphabetic())
        && !tld.contains("--")
}
