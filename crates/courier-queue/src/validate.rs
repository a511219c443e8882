//! Enqueue input validation.

use crate::{QueueError, QueueResult};

/// Maximum message body length in characters.
pub const MAX_BODY_LEN: usize = 2_000;

const MIN_RECIPIENT_LEN: usize = 10;
const MAX_RECIPIENT_LEN: usize = 15;

/// Validate a recipient phone number in local format.
///
/// Accepts only digit strings of 10 to 15 characters starting with `08`.
/// Country-prefix rewriting happens later, at the transport boundary.
pub fn validate_recipient(recipient: &str) -> QueueResult<()> {
    if recipient.len() < MIN_RECIPIENT_LEN || recipient.len() > MAX_RECIPIENT_LEN {
        return Err(QueueError::Validation(format!(
            "Recipient must be {} to {} digits",
            MIN_RECIPIENT_LEN, MAX_RECIPIENT_LEN
        )));
    }

    if !recipient.starts_with("08") {
        return Err(QueueError::Validation(
            "Recipient must start with 08".to_string(),
        ));
    }

    if !recipient.chars().all(|c| c.is_ascii_digit()) {
        return Err(QueueError::Validation(
            "Recipient must contain only digits".to_string(),
        ));
    }

    Ok(())
}

/// Validate a message body: non-empty, at most [`MAX_BODY_LEN`] characters.
pub fn validate_body(body: &str) -> QueueResult<()> {
    if body.is_empty() {
        return Err(QueueError::Validation(
            "Message body must not be empty".to_string(),
        ));
    }

    if body.chars().count() > MAX_BODY_LEN {
        return Err(QueueError::Validation(format!(
            "Message body must be at most {} characters",
            MAX_BODY_LEN
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_recipients() {
        assert!(validate_recipient("0812345678").is_ok());
        assert!(validate_recipient("081234567890123").is_ok());
    }

    #[test]
    fn rejects_bad_lengths() {
        assert!(validate_recipient("081234567").is_err());
        assert!(validate_recipient("0812345678901234").is_err());
        assert!(validate_recipient("").is_err());
    }

    #[test]
    fn rejects_wrong_prefix() {
        assert!(validate_recipient("6281234567890").is_err());
        assert!(validate_recipient("1812345678").is_err());
    }

    #[test]
    fn rejects_non_digit_characters() {
        assert!(validate_recipient("08123x567890").is_err());
        assert!(validate_recipient("08 12345678").is_err());
        assert!(validate_recipient("08-12345678").is_err());
    }

    #[test]
    fn accepts_valid_bodies() {
        assert!(validate_body("hi").is_ok());
        assert!(validate_body(&"x".repeat(MAX_BODY_LEN)).is_ok());
    }

    #[test]
    fn rejects_empty_and_oversized_bodies() {
        assert!(validate_body("").is_err());
        assert!(validate_body(&"x".repeat(MAX_BODY_LEN + 1)).is_err());
    }

    #[test]
    fn body_limit_counts_characters_not_bytes() {
        // Multi-byte characters within the limit
        assert!(validate_body(&"é".repeat(MAX_BODY_LEN)).is_ok());
        assert!(validate_body(&"é".repeat(MAX_BODY_LEN + 1)).is_err());
    }
}
