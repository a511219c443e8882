//! Recipient address canonicalization.

/// Canonicalize a raw phone number into a transport address.
///
/// Non-digit characters are stripped, a local-format leading `0` is
/// rewritten to the `62` country prefix, and the user-host suffix is
/// appended. Numbers already carrying a country prefix pass through.
pub fn canonical_address(recipient: &str) -> String {
    let digits: String = recipient.chars().filter(|c| c.is_ascii_digit()).collect();

    let number = if let Some(rest) = digits.strip_prefix('0') {
        format!("62{}", rest)
    } else {
        digits
    };

    format!("{}@s.whatsapp.net", number)
}
