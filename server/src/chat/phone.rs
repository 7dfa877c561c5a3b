//! Phone Numbers and Message Ids

use base64::Engine;
use rand::Rng;
use thiserror::Error;

/// Country code assumed for local numbers (leading `0`).
pub const DEFAULT_COUNTRY_CODE: &str = "31";

/// Shortest accepted input.
const MIN_INPUT_LEN: usize = 6;

/// Prefix bytes of every generated message id.
const WAMID_PREFIX: [u8; 4] = [0x1C, 0x18, 0x0B, 0x33];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PhoneError {
    #[error("phone number too short")]
    TooShort,
    #[error("local phone number not allowed")]
    LocalNotAllowed,
    #[error("phone number may only contain digits")]
    InvalidCharacter,
}

/// A phone number as given and in digits-only international form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPhoneNumber {
    pub original: String,
    /// Country code and subscriber number, digits only.
    pub parsed: String,
    /// Fresh message id for a message to or from this number.
    pub whatsapp_message_id: String,
}

/// Parse `input` into international digits-only form.
///
/// Spaces, dashes, dots and parentheses are ignored. A leading `0` marks a
/// local number; those are only accepted with `local_allowed` and get the
/// default country code.
pub fn parse(input: &str, local_allowed: bool) -> Result<ParsedPhoneNumber, PhoneError> {
    let original = input.trim();
    if original.len() < MIN_INPUT_LEN {
        return Err(PhoneError::TooShort);
    }

    let is_local = original.starts_with('0');
    if is_local && !local_allowed {
        return Err(PhoneError::LocalNotAllowed);
    }

    let mut digits = String::with_capacity(original.len());
    for c in original.strip_prefix('+').unwrap_or(original).chars() {
        match c {
            '0'..='9' => digits.push(c),
            ' ' | '-' | '.' | '(' | ')' => {}
            _ => return Err(PhoneError::InvalidCharacter),
        }
    }

    let parsed = if is_local {
        format!("{DEFAULT_COUNTRY_CODE}{}", digits.trim_start_matches('0'))
    } else {
        digits
    };
    if parsed.len() < MIN_INPUT_LEN {
        return Err(PhoneError::TooShort);
    }

    Ok(ParsedPhoneNumber {
        original: original.to_string(),
        whatsapp_message_id: whatsapp_id(&parsed),
        parsed,
    })
}

/// New `wamid.` message id for `phone_number`.
pub fn whatsapp_id(phone_number: &str) -> String {
    let mut random = [0u8; 24];
    rand::thread_rng().fill(&mut random);

    let mut id = Vec::with_capacity(WAMID_PREFIX.len() + phone_number.len() + random.len() + 1);
    id.extend_from_slice(&WAMID_PREFIX);
    id.extend_from_slice(phone_number.as_bytes());
    id.extend_from_slice(&random);
    id.push(0);

    format!(
        "wamid.{}",
        base64::engine::general_purpose::STANDARD.encode(id)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn international_numbers() {
        assert_eq!(parse("+31612345678", false).unwrap().parsed, "31612345678");
        assert_eq!(parse("31612345678", false).unwrap().parsed, "31612345678");
        assert_eq!(parse("+31 6-1234 5678", false).unwrap().parsed, "31612345678");
    }

    #[test]
    fn local_numbers() {
        assert_eq!(parse("0612345678", false), Err(PhoneError::LocalNotAllowed));
        let parsed = parse("0612345678", true).unwrap();
        assert_eq!(parsed.parsed, "31612345678");
        assert_eq!(parsed.original, "0612345678");
    }

    #[test]
    fn rejects_bad_input() {
        assert_eq!(parse("12345", true), Err(PhoneError::TooShort));
        assert_eq!(parse("+316abc45678", true), Err(PhoneError::InvalidCharacter));
        assert_eq!(parse("+ - ( ) .", true), Err(PhoneError::TooShort));
    }

    #[test]
    fn whatsapp_id_layout() {
        let id = whatsapp_id("31612345678");
        let encoded = id.strip_prefix("wamid.").unwrap();
        let raw = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .unwrap();

        assert_eq!(&raw[..4], &WAMID_PREFIX);
        assert_eq!(&raw[4..15], b"31612345678");
        assert_eq!(raw.len(), 4 + 11 + 24 + 1);
        assert_eq!(raw.last(), Some(&0));
        assert_ne!(id, whatsapp_id("31612345678"));
    }
}
