//! HMAC Webhook Signing
//!
//! Every delivery carries two signatures over the exact transmitted bytes,
//! one HMAC-SHA1 and one HMAC-SHA256, both keyed with the app secret.

use hmac::digest::KeyInit;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::Sha256;

use super::types::DeliveryError;

type HmacSha1 = Hmac<Sha1>;
type HmacSha256 = Hmac<Sha256>;

/// Header carrying the `sha1=` signature.
pub const SHA1_HEADER: &str = "x-hub-signature";

/// Header carrying the `sha256=` signature.
pub const SHA256_HEADER: &str = "x-hub-signature-256";

/// Header values for one payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureSet {
    /// `sha1=<40 hex chars>`
    pub sha1: String,
    /// `sha256=<64 hex chars>`
    pub sha256: String,
}

impl SignatureSet {
    /// `(header name, header value)` pairs in a fixed order.
    pub fn headers(&self) -> [(&'static str, &str); 2] {
        [
            (SHA1_HEADER, self.sha1.as_str()),
            (SHA256_HEADER, self.sha256.as_str()),
        ]
    }
}

fn hex_mac<M: Mac + KeyInit>(secret: &str, payload: &[u8]) -> Result<String, DeliveryError> {
    let mut mac = <M as KeyInit>::new_from_slice(secret.as_bytes())
        .map_err(|e| DeliveryError::SignatureInput(e.to_string()))?;
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Sign `payload` with `secret`.
///
/// HMAC takes keys of any length, including an empty one.
pub fn sign(payload: &[u8], secret: &str) -> Result<SignatureSet, DeliveryError> {
    Ok(SignatureSet {
        sha1: format!("sha1={}", hex_mac::<HmacSha1>(secret, payload)?),
        sha256: format!("sha256={}", hex_mac::<HmacSha256>(secret, payload)?),
    })
}

/// Verify an `x-hub-signature-256` header value against a payload.
///
/// This is what a receiving endpoint does; it is used by the local webhook
/// receivers in the test suite.
pub fn verify_sha256(payload: &[u8], secret: &str, header_value: &str) -> bool {
    let Ok(expected) = sign(payload, secret) else {
        return false;
    };
    // Constant-time comparison
    expected.sha256.len() == header_value.len()
        && expected
            .sha256
            .as_bytes()
            .iter()
            .zip(header_value.as_bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}
