//! Shared utility functions

use base64::Engine;
use rand::Rng;

/// `len` random bytes.
pub fn random_bytes<R: Rng + ?Sized>(rng: &mut R, len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    rng.fill(bytes.as_mut_slice());
    bytes
}

/// Lowercase hex of `bytes` random bytes.
pub fn random_hex<R: Rng + ?Sized>(rng: &mut R, bytes: usize) -> String {
    hex::encode(random_bytes(rng, bytes))
}

/// Standard base64 of `bytes` random bytes.
pub fn random_base64<R: Rng + ?Sized>(rng: &mut R, bytes: usize) -> String {
    base64::engine::general_purpose::STANDARD.encode(random_bytes(rng, bytes))
}

/// A string of `len` random decimal digits.
///
/// # Examples
///
/// ```
/// use wadev_server::util::random_digits;
///
/// let digits = random_digits(&mut rand::thread_rng(), 8);
/// assert_eq!(digits.len(), 8);
/// assert!(digits.chars().all(|c| c.is_ascii_digit()));
/// ```
pub fn random_digits<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
    (0..len)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

/// Current unix time in seconds.
pub fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}
