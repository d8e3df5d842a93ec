//! Opaque identifier generation for access links, broadcast codes and OTPs.
//!
//! All generators draw from `rand::thread_rng()` (a CSPRNG). Uniqueness is
//! only probabilistic here; the UNIQUE column constraints in storage are the
//! authoritative collision guard.

use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::core::config;

const UPPER_DIGITS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Generate a 32-character alphanumeric access-link token.
///
/// 62 symbols over 32 positions gives ~190 bits of entropy, so collisions
/// are negligible and no pre-insert uniqueness check is performed.
pub fn generate_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(config::access::TOKEN_LEN)
        .map(char::from)
        .collect()
}

/// Generate a 12-character broadcast code (uppercase + digits).
pub fn generate_broadcast_code() -> String {
    sample_upper_digits(12)
}

/// Generate a 16-character inbox message id (uppercase + digits).
pub fn generate_message_id() -> String {
    sample_upper_digits(16)
}

/// Generate a 7-character short-link code.
pub fn generate_short_code() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(7)
        .map(char::from)
        .collect()
}

/// Generate a 6-digit one-time password.
pub fn generate_otp() -> String {
    rand::thread_rng().gen_range(100_000..=999_999).to_string()
}

fn sample_upper_digits(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| UPPER_DIGITS[rng.gen_range(0..UPPER_DIGITS.len())] as char)
        .collect()
}
