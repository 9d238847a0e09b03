//! Random identifiers and comparison helpers.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use std::fmt::Write;

/// Random bytes from the operating system RNG.
fn random_bytes<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    getrandom::fill(&mut bytes).expect("operating system RNG unavailable");
    bytes
}

/// 20 random bytes rendered as 40 lowercase hex characters.
///
/// Used for user ids and OAuth2 client id/secret pairs.
pub fn generate_id() -> String {
    random_bytes::<20>()
        .iter()
        .fold(String::with_capacity(40), |mut out, b| {
            let _ = write!(out, "{b:02x}");
            out
        })
}

/// 32 random bytes, URL-safe base64 without padding.
///
/// Used for session cookies and OAuth2 access/refresh tokens.
pub fn generate_token() -> String {
    URL_SAFE_NO_PAD.encode(random_bytes::<32>())
}

/// Compare two byte strings without short-circuiting on the first mismatch.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
