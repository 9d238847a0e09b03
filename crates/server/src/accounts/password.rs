//! Argon2id password hashes.
//!
//! Hashing is CPU bound, so the async entry points run it on the blocking pool.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use once_cell::sync::Lazy;

use crate::error::StorageError;

// Checked against when no hash is stored so every login attempt costs one argon2 run.
static DUMMY_HASH: Lazy<Option<String>> =
    Lazy::new(|| hash_password("dummy password for unknown users").ok());

/// PHC string for `password` with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, StorageError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| StorageError::Hashing(e.to_string()))
}

/// Malformed hashes never match.
pub fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
}

/// [`hash_password`] on the blocking pool.
pub async fn hash_blocking(password: String) -> Result<String, StorageError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| StorageError::Hashing(e.to_string()))?
}

/// Check `password` against `stored` on the blocking pool.
///
/// With no stored hash the password is checked against a dummy hash and the
/// result is always `false`, so a missing account takes as long as a wrong password.
pub async fn verify_blocking(password: String, stored: Option<String>) -> Result<bool, StorageError> {
    tokio::task::spawn_blocking(move || match stored {
        Some(hash) => verify_password(&password, &hash),
        None => {
            if let Some(dummy) = DUMMY_HASH.as_deref() {
                verify_password(&password, dummy);
            }
            false
        }
    })
    .await
    .map_err(|e| StorageError::Hashing(e.to_string()))
}
