//! Password hashing and comparison (bcrypt).
//!
//! bcrypt is CPU bound, so async callers go through `compare_blocking` and
//! `hash_blocking`, which run on tokio's blocking pool.

use bcrypt::{hash, verify, BcryptError};
use std::sync::Arc;
use tracing::{error, warn};

pub use bcrypt::DEFAULT_COST;

/// Cheapest cost bcrypt accepts. Tests and throwaway tooling only.
pub const MIN_COST: u32 = 4;

/// Compares a stored hash against a supplied secret.
pub trait PasswordVerifier: Send + Sync {
    fn compare(&self, stored_hash: &str, supplied: &str) -> bool;
}

/// bcrypt comparator
#[derive(Debug, Clone, Copy, Default)]
pub struct BcryptVerifier;

impl PasswordVerifier for BcryptVerifier {
    fn compare(&self, stored_hash: &str, supplied: &str) -> bool {
        match verify(supplied, stored_hash) {
            Ok(valid) => valid,
            Err(e) => {
                // A corrupt stored hash is an operator problem, not a login.
                warn!(error = %e, "Stored password hash could not be checked");
                false
            }
        }
    }
}

/// Hash a new password at the given bcrypt cost
pub fn hash_password(password: &str, cost: u32) -> Result<String, BcryptError> {
    hash(password, cost)
}

/// `compare` on the blocking pool. A panicking verifier counts as a mismatch.
pub async fn compare_blocking(
    verifier: Arc<dyn PasswordVerifier>,
    stored_hash: String,
    supplied: String,
) -> bool {
    match tokio::task::spawn_blocking(move || verifier.compare(&stored_hash, &supplied)).await {
        Ok(matched) => matched,
        Err(e) => {
            error!(error = %e, "Password comparison task failed");
            false
        }
    }
}

/// `hash_password` on the blocking pool
pub async fn hash_blocking(password: String, cost: u32) -> Result<String, String> {
    tokio::task::spawn_blocking(move || hash_password(&password, cost))
        .await
        .map_err(|e| e.to_string())?
        .map_err(|e| e.to_string())
}
