//! Password hashing and validation
//!
//! bcrypt with a configurable work factor. These functions are CPU-bound;
//! async callers run them on tokio's blocking pool.

use crate::error::AuthError;

/// Default bcrypt cost factor
pub const BCRYPT_COST: u32 = 12;

/// Minimum password length in bytes
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum password length in bytes (bcrypt input limit)
pub const MAX_PASSWORD_LENGTH: usize = 72;

/// Hash a password with bcrypt
///
/// Fails only when `cost` is outside bcrypt's accepted range.
pub fn hash_password(password: &str, cost: u32) -> Result<String, AuthError> {
    bcrypt::hash(password, cost).map_err(|e| AuthError::Internal(format!("hashing failed: {}", e)))
}

/// Verify a password against a stored bcrypt hash
///
/// A malformed hash never matches.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match bcrypt::verify(password, hash) {
        Ok(matches) => matches,
        Err(e) => {
            tracing::debug!(error = %e, "Stored password hash could not be parsed");
            false
        }
    }
}

/// Check a new password against the length policy
pub fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }

    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "Password must be at most {} bytes",
            MAX_PASSWORD_LENGTH
        )));
    }

    Ok(())
}
