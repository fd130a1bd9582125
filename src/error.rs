//! Application error types for coop-cms
//!
//! This module defines common error types used throughout the application.
//! All error types use `thiserror` for ergonomic error handling.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::config::ConfigError;

/// Authentication-related errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AuthError {
    /// Username or password missing from the login request
    #[error("Username and password are required")]
    MissingCredentials,

    /// Unknown account, inactive account or wrong password
    #[error("Invalid username or password")]
    InvalidCredentials,

    /// Account temporarily locked after repeated failures
    #[error("Account temporarily locked until {0}")]
    AccountLocked(DateTime<Utc>),

    /// Invalid, tampered or expired session token
    #[error("Invalid token")]
    InvalidToken,

    /// No usable credential on the request
    #[error("Unauthorized")]
    Unauthorized,

    /// Authenticated, but the role does not allow the action
    #[error("Forbidden")]
    Forbidden,

    /// New password rejected by the password policy
    #[error("Weak password: {0}")]
    WeakPassword(String),

    /// Account referenced by id does not exist
    #[error("Account not found")]
    AccountNotFound,

    /// Hashing, signing or storage failure
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DbError {
    /// SQLite error
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Background connection error
    #[error("Database connection error: {0}")]
    Connection(#[from] tokio_rusqlite::Error),

    /// Record not found
    #[error("Record not found")]
    NotFound,

    /// Constraint violation
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),
}

impl From<DbError> for AuthError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound => AuthError::AccountNotFound,
            other => AuthError::Internal(other.to_string()),
        }
    }
}

/// Application-level error type
///
/// Aggregates the domain errors for the binary entry point.
#[derive(Debug, Error)]
pub enum AppError {
    /// Authentication error
    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}
