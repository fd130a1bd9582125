//! Database layer for coop-cms
//!
//! This module defines the database trait and SQLite implementation.

pub mod migrations;
pub mod sqlite;

pub use sqlite::SqliteDatabase;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::DbError;
use crate::models::{Account, NewAccount};

/// Database trait for operator account persistence
///
/// Login-state writes are plain read-modify-write updates against the
/// account row; concurrent writers follow last-writer-wins.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Database: Send + Sync {
    /// Insert a new account
    ///
    /// Returns the ID of the inserted account
    async fn create_account(&self, account: &NewAccount) -> Result<i64, DbError>;

    /// Get an account by its ID
    async fn get_account(&self, id: i64) -> Result<Option<Account>, DbError>;

    /// Get an account by its username
    async fn get_account_by_username(&self, username: &str) -> Result<Option<Account>, DbError>;

    /// List all accounts ordered by username
    async fn list_accounts(&self) -> Result<Vec<Account>, DbError>;

    /// Count all accounts
    async fn count_accounts(&self) -> Result<u64, DbError>;

    /// Persist the failure counter and lockout deadline
    async fn update_failed_logins(
        &self,
        id: i64,
        failed_login_attempts: u32,
        locked_until: Option<DateTime<Utc>>,
    ) -> Result<(), DbError>;

    /// Record a successful login
    ///
    /// Clears the failure counter and lockout, stores the session token,
    /// sets the last-login time and increments the login count.
    async fn record_successful_login(
        &self,
        id: i64,
        session_token: &str,
        at: DateTime<Utc>,
    ) -> Result<(), DbError>;

    /// Replace the stored session token (None clears it)
    async fn set_session_token(&self, id: i64, session_token: Option<String>)
        -> Result<(), DbError>;

    /// Replace the password hash and must-change-password flag
    async fn update_password(
        &self,
        id: i64,
        password_hash: &str,
        must_change_password: bool,
    ) -> Result<(), DbError>;
}
