//! SQLite implementation of the Database trait
//!
//! This module provides a SQLite-based implementation of the Database trait
//! using rusqlite and tokio-rusqlite for async operations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{ErrorCode, OptionalExtension, Row};
use tokio_rusqlite::Connection;

use super::migrations::CREATE_SCHEMA;
use super::Database;
use crate::error::DbError;
use crate::models::{Account, NewAccount, Role};

const ACCOUNT_COLUMNS: &str = r#"
    id, username, password_hash, display_name, role, avatar, is_active,
    failed_login_attempts, locked_until, last_login_at, login_count,
    session_token, must_change_password, created_at, updated_at
"#;

/// SQLite database implementation
pub struct SqliteDatabase {
    conn: Connection,
}

impl SqliteDatabase {
    /// Create a new SQLite database connection
    ///
    /// Use `:memory:` for in-memory database or a file path for persistent storage.
    pub async fn new(path: &str) -> Result<Self, DbError> {
        let conn = Connection::open(path).await?;

        // Run migrations
        conn.call(|conn| {
            conn.execute_batch(CREATE_SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    /// Create a new in-memory database (useful for testing)
    pub async fn in_memory() -> Result<Self, DbError> {
        Self::new(":memory:").await
    }
}

#[async_trait]
impl Database for SqliteDatabase {
    async fn create_account(&self, account: &NewAccount) -> Result<i64, DbError> {
        let username = account.username.clone();
        let password_hash = account.password_hash.clone();
        let display_name = account.display_name.clone();
        let role = account.role.to_string();
        let must_change_password = account.must_change_password;
        let now = Utc::now().to_rfc3339();

        let result = self
            .conn
            .call(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO accounts
                    (username, password_hash, display_name, role, must_change_password, created_at, updated_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
                    "#,
                    rusqlite::params![
                        username,
                        password_hash,
                        display_name,
                        role,
                        must_change_password,
                        now
                    ],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await;

        match result {
            Ok(id) => Ok(id),
            Err(tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(e, msg)))
                if e.code == ErrorCode::ConstraintViolation =>
            {
                Err(DbError::ConstraintViolation(
                    msg.unwrap_or_else(|| "duplicate username".to_string()),
                ))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get_account(&self, id: i64) -> Result<Option<Account>, DbError> {
        self.conn
            .call(move |conn| {
                let sql = format!("SELECT {} FROM accounts WHERE id = ?1", ACCOUNT_COLUMNS);
                let account = conn
                    .query_row(&sql, [id], row_to_account)
                    .optional()?;
                Ok(account)
            })
            .await
            .map_err(Into::into)
    }

    async fn get_account_by_username(&self, username: &str) -> Result<Option<Account>, DbError> {
        let username = username.to_string();

        self.conn
            .call(move |conn| {
                let sql = format!(
                    "SELECT {} FROM accounts WHERE username = ?1",
                    ACCOUNT_COLUMNS
                );
                let account = conn
                    .query_row(&sql, [&username], row_to_account)
                    .optional()?;
                Ok(account)
            })
            .await
            .map_err(Into::into)
    }

    async fn list_accounts(&self) -> Result<Vec<Account>, DbError> {
        self.conn
            .call(|conn| {
                let sql = format!("SELECT {} FROM accounts ORDER BY username", ACCOUNT_COLUMNS);
                let mut stmt = conn.prepare(&sql)?;
                let accounts = stmt
                    .query_map([], row_to_account)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(accounts)
            })
            .await
            .map_err(Into::into)
    }

    async fn count_accounts(&self) -> Result<u64, DbError> {
        self.conn
            .call(|conn| {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM accounts", [], |row| row.get(0))?;
                Ok(count.max(0) as u64)
            })
            .await
            .map_err(Into::into)
    }

    async fn update_failed_logins(
        &self,
        id: i64,
        failed_login_attempts: u32,
        locked_until: Option<DateTime<Utc>>,
    ) -> Result<(), DbError> {
        let locked_until = locked_until.map(|t| t.to_rfc3339());
        let now = Utc::now().to_rfc3339();

        let changed = self
            .conn
            .call(move |conn| {
                let changed = conn.execute(
                    r#"
                    UPDATE accounts
                    SET failed_login_attempts = ?1, locked_until = ?2, updated_at = ?3
                    WHERE id = ?4
                    "#,
                    rusqlite::params![failed_login_attempts, locked_until, now, id],
                )?;
                Ok(changed)
            })
            .await?;

        ensure_updated(changed)
    }

    async fn record_successful_login(
        &self,
        id: i64,
        session_token: &str,
        at: DateTime<Utc>,
    ) -> Result<(), DbError> {
        let session_token = session_token.to_string();
        let at = at.to_rfc3339();

        let changed = self
            .conn
            .call(move |conn| {
                let changed = conn.execute(
                    r#"
                    UPDATE accounts
                    SET failed_login_attempts = 0,
                        locked_until = NULL,
                        session_token = ?1,
                        last_login_at = ?2,
                        login_count = login_count + 1,
                        updated_at = ?2
                    WHERE id = ?3
                    "#,
                    rusqlite::params![session_token, at, id],
                )?;
                Ok(changed)
            })
            .await?;

        ensure_updated(changed)
    }

    async fn set_session_token(
        &self,
        id: i64,
        session_token: Option<String>,
    ) -> Result<(), DbError> {
        let now = Utc::now().to_rfc3339();

        let changed = self
            .conn
            .call(move |conn| {
                let changed = conn.execute(
                    "UPDATE accounts SET session_token = ?1, updated_at = ?2 WHERE id = ?3",
                    rusqlite::params![session_token, now, id],
                )?;
                Ok(changed)
            })
            .await?;

        ensure_updated(changed)
    }

    async fn update_password(
        &self,
        id: i64,
        password_hash: &str,
        must_change_password: bool,
    ) -> Result<(), DbError> {
        let password_hash = password_hash.to_string();
        let now = Utc::now().to_rfc3339();

        let changed = self
            .conn
            .call(move |conn| {
                let changed = conn.execute(
                    r#"
                    UPDATE accounts
                    SET password_hash = ?1, must_change_password = ?2, updated_at = ?3
                    WHERE id = ?4
                    "#,
                    rusqlite::params![password_hash, must_change_password, now, id],
                )?;
                Ok(changed)
            })
            .await?;

        ensure_updated(changed)
    }
}

/// Updates addressed by id must touch exactly one row
fn ensure_updated(changed: usize) -> Result<(), DbError> {
    if changed == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// Map an `accounts` row selected with `ACCOUNT_COLUMNS`
fn row_to_account(row: &Row<'_>) -> rusqlite::Result<Account> {
    let role: String = row.get(4)?;
    let role = role
        .parse::<Role>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, e.into()))?;
    let failed: i64 = row.get(7)?;
    let login_count: i64 = row.get(10)?;

    Ok(Account {
        id: row.get(0)?,
        username: row.get(1)?,
        password_hash: row.get(2)?,
        display_name: row.get(3)?,
        role,
        avatar: row.get(5)?,
        is_active: row.get(6)?,
        failed_login_attempts: failed.max(0) as u32,
        locked_until: parse_datetime(row.get(8)?),
        last_login_at: parse_datetime(row.get(9)?),
        login_count: login_count.max(0) as u64,
        session_token: row.get(11)?,
        must_change_password: row.get(12)?,
        created_at: parse_datetime(row.get(13)?).unwrap_or_else(Utc::now),
        updated_at: parse_datetime(row.get(14)?).unwrap_or_else(Utc::now),
    })
}

/// Parse datetime string from SQLite
fn parse_datetime(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
            .or_else(|| {
                // Try parsing SQLite's datetime format
                chrono::NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S")
                    .ok()
                    .map(|dt| dt.and_utc())
            })
    })
}
