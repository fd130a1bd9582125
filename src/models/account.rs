//! Operator account domain models
//!
//! This module defines the CMS operator account, its role, and the typed
//! identity carried inside session tokens.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Operator role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Full access, including operator administration
    Admin,
    /// Can edit content
    Editor,
    /// Read-only access to the back office
    Viewer,
}

impl Role {
    /// Whether this role may administer other operator accounts
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::Editor => write!(f, "editor"),
            Role::Viewer => write!(f, "viewer"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "editor" => Ok(Role::Editor),
            "viewer" => Ok(Role::Viewer),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

/// CMS operator account stored in the database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    /// Account ID
    pub id: i64,

    /// Unique login name
    pub username: String,

    /// bcrypt hash of the password
    pub password_hash: String,

    /// Name shown in the back office
    pub display_name: String,

    /// Operator role
    pub role: Role,

    /// Avatar image path
    pub avatar: Option<String>,

    /// Inactive accounts cannot log in
    pub is_active: bool,

    /// Consecutive failed login attempts
    pub failed_login_attempts: u32,

    /// Logins are refused until this instant
    pub locked_until: Option<DateTime<Utc>>,

    /// Last successful login
    pub last_login_at: Option<DateTime<Utc>>,

    /// Number of successful logins
    pub login_count: u64,

    /// Latest issued session token
    pub session_token: Option<String>,

    /// Operator must pick a new password before continuing
    pub must_change_password: bool,

    /// When the account was created
    pub created_at: DateTime<Utc>,

    /// When the account was last modified
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Create a new, active account with a clean login state
    pub fn new(
        id: i64,
        username: impl Into<String>,
        password_hash: impl Into<String>,
        role: Role,
    ) -> Self {
        let username = username.into();
        let now = Utc::now();
        Self {
            id,
            display_name: username.clone(),
            username,
            password_hash: password_hash.into(),
            role,
            avatar: None,
            is_active: true,
            failed_login_attempts: 0,
            locked_until: None,
            last_login_at: None,
            login_count: 0,
            session_token: None,
            must_change_password: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the display name
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    /// Typed identity for this account
    pub fn identity(&self) -> Identity {
        Identity {
            account_id: self.id,
            username: self.username.clone(),
            role: self.role,
            display_name: self.display_name.clone(),
        }
    }
}

/// Account data for provisioning a new operator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    pub username: String,
    pub password_hash: String,
    pub display_name: String,
    pub role: Role,
    pub must_change_password: bool,
}

/// Account fields returned to the operator UI (never includes the hash)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSummary {
    pub id: i64,
    pub username: String,
    pub display_name: String,
    pub role: Role,
    pub avatar: Option<String>,
    pub must_change_password: bool,
}

impl From<&Account> for AccountSummary {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            username: account.username.clone(),
            display_name: account.display_name.clone(),
            role: account.role,
            avatar: account.avatar.clone(),
            must_change_password: account.must_change_password,
        }
    }
}

/// Verified operator identity carried by a session token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub account_id: i64,
    pub username: String,
    pub role: Role,
    pub display_name: String,
}
