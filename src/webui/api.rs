//! Operator UI API types
//!
//! Request and response bodies shared by the auth endpoints and the operator
//! administration endpoints.
//!
//! # Security Notes
//!
//! - Password hashes never appear in any response type
//! - Session tokens travel only in the `Set-Cookie` header

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Account, AccountSummary, Identity};

/// Path of the operator login page
pub const LOGIN_PAGE_PATH: &str = "/admin/login";

/// Login request body
///
/// Missing fields deserialize as empty strings and are rejected as blank.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Successful login response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoginResponse {
    pub user: AccountSummary,
    pub expires_at: DateTime<Utc>,
}

/// Current operator response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionResponse {
    pub user: Identity,
}

/// Password change request body
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub current_password: String,
    #[serde(default)]
    pub new_password: String,
}

/// Account row in the operator administration list
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccountView {
    #[serde(flatten)]
    pub summary: AccountSummary,
    pub is_active: bool,
    pub failed_login_attempts: u32,
    pub locked_until: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub login_count: u64,
}

impl From<&Account> for AccountView {
    fn from(account: &Account) -> Self {
        Self {
            summary: AccountSummary::from(account),
            is_active: account.is_active,
            failed_login_attempts: account.failed_login_attempts,
            locked_until: account.locked_until,
            last_login_at: account.last_login_at,
            login_count: account.login_count,
        }
    }
}

/// Account list response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccountListResponse {
    pub accounts: Vec<AccountView>,
}

/// Plain message response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl HealthResponse {
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Login page URL that returns the operator to `path` afterwards
///
/// Only paths inside the operator UI are kept as the return target.
pub fn login_redirect_location(path: &str) -> String {
    let next = if path.starts_with("/admin") && !path.starts_with(LOGIN_PAGE_PATH) {
        path
    } else {
        "/admin"
    };
    format!("{}?next={}", LOGIN_PAGE_PATH, encode_query_value(next))
}

/// Percent-encode everything outside the unreserved set and `/`
fn encode_query_value(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/' => {
                encoded.push(byte as char)
            }
            _ => encoded.push_str(&format!("%{:02X}", byte)),
        }
    }
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    #[test]
    fn test_login_request_missing_fields_are_blank() {
        let request: LoginRequest = serde_json::from_str(r#"{"password":"x"}"#).unwrap();
        assert_eq!(request.username, "");
        assert_eq!(request.password, "x");

        let request: LoginRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(request, LoginRequest::default());
    }

    #[test]
    fn test_account_view_flattens_summary() {
        let account = Account::new(5, "editor", "$2b$secret", Role::Editor);
        let json = serde_json::to_value(AccountView::from(&account)).unwrap();

        assert_eq!(json["id"], 5);
        assert_eq!(json["username"], "editor");
        assert_eq!(json["role"], "editor");
        assert_eq!(json["failed_login_attempts"], 0);
        assert!(json.get("password_hash").is_none());
        assert!(!json.to_string().contains("$2b$secret"));
    }

    #[test]
    fn test_health_response() {
        let health = HealthResponse::healthy();
        assert_eq!(health.status, "healthy");
        assert!(!health.version.is_empty());
    }

    #[test]
    fn test_login_redirect_location() {
        assert_eq!(
            login_redirect_location("/admin/pages"),
            "/admin/login?next=/admin/pages"
        );
        assert_eq!(login_redirect_location("/admin"), "/admin/login?next=/admin");
        assert_eq!(
            login_redirect_location("/admin/pages/a b"),
            "/admin/login?next=/admin/pages/a%20b"
        );
    }

    #[test]
    fn test_login_redirect_rejects_foreign_targets() {
        assert_eq!(
            login_redirect_location("//evil.example"),
            "/admin/login?next=/admin"
        );
        assert_eq!(
            login_redirect_location("/admin/login"),
            "/admin/login?next=/admin"
        );
    }
}
