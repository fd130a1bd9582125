//! Authentication system for coop-cms
//!
//! This module provides operator authentication:
//! - Password hashing (bcrypt)
//! - Session tokens (HS256 JWT)
//! - Failed-login lockout
//! - Request authentication from bearer header or cookie

pub mod bootstrap;
pub mod jwt;
pub mod lockout;
pub mod manager;
pub mod password;
pub mod request;

pub use bootstrap::ensure_bootstrap_admin;
pub use jwt::{IssuedToken, SessionClaims, TokenIssuer, TOKEN_ISSUER};
pub use lockout::{LockState, LockoutConfig, LockoutPolicy};
pub use manager::{AuthManager, LoginOutcome};
pub use password::{hash_password, validate_password, verify_password, BCRYPT_COST};
pub use request::{
    authenticate, clear_session_cookie, extract_token, session_cookie, CurrentOperator,
    SESSION_COOKIE_NAME,
};
