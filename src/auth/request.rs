//! Request-level authentication
//!
//! Resolves the session token presented on a request to an operator
//! identity. The token is read from `Authorization: Bearer <token>` first and
//! from the `token` cookie otherwise.

use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{
        header::{InvalidHeaderValue, AUTHORIZATION, COOKIE},
        request::Parts,
        HeaderMap, HeaderValue,
    },
};

use super::jwt::TokenIssuer;
use crate::error::AuthError;
use crate::models::Identity;
use crate::server::middleware::AuthResponse;

/// Name of the cookie holding the session token
pub const SESSION_COOKIE_NAME: &str = "token";

/// Extract the session token from the request headers
///
/// A bearer header takes precedence; a present but invalid bearer token does
/// not fall back to the cookie.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = extract_bearer_token(headers) {
        return Some(token);
    }
    extract_cookie_token(headers)
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

fn extract_cookie_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| {
            let (key, val) = pair.trim().split_once('=')?;
            (key.trim() == SESSION_COOKIE_NAME).then(|| val.trim().to_string())
        })
        .find(|token| !token.is_empty())
}

/// Resolve the request's session token to an identity
///
/// Returns `None` when no token is present or it does not verify.
pub fn authenticate(headers: &HeaderMap, issuer: &TokenIssuer) -> Option<Identity> {
    let token = extract_token(headers)?;
    issuer.verify(&token)
}

/// `Set-Cookie` value carrying a new session token
pub fn session_cookie(
    token: &str,
    max_age_secs: i64,
    secure: bool,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_secs}"
    );
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// `Set-Cookie` value deleting the session cookie
pub fn clear_session_cookie(secure: bool) -> HeaderValue {
    if secure {
        HeaderValue::from_static("token=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0; Secure")
    } else {
        HeaderValue::from_static("token=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
    }
}

/// Identity of the operator making the request
///
/// Inserted into request extensions by the gatekeepers. As an extractor it
/// reuses that value, or verifies the request's token itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CurrentOperator(pub Identity);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentOperator
where
    S: Send + Sync,
    Arc<TokenIssuer>: FromRef<S>,
{
    type Rejection = AuthResponse;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(operator) = parts.extensions.get::<CurrentOperator>() {
            return Ok(operator.clone());
        }

        let issuer = Arc::<TokenIssuer>::from_ref(state);
        authenticate(&parts.headers, &issuer)
            .map(CurrentOperator)
            .ok_or_else(|| AuthResponse::from_error(AuthError::Unauthorized))
    }
}
