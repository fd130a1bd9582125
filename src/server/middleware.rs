//! HTTP middleware for coop-cms
//!
//! This module provides middleware layers for:
//! - Gatekeeping the operator UI and operator API trees
//! - Request/response logging
//! - OpenTelemetry tracing

use axum::{
    extract::{rejection::JsonRejection, Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use std::time::Instant;

use crate::auth::{clear_session_cookie, extract_token, CurrentOperator};
use crate::database::Database;
use crate::error::AuthError;
use crate::models::Identity;
use crate::webui::{login_redirect_location, LOGIN_PAGE_PATH};

use super::router::AppState;

/// Resolve a raw token to an identity, applying the single-session check
async fn resolve_identity<D: Database + 'static>(
    state: &AppState<D>,
    token: &str,
) -> Option<Identity> {
    let identity = state.issuer.verify(token)?;
    match state.auth_manager.check_session(&identity, token).await {
        Ok(()) => Some(identity),
        Err(AuthError::Internal(e)) => {
            tracing::error!(error = %e, "Session check failed");
            None
        }
        Err(_) => None,
    }
}

/// Gatekeeper for the operator UI tree (`/admin`, `/admin/*`)
///
/// Unauthenticated requests are redirected to the login page. When the
/// presented token is invalid the redirect also clears the session cookie.
pub async fn admin_ui_gatekeeper<D: Database + 'static>(
    State(state): State<AppState<D>>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    if path == LOGIN_PAGE_PATH {
        return next.run(request).await;
    }

    let Some(token) = extract_token(request.headers()) else {
        tracing::debug!(path = %path, "No session token, redirecting to login");
        state.record_rejection("ui");
        return Redirect::to(&login_redirect_location(&path)).into_response();
    };

    match resolve_identity(&state, &token).await {
        Some(identity) => {
            request.extensions_mut().insert(CurrentOperator(identity));
            next.run(request).await
        }
        None => {
            tracing::debug!(path = %path, "Invalid session token, redirecting to login");
            state.record_rejection("ui");
            let mut response = Redirect::to(&login_redirect_location(&path)).into_response();
            response.headers_mut().append(
                header::SET_COOKIE,
                clear_session_cookie(state.cookie_secure),
            );
            response
        }
    }
}

/// Gatekeeper for the operator API tree (`/api/admin/*`)
///
/// Requests without a valid session get 401 `{"error":"Unauthorized"}`.
pub async fn admin_api_gatekeeper<D: Database + 'static>(
    State(state): State<AppState<D>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthResponse> {
    let token = extract_token(request.headers());
    let identity = match token {
        Some(token) => resolve_identity(&state, &token).await,
        None => None,
    };

    match identity {
        Some(identity) => {
            request.extensions_mut().insert(CurrentOperator(identity));
            Ok(next.run(request).await)
        }
        None => {
            tracing::debug!(path = %request.uri().path(), "Unauthorized operator API request");
            state.record_rejection("api");
            Err(AuthResponse::from_error(AuthError::Unauthorized))
        }
    }
}

/// Authentication error response
#[derive(Debug)]
pub struct AuthResponse {
    status: StatusCode,
    message: String,
}

impl AuthResponse {
    /// Map an auth error to its HTTP status and client-facing message
    pub fn from_error(error: AuthError) -> Self {
        match error {
            AuthError::MissingCredentials | AuthError::WeakPassword(_) => Self {
                status: StatusCode::BAD_REQUEST,
                message: error.to_string(),
            },
            AuthError::InvalidCredentials => Self {
                status: StatusCode::UNAUTHORIZED,
                message: error.to_string(),
            },
            AuthError::InvalidToken | AuthError::Unauthorized => Self {
                status: StatusCode::UNAUTHORIZED,
                message: "Unauthorized".to_string(),
            },
            AuthError::Forbidden => Self {
                status: StatusCode::FORBIDDEN,
                message: "Forbidden".to_string(),
            },
            AuthError::AccountLocked(_) => Self {
                status: StatusCode::LOCKED,
                message: error.to_string(),
            },
            AuthError::AccountNotFound => Self {
                status: StatusCode::NOT_FOUND,
                message: error.to_string(),
            },
            AuthError::Internal(e) => {
                tracing::error!(error = %e, "Internal authentication error");
                Self {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    message: "Internal server error".to_string(),
                }
            }
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<JsonRejection> for AuthResponse {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(error = %rejection, "Rejected request body");
        Self {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl IntoResponse for AuthResponse {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": self.message
        });
        (self.status, axum::Json(body)).into_response()
    }
}

/// Logging middleware function
///
/// Logs request and response details including:
/// - Method and path
/// - Status code
/// - Response time
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let uri = request.uri().clone();

    let response = next.run(request).await;

    let elapsed = start.elapsed();
    let status = response.status();

    tracing::info!(
        method = %method,
        path = %uri.path(),
        status = %status.as_u16(),
        duration_ms = %elapsed.as_millis(),
        "Request completed"
    );

    response
}

/// Tracing middleware function
///
/// Creates a span covering the entire request lifecycle. The query string
/// is left out of the span since it may carry redirect targets.
pub async fn tracing_middleware(request: Request, next: Next) -> Response {
    use tracing::Instrument;

    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let span = tracing::info_span!(
        "http_request",
        http.method = %method,
        http.target = %path,
        http.status_code = tracing::field::Empty,
    );

    async move {
        let response = next.run(request).await;
        tracing::Span::current().record("http.status_code", response.status().as_u16());
        response
    }
    .instrument(span)
    .await
}
