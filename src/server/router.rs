//! HTTP router for coop-cms
//!
//! This module defines the axum router that handles all HTTP requests.
//! It provides routes for:
//! - Health checks
//! - Login, logout and the current session
//! - The operator API tree (`/api/admin/*`) behind the API gatekeeper
//! - The operator UI tree (`/admin/*`) behind the UI gatekeeper

use axum::{
    extract::{rejection::JsonRejection, FromRef, Path, State},
    http::{header, HeaderMap, StatusCode},
    middleware,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::auth::{
    authenticate, clear_session_cookie, session_cookie, AuthManager, CurrentOperator,
    LoginOutcome, TokenIssuer,
};
use crate::database::Database;
use crate::error::AuthError;
use crate::otel::AuthMetrics;
use crate::webui::{
    self, AccountListResponse, AccountView, ChangePasswordRequest, HealthResponse, LoginRequest,
    LoginResponse, MessageResponse, SessionResponse,
};

use super::middleware::{admin_api_gatekeeper, admin_ui_gatekeeper, AuthResponse};

/// Shared application state
pub struct AppState<D: Database> {
    /// Authentication manager
    pub auth_manager: Arc<AuthManager<D>>,

    /// Session token issuer/verifier
    pub issuer: Arc<TokenIssuer>,

    /// Add `Secure` to session cookies
    pub cookie_secure: bool,

    /// Authentication metrics
    pub metrics: Option<AuthMetrics>,
}

impl<D: Database> AppState<D> {
    /// Build state around an auth manager, sharing its token issuer
    pub fn new(auth_manager: Arc<AuthManager<D>>, cookie_secure: bool) -> Self {
        let issuer = Arc::clone(auth_manager.issuer());
        Self {
            auth_manager,
            issuer,
            cookie_secure,
            metrics: None,
        }
    }

    /// Attach authentication metrics
    pub fn with_metrics(mut self, metrics: AuthMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub(crate) fn record_rejection(&self, tree: &'static str) {
        if let Some(metrics) = &self.metrics {
            metrics.record_rejection(tree);
        }
    }
}

impl<D: Database> Clone for AppState<D> {
    fn clone(&self) -> Self {
        Self {
            auth_manager: Arc::clone(&self.auth_manager),
            issuer: Arc::clone(&self.issuer),
            cookie_secure: self.cookie_secure,
            metrics: self.metrics.clone(),
        }
    }
}

impl<D: Database> FromRef<AppState<D>> for Arc<TokenIssuer> {
    fn from_ref(state: &AppState<D>) -> Self {
        Arc::clone(&state.issuer)
    }
}

/// Build the main application router
///
/// # Arguments
///
/// * `state` - Application state containing the auth manager
///
/// # Returns
///
/// An axum Router configured with all endpoints
pub fn build_router<D: Database + 'static>(state: AppState<D>) -> Router {
    let admin_api = Router::new()
        .route("/api/admin/session", get(admin_session_handler))
        .route("/api/admin/password", post(change_password_handler::<D>))
        .route("/api/admin/accounts", get(list_accounts_handler::<D>))
        .route(
            "/api/admin/accounts/:id/unlock",
            post(unlock_account_handler::<D>),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            admin_api_gatekeeper::<D>,
        ));

    let admin_ui = Router::new()
        .route("/admin", get(webui_index_handler))
        .route("/admin/*path", get(webui_static_handler))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            admin_ui_gatekeeper::<D>,
        ));

    Router::new()
        // Public endpoints
        .route("/health", get(health_handler))
        .route("/api/auth/login", post(login_handler::<D>))
        .route("/api/auth/logout", post(logout_handler::<D>))
        .route("/api/auth/me", get(me_handler))
        .route("/admin/login", get(login_page_handler))
        .route("/assets/*path", get(asset_handler))
        // Gatekept trees
        .merge(admin_api)
        .merge(admin_ui)
        .with_state(state)
}

// =============================================================================
// Health
// =============================================================================

/// Health check handler
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse::healthy()))
}

// =============================================================================
// Session endpoints
// =============================================================================

/// Response carrying a fresh session cookie and the login body
fn session_response<D: Database>(
    state: &AppState<D>,
    outcome: LoginOutcome,
) -> Result<Response, AuthResponse> {
    let max_age = state.issuer.ttl().num_seconds();
    let cookie = session_cookie(&outcome.token, max_age, state.cookie_secure).map_err(|e| {
        AuthResponse::from_error(AuthError::Internal(format!("invalid cookie value: {}", e)))
    })?;

    let body = LoginResponse {
        user: outcome.account,
        expires_at: outcome.expires_at,
    };
    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie)], Json(body)).into_response())
}

/// Login handler
async fn login_handler<D: Database + 'static>(
    State(state): State<AppState<D>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Response, AuthResponse> {
    let Json(request) = payload?;
    let outcome = state
        .auth_manager
        .login(&request.username, &request.password)
        .await
        .map_err(AuthResponse::from_error)?;

    session_response(&state, outcome)
}

/// Logout handler
///
/// Always clears the session cookie, with or without a valid session.
async fn logout_handler<D: Database + 'static>(
    State(state): State<AppState<D>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    if let Some(identity) = authenticate(&headers, &state.issuer) {
        state.auth_manager.logout(&identity).await;
    }

    (
        StatusCode::OK,
        [(header::SET_COOKIE, clear_session_cookie(state.cookie_secure))],
        Json(MessageResponse::new("Logged out")),
    )
}

/// Current operator handler
async fn me_handler(CurrentOperator(identity): CurrentOperator) -> impl IntoResponse {
    Json(SessionResponse { user: identity })
}

// =============================================================================
// Operator API (behind the API gatekeeper)
// =============================================================================

/// Session handler for the operator UI
async fn admin_session_handler(CurrentOperator(identity): CurrentOperator) -> impl IntoResponse {
    Json(SessionResponse { user: identity })
}

/// Change own password handler
async fn change_password_handler<D: Database + 'static>(
    State(state): State<AppState<D>>,
    CurrentOperator(identity): CurrentOperator,
    payload: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> Result<Response, AuthResponse> {
    let Json(request) = payload?;
    let outcome = state
        .auth_manager
        .change_password(&identity, &request.current_password, &request.new_password)
        .await
        .map_err(AuthResponse::from_error)?;

    session_response(&state, outcome)
}

/// List operator accounts handler (admin only)
async fn list_accounts_handler<D: Database + 'static>(
    State(state): State<AppState<D>>,
    CurrentOperator(identity): CurrentOperator,
) -> Result<Json<AccountListResponse>, AuthResponse> {
    let accounts = state
        .auth_manager
        .list_accounts(&identity)
        .await
        .map_err(AuthResponse::from_error)?;

    Ok(Json(AccountListResponse {
        accounts: accounts.iter().map(AccountView::from).collect(),
    }))
}

/// Unlock operator account handler (admin only)
async fn unlock_account_handler<D: Database + 'static>(
    State(state): State<AppState<D>>,
    CurrentOperator(identity): CurrentOperator,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, AuthResponse> {
    state
        .auth_manager
        .unlock_account(&identity, id)
        .await
        .map_err(AuthResponse::from_error)?;

    Ok(Json(MessageResponse::new("Account unlocked")))
}

// =============================================================================
// Operator UI
// =============================================================================

/// Login page handler
async fn login_page_handler() -> Response {
    webui::serve_login()
}

/// Dashboard shell handler
async fn webui_index_handler() -> Response {
    webui::serve_index()
}

/// Operator UI static file handler
async fn webui_static_handler(Path(path): Path<String>) -> Response {
    webui::serve_static(&path)
}

/// Public stylesheet and script handler for the login page
async fn asset_handler(Path(path): Path<String>) -> Response {
    let is_public = path.ends_with(".css") || path.ends_with(".js");
    match webui::get_static_file(&path) {
        Some(file) if is_public => file.into_response(),
        _ => (StatusCode::NOT_FOUND, format!("File not found: {}", path)).into_response(),
    }
}
