//! Common test utilities and helpers for integration tests

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use coop_cms::auth::{ensure_bootstrap_admin, AuthManager, TokenIssuer};
use coop_cms::config::{AuthConfig, BootstrapAdminConfig, LockoutSettings, ServerConfig};
use coop_cms::database::SqliteDatabase;
use coop_cms::server::AppState;

pub const TEST_SECRET: &str = "integration-test-secret";
pub const ADMIN_USERNAME: &str = "admin";
pub const ADMIN_PASSWORD: &str = "admin1234";

/// Create an in-memory database for testing
pub async fn create_test_database() -> Arc<SqliteDatabase> {
    Arc::new(
        SqliteDatabase::new(":memory:")
            .await
            .expect("Failed to create test database"),
    )
}

/// Auth configuration with a cheap bcrypt cost and a bootstrap admin
pub fn create_test_auth_config() -> AuthConfig {
    AuthConfig {
        jwt_secret: TEST_SECRET.to_string(),
        bcrypt_cost: 4,
        bootstrap_admin: Some(BootstrapAdminConfig {
            username: ADMIN_USERNAME.to_string(),
            password: ADMIN_PASSWORD.to_string(),
            display_name: Some("Site Admin".to_string()),
        }),
        ..Default::default()
    }
}

/// Same as [`create_test_auth_config`] with a one second lock
pub fn create_short_lockout_config() -> AuthConfig {
    AuthConfig {
        lockout: LockoutSettings {
            max_failures: 5,
            lock_duration_secs: 1,
        },
        ..create_test_auth_config()
    }
}

/// Build application state over `database`, provisioning the bootstrap admin
pub async fn create_test_state_with(
    database: Arc<SqliteDatabase>,
    config: &AuthConfig,
) -> AppState<SqliteDatabase> {
    ensure_bootstrap_admin(database.as_ref(), config)
        .await
        .expect("Failed to provision bootstrap admin");

    let issuer = Arc::new(TokenIssuer::new(&config.jwt_secret, config.token_ttl()));
    let auth_manager = Arc::new(AuthManager::new(database, issuer, config));
    AppState::new(auth_manager, config.cookie_secure)
}

/// Create a test application state with the default test configuration
pub async fn create_test_state() -> AppState<SqliteDatabase> {
    let database = create_test_database().await;
    create_test_state_with(database, &create_test_auth_config()).await
}

/// Create a test server configuration with a random port
pub fn create_test_server_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0, // Let OS assign a free port
    }
}

/// HTTP client that surfaces redirects instead of following them
pub fn create_test_client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .expect("Failed to build HTTP client")
}

/// Extract the session token from a `Set-Cookie` response header
pub fn session_token_from(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(|cookie| {
            cookie
                .split(';')
                .next()
                .and_then(|pair| pair.trim().strip_prefix("token="))
                .filter(|token| !token.is_empty())
                .map(str::to_string)
        })
}

/// Run a test server in the background and return the address
/// The server will be shut down when the returned shutdown sender is dropped or sent
pub async fn run_test_server(
    state: AppState<SqliteDatabase>,
) -> (SocketAddr, tokio::sync::oneshot::Sender<()>) {
    use tokio::net::TcpListener;

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test server");
    let addr = listener.local_addr().expect("Failed to get local address");

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

    let app = coop_cms::server::build_app(state);

    tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await
            .expect("Server error");
    });

    // Give the server a moment to start (100ms is sufficient for slow CI systems)
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    (addr, shutdown_tx)
}
