//! Gatekeeper integration tests
//!
//! Tests how the operator UI and operator API trees treat:
//! - Requests without a session
//! - Tokens signed with another secret
//! - Valid cookie and bearer sessions

mod common;

use std::sync::Arc;

use common::*;
use coop_cms::auth::{AuthManager, TokenIssuer};
use coop_cms::server::AppState;
use reqwest::StatusCode;
use serde_json::{json, Value};

async fn login_token(client: &reqwest::Client, addr: std::net::SocketAddr) -> String {
    let response = client
        .post(format!("http://{}/api/auth/login", addr))
        .json(&json!({ "username": ADMIN_USERNAME, "password": ADMIN_PASSWORD }))
        .send()
        .await
        .expect("Request failed");
    assert_eq!(response.status(), StatusCode::OK);
    session_token_from(&response).expect("Missing session token")
}

/// Test 1: Health endpoint needs no session
#[tokio::test]
async fn test_health_is_public() {
    let state = create_test_state().await;
    let (addr, shutdown_tx) = run_test_server(state).await;

    let response = create_test_client()
        .get(format!("http://{}/health", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "healthy");

    let _ = shutdown_tx.send(());
}

/// Test 2: Operator UI without a session redirects to the login page
#[tokio::test]
async fn test_ui_redirects_to_login() {
    let state = create_test_state().await;
    let (addr, shutdown_tx) = run_test_server(state).await;
    let client = create_test_client();

    let response = client
        .get(format!("http://{}/admin/pages", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers().get(reqwest::header::LOCATION).unwrap(),
        "/admin/login?next=/admin/pages"
    );

    // The login page itself is reachable
    let response = client
        .get(format!("http://{}/admin/login", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let _ = shutdown_tx.send(());
}

/// Test 3: Operator API without a session answers 401 JSON
#[tokio::test]
async fn test_api_requires_session() {
    let state = create_test_state().await;
    let (addr, shutdown_tx) = run_test_server(state).await;

    let response = create_test_client()
        .get(format!("http://{}/api/admin/session", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "error": "Unauthorized" }));

    let _ = shutdown_tx.send(());
}

/// Test 4: Cookie and bearer sessions both pass the gatekeepers
#[tokio::test]
async fn test_valid_session_passes() {
    let state = create_test_state().await;
    let (addr, shutdown_tx) = run_test_server(state).await;
    let client = create_test_client();
    let token = login_token(&client, addr).await;

    let response = client
        .get(format!("http://{}/api/admin/session", addr))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["user"]["username"], ADMIN_USERNAME);
    assert_eq!(body["user"]["role"], "admin");

    let response = client
        .get(format!("http://{}/admin", addr))
        .header(reqwest::header::COOKIE, format!("token={}", token))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let html = response.text().await.unwrap();
    assert!(html.contains("<html"));

    let _ = shutdown_tx.send(());
}

/// Test 5: Tokens signed before a secret rotation are rejected
#[tokio::test]
async fn test_rotated_secret_invalidates_sessions() {
    let database = create_test_database().await;
    let config = create_test_auth_config();
    let state = create_test_state_with(Arc::clone(&database), &config).await;
    let (addr, shutdown_tx) = run_test_server(state).await;
    let client = create_test_client();
    let token = login_token(&client, addr).await;
    let _ = shutdown_tx.send(());

    // Same database, new signing secret
    let rotated = coop_cms::config::AuthConfig {
        jwt_secret: "rotated-secret".to_string(),
        ..config
    };
    let issuer = Arc::new(TokenIssuer::new(&rotated.jwt_secret, rotated.token_ttl()));
    let auth_manager = Arc::new(AuthManager::new(database, issuer, &rotated));
    let (addr, shutdown_tx) = run_test_server(AppState::new(auth_manager, false)).await;

    let response = client
        .get(format!("http://{}/api/admin/session", addr))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = client
        .get(format!("http://{}/admin", addr))
        .header(reqwest::header::COOKIE, format!("token={}", token))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let cleared = response
        .headers()
        .get(reqwest::header::SET_COOKIE)
        .expect("Stale cookie should be cleared")
        .to_str()
        .unwrap();
    assert!(cleared.contains("Max-Age=0"));

    let _ = shutdown_tx.send(());
}

/// Test 6: Only admins may list accounts
#[tokio::test]
async fn test_account_list_is_admin_only() {
    let state = create_test_state().await;
    let (addr, shutdown_tx) = run_test_server(state).await;
    let client = create_test_client();
    let token = login_token(&client, addr).await;

    let response = client
        .get(format!("http://{}/api/admin/accounts", addr))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    let accounts = body["accounts"].as_array().unwrap();
    assert_eq!(accounts.len(), 1);
    assert_eq!(accounts[0]["username"], ADMIN_USERNAME);
    assert!(accounts[0].get("password_hash").is_none());

    let _ = shutdown_tx.send(());
}
