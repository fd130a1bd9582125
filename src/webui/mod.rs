//! Operator UI backend module
//!
//! This module provides the backend functionality for the operator UI:
//! - API request/response types
//! - Static file embedding and serving (via rust-embed)

pub mod api;

pub use api::*;

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use rust_embed::RustEmbed;

/// Embedded static files from the web/dist directory
#[derive(RustEmbed)]
#[folder = "web/dist/"]
#[prefix = ""]
pub struct Assets;

/// Get a static file from the embedded assets
pub fn get_static_file(path: &str) -> Option<StaticFile> {
    // Handle empty path or root path - serve index.html
    let path = if path.is_empty() || path == "/" {
        "index.html"
    } else {
        path.trim_start_matches('/')
    };

    Assets::get(path).map(|content| StaticFile {
        content: content.data.into_owned(),
        mime_type: mime_guess::from_path(path)
            .first_or_octet_stream()
            .to_string(),
    })
}

/// A static file with content and MIME type
pub struct StaticFile {
    pub content: Vec<u8>,
    pub mime_type: String,
}

impl IntoResponse for StaticFile {
    fn into_response(self) -> Response {
        (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, self.mime_type),
                (header::CACHE_CONTROL, "no-store".to_string()),
            ],
            self.content,
        )
            .into_response()
    }
}

fn serve_page(name: &str) -> Response {
    match get_static_file(name) {
        Some(file) => file.into_response(),
        None => (
            StatusCode::NOT_FOUND,
            format!("Operator UI page missing: {}", name),
        )
            .into_response(),
    }
}

/// Serve the dashboard shell
pub fn serve_index() -> Response {
    serve_page("index.html")
}

/// Serve the login page
pub fn serve_login() -> Response {
    serve_page("login.html")
}

/// Serve a static file or fall back to the dashboard shell
pub fn serve_static(path: &str) -> Response {
    if let Some(file) = get_static_file(path) {
        return file.into_response();
    }

    // Client-side routes get the shell, missing assets a 404
    if path.contains('.') {
        (StatusCode::NOT_FOUND, format!("File not found: {}", path)).into_response()
    } else {
        serve_index()
    }
}
