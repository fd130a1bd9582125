//! coop-cms - back office authentication for a cooperative-society website
//!
//! This crate provides operator login, session tokens, failed-login lockout
//! and the gatekeepers in front of the operator UI and API.

pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod models;
pub mod otel;
pub mod server;
pub mod webui;
