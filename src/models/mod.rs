//! Domain models for coop-cms
//!
//! This module contains the core domain models used throughout the application.

pub mod account;

pub use account::{Account, AccountSummary, Identity, NewAccount, Role};
