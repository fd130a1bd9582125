//! Authentication manager
//!
//! This module provides the main authentication interface for the application.
//! It runs the login flow, session checks, password changes and the operator
//! administration actions on top of the account store.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::OnceCell;

use crate::config::AuthConfig;
use crate::database::Database;
use crate::error::AuthError;
use crate::models::{Account, AccountSummary, Identity};
use crate::otel::{AuthMetrics, LoginOutcomeLabel};

use super::jwt::{IssuedToken, TokenIssuer};
use super::lockout::{LockoutConfig, LockoutPolicy};
use super::password::{hash_password, validate_password, verify_password};

/// Plaintext behind the hash checked for unknown or inactive accounts
const DUMMY_PASSWORD: &str = "coop-cms-dummy-password";

/// Result of a successful login
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginOutcome {
    /// Signed session token
    pub token: String,

    /// When the token expires
    pub expires_at: DateTime<Utc>,

    /// Account fields for the operator UI
    pub account: AccountSummary,
}

impl LoginOutcome {
    fn new(issued: IssuedToken, account: &Account) -> Self {
        Self {
            token: issued.token,
            expires_at: issued.expires_at,
            account: AccountSummary::from(account),
        }
    }
}

/// Authentication manager
///
/// Provides methods for logging operators in and managing their sessions.
pub struct AuthManager<D: Database> {
    db: Arc<D>,
    issuer: Arc<TokenIssuer>,
    lockout: LockoutPolicy,
    bcrypt_cost: u32,
    single_session: bool,
    metrics: Option<AuthMetrics>,
    dummy_hash: OnceCell<String>,
}

impl<D: Database> AuthManager<D> {
    /// Create a new authentication manager
    pub fn new(db: Arc<D>, issuer: Arc<TokenIssuer>, config: &AuthConfig) -> Self {
        Self {
            db,
            issuer,
            lockout: LockoutPolicy::new(LockoutConfig::from(&config.lockout)),
            bcrypt_cost: config.bcrypt_cost,
            single_session: config.single_session,
            metrics: None,
            dummy_hash: OnceCell::new(),
        }
    }

    /// Attach authentication metrics
    pub fn with_metrics(mut self, metrics: AuthMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Token issuer used for new sessions
    pub fn issuer(&self) -> &Arc<TokenIssuer> {
        &self.issuer
    }

    /// Authenticate an operator with username and password
    ///
    /// Unknown and inactive accounts get the same error as a wrong password.
    /// A locked account is refused before its password is checked.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginOutcome, AuthError> {
        let result = self.try_login(username, password).await;
        self.record_login(&result);
        result
    }

    async fn try_login(&self, username: &str, password: &str) -> Result<LoginOutcome, AuthError> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            tracing::debug!("Login request without username or password");
            return Err(AuthError::MissingCredentials);
        }

        let mut account = match self.db.get_account_by_username(username).await? {
            Some(account) if account.is_active => account,
            Some(_) => {
                tracing::info!(username = %username, "Login attempt for inactive account");
                self.verify_dummy(password).await;
                return Err(AuthError::InvalidCredentials);
            }
            None => {
                tracing::info!(username = %username, "Login attempt for unknown account");
                self.verify_dummy(password).await;
                return Err(AuthError::InvalidCredentials);
            }
        };

        let now = Utc::now();
        if let Some(until) = self.lockout.locked_until(&account, now) {
            tracing::info!(
                account_id = account.id,
                locked_until = %until,
                "Login attempt for locked account"
            );
            return Err(AuthError::AccountLocked(until));
        }

        let matches = self
            .verify_blocking(password, &account.password_hash)
            .await?;

        if !matches {
            let locked = self.lockout.register_failure(&mut account, now)?;
            self.db
                .update_failed_logins(
                    account.id,
                    account.failed_login_attempts,
                    account.locked_until,
                )
                .await?;

            if locked {
                tracing::warn!(
                    account_id = account.id,
                    username = %account.username,
                    failed_attempts = account.failed_login_attempts,
                    "Account locked after repeated failed logins"
                );
                if let Some(metrics) = &self.metrics {
                    metrics.record_lockout();
                }
            } else {
                tracing::info!(
                    account_id = account.id,
                    failed_attempts = account.failed_login_attempts,
                    remaining_attempts = self.lockout.remaining_attempts(&account, now),
                    "Failed login attempt"
                );
            }
            return Err(AuthError::InvalidCredentials);
        }

        self.lockout.register_success(&mut account);
        let issued = self.issuer.issue(&account.identity())?;
        self.db
            .record_successful_login(account.id, &issued.token, now)
            .await?;
        account.last_login_at = Some(now);
        account.login_count += 1;
        account.session_token = Some(issued.token.clone());

        tracing::info!(
            account_id = account.id,
            username = %account.username,
            role = %account.role,
            "Operator logged in"
        );

        Ok(LoginOutcome::new(issued, &account))
    }

    /// End the operator's session
    ///
    /// Clears the stored session token. Failures are logged and ignored since
    /// the client cookie is removed either way.
    pub async fn logout(&self, identity: &Identity) {
        if let Err(e) = self.db.set_session_token(identity.account_id, None).await {
            tracing::warn!(
                error = %e,
                account_id = identity.account_id,
                "Failed to clear stored session token"
            );
        } else {
            tracing::info!(account_id = identity.account_id, "Operator logged out");
        }
    }

    /// Check a verified token against the stored session
    ///
    /// Only enforced in single-session mode: the account must still be active
    /// and `token` must be the one issued last.
    pub async fn check_session(&self, identity: &Identity, token: &str) -> Result<(), AuthError> {
        if !self.single_session {
            return Ok(());
        }

        let account = self
            .db
            .get_account(identity.account_id)
            .await?
            .ok_or(AuthError::Unauthorized)?;

        if !account.is_active || account.session_token.as_deref() != Some(token) {
            tracing::debug!(
                account_id = identity.account_id,
                "Session token superseded or account inactive"
            );
            return Err(AuthError::Unauthorized);
        }
        Ok(())
    }

    /// Change the operator's own password
    ///
    /// Rotates the session: the returned outcome carries a fresh token.
    pub async fn change_password(
        &self,
        identity: &Identity,
        current_password: &str,
        new_password: &str,
    ) -> Result<LoginOutcome, AuthError> {
        if current_password.is_empty() || new_password.is_empty() {
            return Err(AuthError::MissingCredentials);
        }

        let mut account = self
            .db
            .get_account(identity.account_id)
            .await?
            .filter(|account| account.is_active)
            .ok_or(AuthError::Unauthorized)?;

        if !self
            .verify_blocking(current_password, &account.password_hash)
            .await?
        {
            tracing::info!(
                account_id = account.id,
                "Password change refused: current password mismatch"
            );
            return Err(AuthError::InvalidCredentials);
        }

        validate_password(new_password)?;
        let new_hash = self.hash_blocking(new_password).await?;
        self.db.update_password(account.id, &new_hash, false).await?;
        account.password_hash = new_hash;
        account.must_change_password = false;

        let issued = self.issuer.issue(&account.identity())?;
        self.db
            .set_session_token(account.id, Some(issued.token.clone()))
            .await?;
        account.session_token = Some(issued.token.clone());

        tracing::info!(account_id = account.id, "Password changed");
        Ok(LoginOutcome::new(issued, &account))
    }

    /// List all operator accounts (admin only)
    pub async fn list_accounts(&self, identity: &Identity) -> Result<Vec<Account>, AuthError> {
        require_admin(identity)?;
        Ok(self.db.list_accounts().await?)
    }

    /// Clear the lockout of an account (admin only)
    pub async fn unlock_account(&self, identity: &Identity, account_id: i64) -> Result<(), AuthError> {
        require_admin(identity)?;
        self.db.update_failed_logins(account_id, 0, None).await?;
        tracing::info!(
            account_id = account_id,
            unlocked_by = identity.account_id,
            "Account unlocked"
        );
        Ok(())
    }

    async fn verify_blocking(&self, password: &str, hash: &str) -> Result<bool, AuthError> {
        let password = password.to_string();
        let hash = hash.to_string();
        tokio::task::spawn_blocking(move || verify_password(&password, &hash))
            .await
            .map_err(|e| AuthError::Internal(format!("Task join error: {}", e)))
    }

    /// Spend one bcrypt verification so unknown usernames cost the same
    async fn verify_dummy(&self, password: &str) {
        let hash = self
            .dummy_hash
            .get_or_try_init(|| self.hash_blocking(DUMMY_PASSWORD))
            .await;
        match hash {
            Ok(hash) => {
                let _ = self.verify_blocking(password, hash).await;
            }
            Err(e) => tracing::warn!(error = %e, "Failed to prepare dummy password hash"),
        }
    }

    async fn hash_blocking(&self, password: &str) -> Result<String, AuthError> {
        let password = password.to_string();
        let cost = self.bcrypt_cost;
        tokio::task::spawn_blocking(move || hash_password(&password, cost))
            .await
            .map_err(|e| AuthError::Internal(format!("Task join error: {}", e)))?
    }

    fn record_login(&self, result: &Result<LoginOutcome, AuthError>) {
        let Some(metrics) = &self.metrics else {
            return;
        };
        let label = match result {
            Ok(_) => LoginOutcomeLabel::Success,
            Err(AuthError::MissingCredentials) => LoginOutcomeLabel::MissingCredentials,
            Err(AuthError::InvalidCredentials) => LoginOutcomeLabel::InvalidCredentials,
            Err(AuthError::AccountLocked(_)) => LoginOutcomeLabel::Locked,
            Err(_) => LoginOutcomeLabel::Error,
        };
        metrics.record_login(label);
    }
}

fn require_admin(identity: &Identity) -> Result<(), AuthError> {
    if identity.role.is_admin() {
        Ok(())
    } else {
        Err(AuthError::Forbidden)
    }
}
