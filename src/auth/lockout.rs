//! Failed-login lockout policy
//!
//! Counts consecutive failed logins per account. Once the threshold is
//! reached the account is refused until the lock deadline passes. The
//! policy only mutates the in-memory `Account`; persisting the result is
//! the caller's job.

use chrono::{DateTime, Duration, Utc};

use crate::config::LockoutSettings;
use crate::error::AuthError;
use crate::models::Account;

/// Lockout thresholds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockoutConfig {
    /// Consecutive failures that trigger a lock
    pub max_failures: u32,

    /// How long a lock lasts
    pub lock_duration: Duration,
}

impl Default for LockoutConfig {
    fn default() -> Self {
        Self {
            max_failures: 5,
            lock_duration: Duration::minutes(30),
        }
    }
}

impl From<&LockoutSettings> for LockoutConfig {
    fn from(settings: &LockoutSettings) -> Self {
        Self {
            max_failures: settings.max_failures,
            lock_duration: i64::try_from(settings.lock_duration_secs)
                .ok()
                .and_then(Duration::try_seconds)
                .unwrap_or_else(Duration::max_value),
        }
    }
}

/// Lockout state of an account at a given instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    /// Logins are attempted normally
    Open { failed_attempts: u32 },
    /// Logins are refused until the deadline
    Locked { until: DateTime<Utc> },
}

/// Applies lockout transitions to accounts
#[derive(Debug, Clone, Default)]
pub struct LockoutPolicy {
    config: LockoutConfig,
}

impl LockoutPolicy {
    pub fn new(config: LockoutConfig) -> Self {
        Self { config }
    }

    /// Current state of the account
    ///
    /// A lock whose deadline has passed counts as open even if the stored
    /// field was never cleared.
    pub fn state(&self, account: &Account, now: DateTime<Utc>) -> LockState {
        match account.locked_until {
            Some(until) if until > now => LockState::Locked { until },
            Some(_) => LockState::Open { failed_attempts: 0 },
            None => LockState::Open {
                failed_attempts: account.failed_login_attempts,
            },
        }
    }

    /// Lock deadline if the account is currently locked
    pub fn locked_until(&self, account: &Account, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self.state(account, now) {
            LockState::Locked { until } => Some(until),
            LockState::Open { .. } => None,
        }
    }

    /// Record a failed login
    ///
    /// Returns true when this failure locked the account. Fails when the
    /// lock deadline is not representable.
    pub fn register_failure(
        &self,
        account: &mut Account,
        now: DateTime<Utc>,
    ) -> Result<bool, AuthError> {
        // An expired lock starts a fresh count
        if matches!(account.locked_until, Some(until) if until <= now) {
            account.failed_login_attempts = 0;
            account.locked_until = None;
        }

        account.failed_login_attempts = account.failed_login_attempts.saturating_add(1);

        if account.failed_login_attempts >= self.config.max_failures {
            let until = now
                .checked_add_signed(self.config.lock_duration)
                .ok_or_else(|| AuthError::Internal("lock deadline out of range".to_string()))?;
            account.locked_until = Some(until);
            return Ok(true);
        }
        Ok(false)
    }

    /// Record a successful login
    pub fn register_success(&self, account: &mut Account) {
        account.failed_login_attempts = 0;
        account.locked_until = None;
    }

    /// Failures left before the account locks
    pub fn remaining_attempts(&self, account: &Account, now: DateTime<Utc>) -> u32 {
        match self.state(account, now) {
            LockState::Locked { .. } => 0,
            LockState::Open { failed_attempts } => {
                self.config.max_failures.saturating_sub(failed_attempts)
            }
        }
    }
}
