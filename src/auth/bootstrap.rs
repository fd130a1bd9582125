//! Initial administrator provisioning
//!
//! On an empty account table the configured bootstrap credentials become an
//! `admin` account that must change its password after first login.

use crate::config::AuthConfig;
use crate::database::Database;
use crate::error::AuthError;
use crate::models::{NewAccount, Role};

use super::password::hash_password;

/// Create the bootstrap admin when no accounts exist
///
/// Returns the new account id, or `None` when nothing was created.
pub async fn ensure_bootstrap_admin<D: Database + ?Sized>(
    db: &D,
    config: &AuthConfig,
) -> Result<Option<i64>, AuthError> {
    let Some(admin) = &config.bootstrap_admin else {
        return Ok(None);
    };

    if db.count_accounts().await? > 0 {
        tracing::debug!("Accounts already provisioned, skipping bootstrap admin");
        return Ok(None);
    }

    let password = admin.password.clone();
    let cost = config.bcrypt_cost;
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password, cost))
        .await
        .map_err(|e| AuthError::Internal(format!("Task join error: {}", e)))??;

    let username = admin.username.trim().to_string();
    let account = NewAccount {
        display_name: admin
            .display_name
            .clone()
            .unwrap_or_else(|| username.clone()),
        username,
        password_hash,
        role: Role::Admin,
        must_change_password: true,
    };

    let id = db.create_account(&account).await?;
    tracing::info!(
        account_id = id,
        username = %account.username,
        "Bootstrap admin account created"
    );
    Ok(Some(id))
}
