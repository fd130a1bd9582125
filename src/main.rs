//! coop-cms - back office authentication for a cooperative-society website
//!
//! This is the main entry point for the coop-cms application.

use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tracing::{error, info};

use coop_cms::auth::{ensure_bootstrap_admin, AuthManager, TokenIssuer};
use coop_cms::config::Config;
use coop_cms::database::SqliteDatabase;
use coop_cms::error::AppError;
use coop_cms::otel::{init_tracing, AuthMetrics, OtelProvider};
use coop_cms::server::{AppState, Server};

/// coop-cms - back office authentication for a cooperative-society website
#[derive(Parser, Debug)]
#[command(name = "coop-cms")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, env = "COOP_CMS_CONFIG")]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Refuse to start without a signing secret
    let config = load_config(&args)?;
    config.validate().map_err(AppError::from)?;

    let otel_provider = OtelProvider::new(&config.otel)?;
    init_tracing(&otel_provider, &config.logging)?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting coop-cms");

    let database = SqliteDatabase::new(&config.database.path)
        .await
        .map_err(AppError::from)?;
    let database = Arc::new(database);
    info!(path = %config.database.path, "Database initialized");

    if let Some(id) = ensure_bootstrap_admin(database.as_ref(), &config.auth)
        .await
        .map_err(AppError::from)?
    {
        info!(account_id = id, "Bootstrap admin provisioned");
    }

    let metrics = AuthMetrics::new(&otel_provider.meter());
    let issuer = Arc::new(TokenIssuer::new(
        &config.auth.jwt_secret,
        config.auth.token_ttl(),
    ));
    let auth_manager = Arc::new(
        AuthManager::new(Arc::clone(&database), issuer, &config.auth)
            .with_metrics(metrics.clone()),
    );
    info!(
        token_ttl_hours = config.auth.token_ttl_hours,
        max_failures = config.auth.lockout.max_failures,
        lock_duration_secs = config.auth.lockout.lock_duration_secs,
        single_session = config.auth.single_session,
        "Authentication manager initialized"
    );

    let state = AppState::new(auth_manager, config.auth.cookie_secure).with_metrics(metrics);

    let server = Server::new(config.server.clone(), state);

    info!(
        host = %config.server.host,
        port = %config.server.port,
        "Starting HTTP server"
    );

    let result = server.run(shutdown_signal()).await;

    if let Err(e) = otel_provider.shutdown() {
        error!(error = %e, "Failed to shutdown OpenTelemetry");
    }

    info!("coop-cms shutdown complete");

    result.map_err(Into::into)
}

/// Load configuration from file or environment
fn load_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = match &args.config {
        Some(path) => {
            // Use eprintln! since tracing is not yet initialized
            eprintln!("Loading configuration from file: {}", path);
            Config::from_file(path).map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?
        }
        None => {
            eprintln!("Loading configuration from environment variables");
            Config::from_env().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?
        }
    };
    config.fill_secret_from_env();
    Ok(config)
}

/// Create a future that resolves when a shutdown signal is received
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
