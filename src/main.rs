//! clerksync service.
//!
//! Main entry point. Loads configuration, connects to PostgreSQL, ensures the
//! `users` table exists and serves the webhook receiver until shutdown.

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clerksync_api::{AppState, Config};
use clerksync_core::Storage;
use clerksync_identity::ClerkClient;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;

    init_tracing(&config.rust_log)?;

    info!("Starting clerksync webhook receiver");
    info!(
        database_url = %config.database_url_masked(),
        host = %config.host,
        port = config.port,
        clerk_api_url = %config.clerk_api_url,
        default_role = %config.default_role,
        max_connections = config.database_max_connections,
        "Configuration loaded"
    );

    let webhook_settings = config.to_webhook_settings();
    if webhook_settings.signing_secret.is_none() {
        warn!("CLERK_WEBHOOK_SECRET is not set; webhook signatures will not be verified");
    }

    let db_pool = create_database_pool(&config).await?;
    info!("Database connection pool established");

    run_migrations(&db_pool).await?;
    info!("Database schema ready");

    let identity =
        ClerkClient::new(config.to_client_config()).context("Failed to create identity client")?;

    let state = AppState::new(
        Arc::new(Storage::new(db_pool.clone())),
        Arc::new(identity),
        webhook_settings,
    );

    let addr = config.parse_server_addr()?;
    clerksync_api::start_server(state, addr, config.request_timeout())
        .await
        .context("HTTP server failed")?;

    db_pool.close().await;
    info!("Database connections closed");

    info!("clerksync shutdown complete");
    Ok(())
}

/// Initializes tracing, preferring `RUST_LOG` from the environment over the
/// configured level.
fn init_tracing(default_filter: &str) -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .context("Invalid log filter")?;

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry().with(filter).with(fmt_layer).init();
    Ok(())
}

/// Creates the database connection pool with retry logic.
async fn create_database_pool(config: &Config) -> Result<sqlx::PgPool> {
    const MAX_RETRIES: u32 = 5;
    const RETRY_DELAY: Duration = Duration::from_secs(2);

    let mut retries = 0;

    loop {
        match PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connection_timeout))
            .idle_timeout(Duration::from_secs(config.database_idle_timeout))
            .max_lifetime(Duration::from_secs(config.database_max_lifetime))
            .connect(&config.database_url)
            .await
        {
            Ok(pool) => {
                sqlx::query("SELECT 1")
                    .fetch_one(&pool)
                    .await
                    .context("Failed to verify database connection")?;

                return Ok(pool);
            },
            Err(e) if retries < MAX_RETRIES => {
                retries += 1;
                warn!(
                    attempt = retries,
                    max_retries = MAX_RETRIES,
                    error = %e,
                    "Database connection failed, retrying"
                );
                tokio::time::sleep(RETRY_DELAY).await;
            },
            Err(e) => {
                return Err(e).context("Failed to create database connection pool after retries");
            },
        }
    }
}

/// Ensures the `users` table and its lookup index exist.
///
/// `external_id` is indexed but not unique: replayed deliveries insert
/// additional rows.
async fn run_migrations(pool: &sqlx::PgPool) -> Result<()> {
    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS users (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            external_id TEXT NOT NULL DEFAULT '',
            first_name TEXT NOT NULL DEFAULT '',
            last_name TEXT NOT NULL DEFAULT '',
            email TEXT NOT NULL DEFAULT '',
            image_url TEXT NOT NULL DEFAULT '',
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        ",
    )
    .execute(pool)
    .await
    .context("Failed to create users table")?;

    sqlx::query(
        r"
        CREATE INDEX IF NOT EXISTS idx_users_external_id
        ON users(external_id)
        ",
    )
    .execute(pool)
    .await
    .context("Failed to create users external_id index")?;

    Ok(())
}
