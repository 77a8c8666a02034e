//! Postgres pool for the document store and the `database` blob backend.

use anyhow::{Context, Result};
use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions},
    PgPool,
};
use std::str::FromStr;
use std::time::Duration;

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);
const IDLE_TIMEOUT: Duration = Duration::from_secs(5 * 60);
const MAX_LIFETIME: Duration = Duration::from_secs(30 * 60);

/// Connect and bring the schema up to date before anything reads from it.
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<PgPool> {
    let options = PgConnectOptions::from_str(database_url)
        .context("DATABASE_URL is not a valid postgres connection string")?
        .application_name(env!("CARGO_PKG_NAME"));

    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .min_connections(1)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .idle_timeout(IDLE_TIMEOUT)
        .max_lifetime(MAX_LIFETIME)
        .connect_with(options)
        .await
        .context("could not connect to postgres")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("document schema migration failed")?;

    tracing::info!(max_connections, "Postgres pool ready");
    Ok(pool)
}

pub async fn health_check(pool: &PgPool) -> bool {
    sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(pool)
        .await
        .map(|one| one == 1)
        .unwrap_or(false)
}
