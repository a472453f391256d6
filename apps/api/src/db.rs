use anyhow::Result;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use tracing::info;

use crate::config::Config;

/// Upper bound on concurrent connections. Requests beyond this queue on the
/// pool until a connection frees up or the acquire timeout elapses.
const MAX_CONNECTIONS: u32 = 10;

/// Creates and returns a PostgreSQL connection pool.
pub async fn create_pool(config: &Config) -> Result<PgPool> {
    info!("Connecting to PostgreSQL...");

    let pool = PgPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .connect_with(connect_options(config))
        .await?;

    info!(event = "database.initialized", "PostgreSQL connection pool established");
    Ok(pool)
}

/// Builds a pool without opening any connection. Used by the test harness so
/// routes that never touch the database can be exercised offline. The short
/// acquire timeout keeps paths that do reach the pool from stalling a test
/// run.
pub fn create_lazy_pool(config: &Config) -> PgPool {
    PgPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .acquire_timeout(std::time::Duration::from_secs(1))
        .connect_lazy_with(connect_options(config))
}

fn connect_options(config: &Config) -> PgConnectOptions {
    PgConnectOptions::new()
        .host(&config.pg_host)
        .port(config.pg_port)
        .username(&config.pg_user)
        .password(&config.pg_password)
        .database(&config.pg_database)
}
