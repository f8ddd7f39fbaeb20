//! Job store backends for pgjq.
//!
//! Provides the PostgreSQL and in-memory implementations of `pgjq_core::JobStore`.

pub mod error;
pub mod store;

pub use error::{DbError, DbResult};
pub use store::*;

use pgjq_config::DatabaseConfig;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

/// Create a new database connection pool.
pub async fn create_pool(database_url: &str, config: &DatabaseConfig) -> DbResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Run database migrations.
pub async fn run_migrations(pool: &PgPool) -> DbResult<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
