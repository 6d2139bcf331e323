//! Database setup and initialization

use anyhow::{Context, Result};
use mediagate_core::Config;
use sqlx::PgPool;

/// Connect the pool and apply pending migrations.
pub async fn setup_database(config: &Config) -> Result<PgPool> {
    let pool = mediagate_db::connect(&config.database)
        .await
        .context("Failed to connect to database")?;

    mediagate_db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;

    Ok(pool)
}
