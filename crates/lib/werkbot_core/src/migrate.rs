//! Embedded schema migrations (`werkbot_core/migrations/`).

use sqlx::PgPool;
use sqlx::migrate::{MigrateError, Migrator};
use tracing::info;

/// Migrator over the embedded migration set.
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Bring the schema behind `pool` up to date.
pub async fn migrate(pool: &PgPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await?;
    info!(migrations = MIGRATOR.iter().count(), "database schema up to date");
    Ok(())
}
