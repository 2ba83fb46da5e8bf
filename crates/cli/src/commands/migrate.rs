//! Database migration command.
//!
//! ```bash
//! sf-cli migrate
//! ```
//!
//! Reads `SHOPFRONT_DATABASE_URL` (or `DATABASE_URL`) and applies
//! `crates/storefront/migrations/` in order. Already applied migrations are
//! skipped, so the command is safe to re-run.

use shopfront_storefront::db;

use super::{CommandError, database_url};

/// Errors that can occur while migrating.
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Run the storefront migrations.
///
/// # Errors
///
/// Returns an error if the database is unreachable or a migration fails.
pub async fn run() -> Result<(), MigrationError> {
    let database_url = database_url()?;

    tracing::info!("Connecting to database...");
    let pool = db::create_pool(&database_url).await?;

    tracing::info!("Running migrations...");
    sqlx::migrate!("../storefront/migrations").run(&pool).await?;

    tracing::info!("Migrations complete");
    Ok(())
}
