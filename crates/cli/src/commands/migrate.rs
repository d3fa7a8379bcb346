//! Database migration command.

use tracing::info;

use shoptalk_server::db;

/// Run database migrations against `DATABASE_URL`.
///
/// Creates the database file if it does not exist.
///
/// # Errors
///
/// Returns an error if the database is unreachable or a migration fails.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let database_url = super::database_url();

    info!("Connecting to {database_url}");
    let pool = db::create_pool(&database_url).await?;

    info!("Running migrations");
    db::run_migrations(&pool).await?;

    info!("Migrations complete");
    Ok(())
}
