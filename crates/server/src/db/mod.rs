//! Database access for the storefront service.
//!
//! ## Tables
//!
//! - `product` - the catalog
//! - `customer_order` / `order_line` - orders and their lines
//! - `persona_settings` - singleton persona record for the chat assistant
//!
//! # Migrations
//!
//! Migrations are embedded from `crates/server/migrations/` and run at
//! startup, or manually via:
//! ```bash
//! cargo run -p shoptalk-cli -- migrate
//! ```

pub mod orders;
pub mod persona;
pub mod products;

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::SqlitePool;
use sqlx::migrate::{MigrateError, Migrator};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use thiserror::Error;

pub use orders::{CUSTOMER_ORDERS_LIMIT, OrderRepository};
pub use persona::PersonaRepository;
pub use products::ProductRepository;

/// Embedded migrations.
pub static MIGRATOR: Migrator = sqlx::migrate!();

/// Failures surfaced by the repository layer.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Query or connection failure from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored value could not be decoded.
    #[error("stored data invalid: {0}")]
    DataCorruption(String),

    /// The row does not exist.
    #[error("not found")]
    NotFound,

    /// A uniqueness rule blocked the write, e.g. a duplicate order number.
    #[error("conflicting write: {0}")]
    Conflict(String),
}

/// Create a `SQLite` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the URL is invalid or the connection fails.
pub async fn create_pool(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    create_pool_with(database_url, 5, 30).await
}

/// Create a `SQLite` connection pool with explicit sizing.
///
/// The database file is created if missing. Every connection gets foreign
/// keys, WAL journaling, and a busy timeout.
///
/// # Errors
///
/// Returns `sqlx::Error` if the URL is invalid or the connection fails.
pub async fn create_pool_with(
    database_url: &str,
    max_connections: u32,
    acquire_timeout_secs: u64,
) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

    SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .acquire_timeout(Duration::from_secs(acquire_timeout_secs.max(1)))
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                sqlx::query("PRAGMA foreign_keys = ON")
                    .execute(&mut *conn)
                    .await?;
                sqlx::query("PRAGMA journal_mode = WAL")
                    .execute(&mut *conn)
                    .await?;
                sqlx::query("PRAGMA busy_timeout = 5000")
                    .execute(&mut *conn)
                    .await?;
                Ok(())
            })
        })
        .connect_with(options)
        .await
}

/// Run pending migrations.
///
/// # Errors
///
/// Returns `MigrateError` if a migration fails to apply.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

/// Parse a stored RFC 3339 timestamp.
pub(crate) fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::DataCorruption(format!("timestamp {s:?}: {e}")))
}

/// Parse a stored decimal string.
pub(crate) fn parse_decimal(s: &str) -> Result<Decimal, RepositoryError> {
    s.parse::<Decimal>()
        .map_err(|e| RepositoryError::DataCorruption(format!("decimal {s:?}: {e}")))
}
