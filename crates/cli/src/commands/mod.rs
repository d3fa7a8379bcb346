//! CLI subcommands.

pub mod migrate;
pub mod seed;

/// `SQLite` connection string from the environment, with the same default
/// the server uses.
pub(crate) fn database_url() -> String {
    dotenvy::dotenv().ok();
    std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://shoptalk.db".to_string())
}
