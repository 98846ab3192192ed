//! Storage layer: PostgreSQL models and repositories, plus the backend
//! traits the engine is written against and an in-memory backend for
//! embedded use and tests.

pub mod backend;
pub mod memory;
pub mod models;
pub mod repositories;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

pub use backend::{AccessGrantBackend, EmailQueueBackend, EmailRuleBackend, StudentLogBackend};
pub use backend::PgBackend;
pub use memory::MemoryBackend;

/// Convenience alias used throughout the workspace.
pub type DbPool = PgPool;

/// Default maximum pool size when `DATABASE_MAX_CONNECTIONS` is not set.
const DEFAULT_MAX_CONNECTIONS: u32 = 10;

// ---------------------------------------------------------------------------
// StorageError
// ---------------------------------------------------------------------------

/// Failure at the storage boundary.
///
/// Surfaced verbatim to callers; retry policy belongs to them.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("stored value could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("backing store unavailable: {0}")]
    Unavailable(String),

    #[error("configuration error: {0}")]
    Config(String),
}

// ---------------------------------------------------------------------------
// Pool construction
// ---------------------------------------------------------------------------

/// Connect to PostgreSQL at `database_url`.
pub async fn connect(database_url: &str) -> Result<DbPool, StorageError> {
    let pool = PgPoolOptions::new()
        .max_connections(DEFAULT_MAX_CONNECTIONS)
        .connect(database_url)
        .await?;
    tracing::info!("Connected to database");
    Ok(pool)
}

/// Connect using `DATABASE_URL` from the environment (a `.env` file is
/// honored when present).
pub async fn connect_from_env() -> Result<DbPool, StorageError> {
    let _ = dotenvy::dotenv();
    let url = std::env::var("DATABASE_URL")
        .map_err(|_| StorageError::Config("DATABASE_URL is not set".into()))?;
    let max_connections = std::env::var("DATABASE_MAX_CONNECTIONS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_MAX_CONNECTIONS);

    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(&url)
        .await?;
    tracing::info!(max_connections, "Connected to database");
    Ok(pool)
}

/// Run pending migrations.
pub async fn run_migrations(pool: &DbPool) -> Result<(), StorageError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| StorageError::Database(sqlx::Error::Migrate(Box::new(e))))?;
    tracing::info!("Migrations applied");
    Ok(())
}
