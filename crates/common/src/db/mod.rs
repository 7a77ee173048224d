//! Database layer for PhraseBank
//!
//! Provides:
//! - The `PhraseStore` abstraction every handler talks to
//! - SeaORM entity model for the `phrases` table
//! - Postgres repository and an in-process store
//! - Connection management

mod memory;
pub mod models;
mod repository;

pub use memory::MemoryStore;
pub use repository::Repository;

use crate::config::DatabaseConfig;
use crate::errors::{AppError, Result};
use crate::phrase::{NewPhrase, Phrase, PhrasePatch};
use async_trait::async_trait;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// URL prefix selecting the in-process store
pub const MEMORY_SCHEME: &str = "memory://";

/// Fixed name of the phrase collection
pub const PHRASES_COLLECTION: &str = "phrases";

/// Backing store for phrase records
#[async_trait]
pub trait PhraseStore: Send + Sync {
    /// Persist a new record, assigning an identifier when the input has none
    async fn insert(&self, input: NewPhrase) -> Result<Phrase>;

    /// Records in ascending identifier order
    async fn list(&self, skip: u64, limit: u64) -> Result<Vec<Phrase>>;

    async fn find(&self, id: i64) -> Result<Option<Phrase>>;

    /// Merge supplied attributes; returns the number of records modified
    async fn update(&self, id: i64, patch: &PhrasePatch) -> Result<u64>;

    /// Returns the number of records removed
    async fn delete(&self, id: i64) -> Result<u64>;

    async fn ping(&self) -> Result<()>;
}

/// Database connection pool wrapper
#[derive(Clone)]
pub struct DbPool {
    conn: DatabaseConnection,
}

impl DbPool {
    /// Create a new database pool from configuration
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        info!("Connecting to database...");

        let mut opts = ConnectOptions::new(&config.url);
        opts.max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .sqlx_logging(true);

        let conn = Database::connect(opts)
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Failed to connect: {}", e),
            })?;

        info!("Database connection established");

        Ok(Self { conn })
    }

    /// Get the shared connection
    pub fn conn(&self) -> &DatabaseConnection {
        &self.conn
    }

    /// Ping the database to check connectivity
    pub async fn ping(&self) -> Result<()> {
        use sea_orm::ConnectionTrait;

        self.conn
            .execute_unprepared("SELECT 1")
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Ping failed: {}", e),
            })?;

        Ok(())
    }
}

/// Open the store named by `config.url`
pub async fn connect(config: &DatabaseConfig) -> Result<Arc<dyn PhraseStore>> {
    if config.url.starts_with(MEMORY_SCHEME) {
        info!("Using in-process phrase store");
        return Ok(Arc::new(MemoryStore::new()));
    }

    let repo = Repository::new(DbPool::new(config).await?);
    repo.ensure_schema().await?;
    Ok(Arc::new(repo))
}
