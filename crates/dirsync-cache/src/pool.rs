//! Database connection pool management
//!
//! Wraps SQLx's `SqlitePool`. File databases get their parent directory
//! created, run in WAL mode and are migrated on open. The in-memory variant
//! is used by tests.

use std::path::Path;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

use crate::{CacheError, SqliteConfigStore, SqliteIdentityMapper};

/// Schema applied on every open; statements are idempotent
const INITIAL_MIGRATION: &str = include_str!("migrations/20260301_initial.sql");

/// Pool of SQLite connections shared by the store adapters
///
/// File databases allow 4 connections with a 5-second busy timeout. The
/// in-memory database is limited to one connection because every SQLite
/// in-memory connection is its own database.
#[derive(Clone)]
pub struct DatabasePool {
    pool: SqlitePool,
}

impl DatabasePool {
    /// Opens (creating if needed) the database at `db_path`
    ///
    /// # Errors
    ///
    /// Returns `CacheError::ConnectionFailed` if the directory or the
    /// connection cannot be created, `CacheError::MigrationFailed` if the
    /// schema cannot be applied.
    pub async fn new(db_path: &Path) -> Result<Self, CacheError> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                CacheError::ConnectionFailed(format!(
                    "Failed to create database directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| {
                CacheError::ConnectionFailed(format!(
                    "Failed to open database at {}: {}",
                    db_path.display(),
                    e
                ))
            })?;

        Self::migrate(&pool).await?;

        tracing::info!(path = %db_path.display(), "Database opened");

        Ok(Self { pool })
    }

    /// Creates a migrated in-memory database
    ///
    /// # Errors
    ///
    /// Same as [`DatabasePool::new`].
    pub async fn in_memory() -> Result<Self, CacheError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| {
                CacheError::ConnectionFailed(format!("Failed to create in-memory database: {}", e))
            })?;

        Self::migrate(&pool).await?;

        tracing::debug!("In-memory database initialized");

        Ok(Self { pool })
    }

    /// Returns a reference to the underlying SQLite connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Key/value store adapter over this pool
    pub fn config_store(&self) -> SqliteConfigStore {
        SqliteConfigStore::new(self.pool.clone())
    }

    /// Identity store adapter over this pool
    pub fn identity_mapper(&self) -> SqliteIdentityMapper {
        SqliteIdentityMapper::new(self.pool.clone())
    }

    /// Waits for open connections to finish and closes the pool
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn migrate(pool: &SqlitePool) -> Result<(), CacheError> {
        sqlx::raw_sql(INITIAL_MIGRATION)
            .execute(pool)
            .await
            .map_err(|e| {
                CacheError::MigrationFailed(format!("Failed to apply initial schema: {}", e))
            })?;

        tracing::debug!("Database schema up to date");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_database_is_created_with_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.db");

        let db = DatabasePool::new(&path).await.unwrap();
        assert!(path.exists());

        let tables: Vec<String> =
            sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
                .fetch_all(db.pool())
                .await
                .unwrap();
        assert!(tables.contains(&"app_config".to_string()));
        assert!(tables.contains(&"ldap_user_mapping".to_string()));
        db.close().await;
    }

    #[tokio::test]
    async fn test_reopen_keeps_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.db");

        let db = DatabasePool::new(&path).await.unwrap();
        sqlx::query("INSERT INTO app_config (namespace, config_key, config_value) VALUES ('a', 'b', 'c')")
            .execute(db.pool())
            .await
            .unwrap();
        db.close().await;

        let db = DatabasePool::new(&path).await.unwrap();
        let value: String = sqlx::query_scalar("SELECT config_value FROM app_config")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(value, "c");
    }
}
