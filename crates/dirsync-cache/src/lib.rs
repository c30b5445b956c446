//! dirsync Cache - Local persistence
//!
//! SQLite-based storage for:
//! - Namespaced settings and scheduler state (profile settings, current
//!   profile, offset, interval)
//! - The directory-to-local identity mapping
//!
//! ## Architecture
//!
//! This crate implements the `IConfigStore` and `IIdentityMapper` ports from
//! `dirsync-core` using SQLite as the storage backend. It is a driven
//! (secondary) adapter in the hexagonal architecture.
//!
//! ## Key Components
//!
//! - [`DatabasePool`] - Connection pool with migration support
//! - [`SqliteConfigStore`] - `IConfigStore` implementation
//! - [`SqliteIdentityMapper`] - `IIdentityMapper` implementation
//! - [`CacheError`] - Error types for pool setup
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::Path;
//! use dirsync_cache::DatabasePool;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let db = DatabasePool::new(Path::new("/var/lib/dirsync/dirsync.db")).await?;
//! let store = db.config_store();
//! let mapper = db.identity_mapper();
//! # Ok(())
//! # }
//! ```

pub mod config_store;
pub mod identity_store;
pub mod pool;

pub use config_store::SqliteConfigStore;
pub use identity_store::{ProfileMappingCount, SqliteIdentityMapper};
pub use pool::DatabasePool;

/// Errors that can occur while opening the database
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Failed to establish a database connection
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A database query failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Schema migration failed
    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}

impl From<sqlx::Error> for CacheError {
    fn from(e: sqlx::Error) -> Self {
        CacheError::QueryFailed(e.to_string())
    }
}
