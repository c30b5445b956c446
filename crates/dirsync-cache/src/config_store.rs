//! SQLite implementation of IConfigStore
//!
//! All values live in the single `app_config` table keyed by
//! `(namespace, config_key)`. Values are opaque strings; typing happens in
//! the callers.

use sqlx::SqlitePool;

use dirsync_core::ports::IConfigStore;

/// SQLite-backed namespaced key/value store
#[derive(Clone)]
pub struct SqliteConfigStore {
    pool: SqlitePool,
}

impl SqliteConfigStore {
    /// Creates a new store over the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

const UPSERT_VALUE: &str = "INSERT INTO app_config (namespace, config_key, config_value) \
     VALUES (?, ?, ?) \
     ON CONFLICT (namespace, config_key) DO UPDATE SET config_value = excluded.config_value";

#[async_trait::async_trait]
impl IConfigStore for SqliteConfigStore {
    async fn get_value(&self, namespace: &str, key: &str) -> anyhow::Result<Option<String>> {
        let value: Option<String> = sqlx::query_scalar(
            "SELECT config_value FROM app_config WHERE namespace = ? AND config_key = ?",
        )
        .bind(namespace)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(value)
    }

    async fn set_value(&self, namespace: &str, key: &str, value: &str) -> anyhow::Result<()> {
        sqlx::query(UPSERT_VALUE)
            .bind(namespace)
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await?;

        tracing::trace!(namespace, key, "Stored value");
        Ok(())
    }

    async fn set_values(&self, namespace: &str, values: &[(&str, String)]) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;

        for (key, value) in values {
            sqlx::query(UPSERT_VALUE)
                .bind(namespace)
                .bind(*key)
                .bind(value)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        tracing::trace!(namespace, count = values.len(), "Stored value batch");
        Ok(())
    }

    async fn delete_value(&self, namespace: &str, key: &str) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM app_config WHERE namespace = ? AND config_key = ?")
            .bind(namespace)
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn list_keys(&self, namespace: &str) -> anyhow::Result<Vec<String>> {
        let keys: Vec<String> = sqlx::query_scalar(
            "SELECT config_key FROM app_config WHERE namespace = ? ORDER BY config_key ASC",
        )
        .bind(namespace)
        .fetch_all(&self.pool)
        .await?;

        Ok(keys)
    }

    async fn list_keys_containing(
        &self,
        namespace: &str,
        fragment: &str,
    ) -> anyhow::Result<Vec<String>> {
        // instr() instead of LIKE: '_' in setting names is a LIKE wildcard
        let keys: Vec<String> = sqlx::query_scalar(
            "SELECT config_key FROM app_config \
             WHERE namespace = ? AND instr(config_key, ?) > 0 \
             ORDER BY config_key ASC",
        )
        .bind(namespace)
        .bind(fragment)
        .fetch_all(&self.pool)
        .await?;

        Ok(keys)
    }
}
