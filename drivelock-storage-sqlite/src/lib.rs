//! SQLite backend for the drivelock security store.
//!
//! Documents live in a single `kv_store` table keyed by the document name. Call
//! [`SqliteStorage::migrate`] once before handing the storage to a
//! [`SecurityStore`](drivelock_core::SecurityStore).
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use drivelock_core::{SecurityConfig, SecurityStore};
//! use drivelock_storage_sqlite::SqliteStorage;
//!
//! let storage = SqliteStorage::connect("sqlite://drivelock.db?mode=rwc").await?;
//! storage.migrate().await?;
//!
//! let store = SecurityStore::new(Arc::new(storage), SecurityConfig::default());
//! store.load().await;
//! ```

use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use drivelock_core::{
    Error, KeyValueStore,
    error::{StorageError, utilities::DatabaseResultExt},
};
use sqlx::{
    Row, SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};

pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open a pool for `url`, creating the database file if needed.
    ///
    /// In-memory databases get a single connection so every query sees the same database.
    pub async fn connect(url: &str) -> Result<Self, Error> {
        let options = SqliteConnectOptions::from_str(url)
            .map_db_err_with_context("Invalid SQLite URL")?
            .create_if_missing(true);

        let max_connections = if url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to open SQLite database");
                StorageError::Database("Failed to open SQLite database".to_string())
            })?;

        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create the `kv_store` table if it does not exist.
    pub async fn migrate(&self) -> Result<(), Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS kv_store (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL DEFAULT (unixepoch())
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to create kv_store table");
            StorageError::Migration("Failed to create kv_store table".to_string())
        })?;

        Ok(())
    }

    pub async fn health_check(&self) -> Result<(), Error> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_db_err()?;
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for SqliteStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        let row = sqlx::query("SELECT value FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(key, error = %e, "Failed to read key");
                StorageError::Database("Failed to read key".to_string())
            })?;

        Ok(row.map(|row| row.get("value")))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO kv_store (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(key, error = %e, "Failed to write key");
            StorageError::Database("Failed to write key".to_string())
        })?;

        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), Error> {
        sqlx::query("DELETE FROM kv_store WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_db_err_with_context("Failed to remove key")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup_test_storage() -> SqliteStorage {
        let storage = SqliteStorage::connect("sqlite::memory:")
            .await
            .expect("Failed to create pool");
        storage.migrate().await.expect("Failed to run migrations");
        storage
    }

    #[tokio::test]
    async fn test_get_missing_key() {
        let storage = setup_test_storage().await;
        assert_eq!(storage.get("loginAttempts").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_overwrites() {
        let storage = setup_test_storage().await;
        storage.set("accountLockouts", "{}").await.unwrap();
        storage
            .set("accountLockouts", r#"{"version":1,"data":{}}"#)
            .await
            .unwrap();

        assert_eq!(
            storage.get("accountLockouts").await.unwrap().as_deref(),
            Some(r#"{"version":1,"data":{}}"#)
        );

        let count: i64 = sqlx::query("SELECT COUNT(*) AS count FROM kv_store")
            .fetch_one(storage.pool())
            .await
            .unwrap()
            .get("count");
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_remove() {
        let storage = setup_test_storage().await;
        storage.set("passwordHistory", "{}").await.unwrap();
        storage.remove("passwordHistory").await.unwrap();
        assert_eq!(storage.get("passwordHistory").await.unwrap(), None);

        // Removing a missing key is not an error
        storage.remove("passwordHistory").await.unwrap();
    }

    #[tokio::test]
    async fn test_migrate_is_idempotent() {
        let storage = setup_test_storage().await;
        storage.migrate().await.unwrap();
        storage.health_check().await.unwrap();
    }

    #[tokio::test]
    async fn test_queries_before_migrate_fail() {
        let storage = SqliteStorage::connect("sqlite::memory:").await.unwrap();
        let err = storage.get("loginAttempts").await.unwrap_err();
        assert!(err.is_storage_error());
    }
}
