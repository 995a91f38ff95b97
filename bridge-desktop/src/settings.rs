//! Settings Storage using SQLite
//!
//! Values are stored as JSON text so a key written as a bool reads back as a
//! bool, and a type mismatch is reported instead of silently coerced.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::SettingsStore,
};
use serde_json::Value;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions},
    Row,
};
use std::path::PathBuf;
use tracing::{debug, warn};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS settings (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        updated_at INTEGER NOT NULL
    )
"#;

fn db_error(context: &str, err: sqlx::Error) -> BridgeError {
    BridgeError::OperationFailed(format!("{}: {}", context, err))
}

/// SQLite-backed settings store
pub struct SqliteSettingsStore {
    pool: SqlitePool,
}

impl SqliteSettingsStore {
    /// Open (creating if needed) the settings database at `db_path`
    pub async fn open(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(BridgeError::Io)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(2)
            .connect_with(options)
            .await
            .map_err(|e| db_error("Failed to open settings database", e))?;

        let store = Self { pool };
        store.migrate().await?;
        debug!(path = ?db_path, "Opened settings store");
        Ok(store)
    }

    /// In-memory store. A single connection keeps every query on the same database.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| db_error("Failed to open in-memory settings", e))?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Failed to create settings table", e))?;
        Ok(())
    }

    async fn put(&self, key: &str, value: Value) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO settings (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value.to_string())
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to store setting", e))?;

        debug!(key, "Stored setting");
        Ok(())
    }

    async fn fetch(&self, key: &str) -> Result<Option<Value>> {
        let row = sqlx::query("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to read setting", e))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let raw: String = row.get(0);
        serde_json::from_str(&raw).map(Some).map_err(|e| {
            warn!(key, error = %e, "Corrupt setting value");
            BridgeError::OperationFailed(format!("Corrupt value for {}: {}", key, e))
        })
    }

    fn mismatch(key: &str, expected: &str, found: &Value) -> BridgeError {
        BridgeError::OperationFailed(format!(
            "Type mismatch for {}: expected {}, found {}",
            key, expected, found
        ))
    }
}

#[async_trait]
impl SettingsStore for SqliteSettingsStore {
    async fn set_string(&self, key: &str, value: &str) -> Result<()> {
        self.put(key, Value::from(value)).await
    }

    async fn get_string(&self, key: &str) -> Result<Option<String>> {
        match self.fetch(key).await? {
            Some(Value::String(value)) => Ok(Some(value)),
            Some(other) => Err(Self::mismatch(key, "string", &other)),
            None => Ok(None),
        }
    }

    async fn set_bool(&self, key: &str, value: bool) -> Result<()> {
        self.put(key, Value::from(value)).await
    }

    async fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        match self.fetch(key).await? {
            Some(Value::Bool(value)) => Ok(Some(value)),
            Some(other) => Err(Self::mismatch(key, "bool", &other)),
            None => Ok(None),
        }
    }

    async fn set_i64(&self, key: &str, value: i64) -> Result<()> {
        self.put(key, Value::from(value)).await
    }

    async fn get_i64(&self, key: &str) -> Result<Option<i64>> {
        match self.fetch(key).await? {
            Some(value) => value
                .as_i64()
                .map(Some)
                .ok_or_else(|| Self::mismatch(key, "i64", &value)),
            None => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM settings WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Failed to delete setting", e))?;
        Ok(())
    }

    async fn has_key(&self, key: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to check key", e))?;
        Ok(row.is_some())
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT key FROM settings ORDER BY key")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("Failed to list keys", e))?;
        Ok(rows.into_iter().map(|row| row.get(0)).collect())
    }

    async fn clear_all(&self) -> Result<()> {
        sqlx::query("DELETE FROM settings")
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Failed to clear settings", e))?;
        debug!("Cleared all settings");
        Ok(())
    }
}
