//! ABOUTME: SqliteMemoryStore - the process-wide persistent KV table
//! ABOUTME: backing `memory(key PK, value TEXT, created_at, updated_at)`

use crate::backend::SqliteBackend;
use crate::codec;
use async_trait::async_trait;
use chrono::Utc;
use graphflow_core::error::{resource_error, Result};
use graphflow_core::traits::storage::MemoryStore;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;

pub struct SqliteMemoryStore {
    backend: Arc<SqliteBackend>,
    lock: RwLock<()>,
}

impl SqliteMemoryStore {
    pub async fn open(backend: Arc<SqliteBackend>) -> Result<Self> {
        let conn = backend.connect()?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS memory (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            (),
        )
        .await
        .map_err(|e| resource_error(format!("failed to create memory table: {e}")))?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_memory_updated_at ON memory (updated_at)",
            (),
        )
        .await
        .map_err(|e| resource_error(format!("failed to create memory index: {e}")))?;

        Ok(Self {
            backend,
            lock: RwLock::new(()),
        })
    }
}

#[async_trait]
impl MemoryStore for SqliteMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let _guard = self.lock.read().await;
        let conn = self.backend.connect()?;
        let mut rows = conn
            .query("SELECT value FROM memory WHERE key = ?1", [key])
            .await
            .map_err(|e| resource_error(format!("memory get failed: {e}")))?;
        match rows
            .next()
            .await
            .map_err(|e| resource_error(format!("memory get failed: {e}")))?
        {
            Some(row) => {
                let raw: String = row
                    .get(0)
                    .map_err(|e| resource_error(format!("memory get failed: {e}")))?;
                Ok(Some(codec::decode(&raw)))
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        let _guard = self.lock.write().await;
        let conn = self.backend.connect()?;
        let now = Utc::now().to_rfc3339();
        let encoded = codec::encode(&value);
        conn.execute(
            "INSERT INTO memory (key, value, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            libsql::params![key, encoded, now],
        )
        .await
        .map_err(|e| resource_error(format!("memory set failed: {e}")))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let _guard = self.lock.write().await;
        let conn = self.backend.connect()?;
        let affected = conn
            .execute("DELETE FROM memory WHERE key = ?1", [key])
            .await
            .map_err(|e| resource_error(format!("memory delete failed: {e}")))?;
        Ok(affected > 0)
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SqliteConfig;
    use serde_json::json;

    async fn store() -> SqliteMemoryStore {
        let backend = Arc::new(SqliteBackend::open(&SqliteConfig::new(":memory:")).await.unwrap());
        SqliteMemoryStore::open(backend).await.unwrap()
    }

    #[tokio::test]
    async fn set_then_get_round_trips_json_equal_value() {
        let store = store().await;
        store.set("k", json!({"a": 1, "b": ["x", "y"]})).await.unwrap();
        let got = store.get("k").await.unwrap().unwrap();
        assert_eq!(got, json!({"a": 1, "b": ["x", "y"]}));
    }

    #[tokio::test]
    async fn missing_key_is_none() {
        let store = store().await;
        assert_eq!(store.get("nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn set_overwrites_existing_key() {
        let store = store().await;
        store.set("k", json!(1)).await.unwrap();
        store.set("k", json!(2)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(json!(2)));
    }

    #[tokio::test]
    async fn delete_reports_whether_a_row_was_removed() {
        let store = store().await;
        store.set("k", json!(1)).await.unwrap();
        assert!(store.delete("k").await.unwrap());
        assert!(!store.delete("k").await.unwrap());
        assert_eq!(store.get("k").await.unwrap(), None);
    }
}
