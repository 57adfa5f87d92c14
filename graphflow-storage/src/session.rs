//! ABOUTME: SqliteSessionStore - per-session KV with TTL, touch-on-access
//! ABOUTME: and the background sweeper that reaps expired/orphaned rows

use crate::backend::SqliteBackend;
use crate::codec;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use graphflow_core::error::{resource_error, Result};
use graphflow_core::traits::storage::SessionStore;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

const SWEEP_INTERVAL: StdDuration = StdDuration::from_secs(5 * 60);
const ORPHAN_MAX_AGE: Duration = Duration::hours(24);

pub struct SqliteSessionStore {
    backend: Arc<SqliteBackend>,
    session_id: String,
    default_ttl: Option<Duration>,
    lock: RwLock<()>,
}

impl SqliteSessionStore {
    pub async fn open(
        backend: Arc<SqliteBackend>,
        session_id: impl Into<String>,
        default_ttl: Option<Duration>,
    ) -> Result<Self> {
        ensure_schema(&backend).await?;
        Ok(Self {
            backend,
            session_id: session_id.into(),
            default_ttl,
            lock: RwLock::new(()),
        })
    }

    async fn upsert(&self, key: &str, value: &Value, expires_at: Option<DateTime<Utc>>) -> Result<()> {
        let conn = self.backend.connect()?;
        let now = Utc::now().to_rfc3339();
        let encoded = codec::encode(value);
        let expires = expires_at.map(|d| d.to_rfc3339());
        conn.execute(
            "INSERT INTO sessions (session_id, key, value, created_at, accessed_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?4, ?5)
             ON CONFLICT(session_id, key) DO UPDATE SET
                value = excluded.value,
                accessed_at = excluded.accessed_at,
                expires_at = excluded.expires_at",
            libsql::params![self.session_id.as_str(), key, encoded, now, expires],
        )
        .await
        .map_err(|e| resource_error(format!("session set failed: {e}")))?;
        Ok(())
    }

    async fn extend_expiry(&self, key: &str, ttl: Duration) -> Result<()> {
        let conn = self.backend.connect()?;
        let accessed = Utc::now();
        let expires = (accessed + ttl).to_rfc3339();
        conn.execute(
            "UPDATE sessions SET accessed_at = ?1, expires_at = ?2 WHERE session_id = ?3 AND key = ?4",
            libsql::params![accessed.to_rfc3339(), expires, self.session_id.as_str(), key],
        )
        .await
        .map_err(|e| resource_error(format!("session touch failed: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    fn session_id(&self) -> &str {
        &self.session_id
    }

    fn default_ttl(&self) -> Option<Duration> {
        self.default_ttl
    }

    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let value = {
            let _guard = self.lock.read().await;
            let conn = self.backend.connect()?;
            let now = Utc::now().to_rfc3339();
            let mut rows = conn
                .query(
                    "SELECT value FROM sessions WHERE session_id = ?1 AND key = ?2
                     AND (expires_at IS NULL OR expires_at > ?3)",
                    libsql::params![self.session_id.as_str(), key, now],
                )
                .await
                .map_err(|e| resource_error(format!("session get failed: {e}")))?;
            match rows
                .next()
                .await
                .map_err(|e| resource_error(format!("session get failed: {e}")))?
            {
                Some(row) => {
                    let raw: String = row
                        .get(0)
                        .map_err(|e| resource_error(format!("session get failed: {e}")))?;
                    Some(codec::decode(&raw))
                }
                None => None,
            }
        };
        // Read lock released above; touch-on-access takes the write path separately
        // to avoid the read-then-write deadlock the sweeper/touch path must avoid.
        if value.is_some() {
            if let Some(ttl) = self.default_ttl {
                if ttl > Duration::zero() {
                    let _guard = self.lock.write().await;
                    self.extend_expiry(key, ttl).await?;
                }
            }
        }
        Ok(value)
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        let _guard = self.lock.write().await;
        let expires_at = self.default_ttl.map(|ttl| Utc::now() + ttl);
        self.upsert(key, &value, expires_at).await
    }

    async fn set_with_ttl(&self, key: &str, value: Value, ttl: Duration) -> Result<()> {
        let _guard = self.lock.write().await;
        self.upsert(key, &value, Some(Utc::now() + ttl)).await
    }

    async fn touch(&self, key: &str) -> Result<()> {
        let Some(ttl) = self.default_ttl else {
            return Ok(());
        };
        let _guard = self.lock.write().await;
        self.extend_expiry(key, ttl).await
    }

    async fn touch_with_ttl(&self, key: &str, ttl: Duration) -> Result<()> {
        let _guard = self.lock.write().await;
        self.extend_expiry(key, ttl).await
    }

    async fn is_expired(&self, key: &str) -> Result<bool> {
        let _guard = self.lock.read().await;
        let conn = self.backend.connect()?;
        let mut rows = conn
            .query(
                "SELECT expires_at FROM sessions WHERE session_id = ?1 AND key = ?2",
                libsql::params![self.session_id.as_str(), key],
            )
            .await
            .map_err(|e| resource_error(format!("session is_expired failed: {e}")))?;
        match rows
            .next()
            .await
            .map_err(|e| resource_error(format!("session is_expired failed: {e}")))?
        {
            None => Ok(true),
            Some(row) => {
                let expires_at: Option<String> = row
                    .get(0)
                    .map_err(|e| resource_error(format!("session is_expired failed: {e}")))?;
                match expires_at {
                    None => Ok(false),
                    Some(raw) => {
                        let parsed: DateTime<Utc> = raw
                            .parse::<DateTime<Utc>>()
                            .map_err(|e| resource_error(format!("bad expires_at value: {e}")))?;
                        Ok(parsed <= Utc::now())
                    }
                }
            }
        }
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let _guard = self.lock.write().await;
        let conn = self.backend.connect()?;
        let affected = conn
            .execute(
                "DELETE FROM sessions WHERE session_id = ?1 AND key = ?2",
                libsql::params![self.session_id.as_str(), key],
            )
            .await
            .map_err(|e| resource_error(format!("session delete failed: {e}")))?;
        Ok(affected > 0)
    }

    async fn clear(&self) -> Result<()> {
        let _guard = self.lock.write().await;
        let conn = self.backend.connect()?;
        conn.execute(
            "DELETE FROM sessions WHERE session_id = ?1",
            [self.session_id.as_str()],
        )
        .await
        .map_err(|e| resource_error(format!("session clear failed: {e}")))?;
        Ok(())
    }

    async fn get_all(&self) -> Result<HashMap<String, Value>> {
        let _guard = self.lock.read().await;
        let conn = self.backend.connect()?;
        let now = Utc::now().to_rfc3339();
        let mut rows = conn
            .query(
                "SELECT key, value FROM sessions WHERE session_id = ?1
                 AND (expires_at IS NULL OR expires_at > ?2)",
                libsql::params![self.session_id.as_str(), now],
            )
            .await
            .map_err(|e| resource_error(format!("session get_all failed: {e}")))?;
        let mut out = HashMap::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| resource_error(format!("session get_all failed: {e}")))?
        {
            let key: String = row
                .get(0)
                .map_err(|e| resource_error(format!("session get_all failed: {e}")))?;
            let raw: String = row
                .get(1)
                .map_err(|e| resource_error(format!("session get_all failed: {e}")))?;
            out.insert(key, codec::decode(&raw));
        }
        Ok(out)
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

async fn ensure_schema(backend: &SqliteBackend) -> Result<()> {
    let conn = backend.connect()?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS sessions (
            session_id TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            created_at TEXT NOT NULL,
            accessed_at TEXT NOT NULL,
            expires_at TEXT,
            PRIMARY KEY (session_id, key)
        )",
        (),
    )
    .await
    .map_err(|e| resource_error(format!("failed to create sessions table: {e}")))?;

    migrate_legacy_columns(&conn).await?;

    for (name, sql) in [
        (
            "idx_sessions_session_id",
            "CREATE INDEX IF NOT EXISTS idx_sessions_session_id ON sessions (session_id)",
        ),
        (
            "idx_sessions_expires_at",
            "CREATE INDEX IF NOT EXISTS idx_sessions_expires_at ON sessions (expires_at)",
        ),
        (
            "idx_sessions_created_at",
            "CREATE INDEX IF NOT EXISTS idx_sessions_created_at ON sessions (created_at)",
        ),
    ] {
        conn.execute(sql, ())
            .await
            .map_err(|e| resource_error(format!("failed to create index {name}: {e}")))?;
    }
    Ok(())
}

/// Adds `accessed_at`/`expires_at` to a `sessions` table created by an
/// older schema version, back-filling `accessed_at` from `created_at`.
async fn migrate_legacy_columns(conn: &libsql::Connection) -> Result<()> {
    let mut rows = conn
        .query("PRAGMA table_info(sessions)", ())
        .await
        .map_err(|e| resource_error(format!("schema introspection failed: {e}")))?;
    let mut has_accessed_at = false;
    let mut has_expires_at = false;
    while let Some(row) = rows
        .next()
        .await
        .map_err(|e| resource_error(format!("schema introspection failed: {e}")))?
    {
        let column: String = row
            .get(1)
            .map_err(|e| resource_error(format!("schema introspection failed: {e}")))?;
        match column.as_str() {
            "accessed_at" => has_accessed_at = true,
            "expires_at" => has_expires_at = true,
            _ => {}
        }
    }

    if !has_accessed_at {
        conn.execute("ALTER TABLE sessions ADD COLUMN accessed_at TEXT", ())
            .await
            .map_err(|e| resource_error(format!("failed to add accessed_at column: {e}")))?;
        conn.execute(
            "UPDATE sessions SET accessed_at = created_at WHERE accessed_at IS NULL",
            (),
        )
        .await
        .map_err(|e| resource_error(format!("failed to back-fill accessed_at: {e}")))?;
    }
    if !has_expires_at {
        conn.execute("ALTER TABLE sessions ADD COLUMN expires_at TEXT", ())
            .await
            .map_err(|e| resource_error(format!("failed to add expires_at column: {e}")))?;
    }
    Ok(())
}

/// Spawns the background sweeper: every five minutes, deletes rows that
/// are either past their `expires_at` or have no `expires_at` and have
/// sat unread for more than 24 hours.
pub fn spawn_sweeper(backend: Arc<SqliteBackend>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            if let Err(err) = sweep_once(&backend).await {
                tracing::warn!(error = %err, "session sweep failed");
            }
        }
    })
}

async fn sweep_once(backend: &SqliteBackend) -> Result<()> {
    let conn = backend.connect()?;
    let now = Utc::now().to_rfc3339();
    let orphan_cutoff = (Utc::now() - ORPHAN_MAX_AGE).to_rfc3339();
    let deleted = conn
        .execute(
            "DELETE FROM sessions WHERE (expires_at IS NOT NULL AND expires_at <= ?1)
             OR (expires_at IS NULL AND created_at < ?2)",
            libsql::params![now, orphan_cutoff],
        )
        .await
        .map_err(|e| resource_error(format!("sweep failed: {e}")))?;
    if deleted > 0 {
        tracing::debug!(deleted, "session sweeper reaped expired rows");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SqliteConfig;
    use serde_json::json;

    async fn backend() -> Arc<SqliteBackend> {
        Arc::new(SqliteBackend::open(&SqliteConfig::new(":memory:")).await.unwrap())
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let store = SqliteSessionStore::open(backend().await, "s1", None).await.unwrap();
        store.set("k", json!("v")).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(json!("v")));
    }

    #[tokio::test]
    async fn is_expired_is_true_for_missing_keys() {
        let store = SqliteSessionStore::open(backend().await, "s1", None).await.unwrap();
        assert!(store.is_expired("nope").await.unwrap());
    }

    #[tokio::test]
    async fn ttl_expiry_makes_get_return_absent() {
        let store = SqliteSessionStore::open(backend().await, "s1", None).await.unwrap();
        store
            .set_with_ttl("k", json!(1), Duration::milliseconds(-1))
            .await
            .unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
        assert!(store.is_expired("k").await.unwrap());
    }

    #[tokio::test]
    async fn unset_ttl_never_expires() {
        let store = SqliteSessionStore::open(backend().await, "s1", None).await.unwrap();
        store.set("k", json!(1)).await.unwrap();
        assert!(!store.is_expired("k").await.unwrap());
    }

    #[tokio::test]
    async fn get_extends_expiry_when_default_ttl_set() {
        let store = SqliteSessionStore::open(backend().await, "s1", Some(Duration::seconds(60)))
            .await
            .unwrap();
        store.set("k", json!(1)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(json!(1)));
        assert!(!store.is_expired("k").await.unwrap());
    }

    #[tokio::test]
    async fn clear_removes_only_this_session() {
        let shared = backend().await;
        let a = SqliteSessionStore::open(shared.clone(), "a", None).await.unwrap();
        let b = SqliteSessionStore::open(shared.clone(), "b", None).await.unwrap();
        a.set("k", json!(1)).await.unwrap();
        b.set("k", json!(2)).await.unwrap();
        a.clear().await.unwrap();
        assert_eq!(a.get("k").await.unwrap(), None);
        assert_eq!(b.get("k").await.unwrap(), Some(json!(2)));
    }

    #[tokio::test]
    async fn get_all_excludes_expired_entries() {
        let store = SqliteSessionStore::open(backend().await, "s1", None).await.unwrap();
        store.set("fresh", json!(1)).await.unwrap();
        store
            .set_with_ttl("stale", json!(2), Duration::milliseconds(-1))
            .await
            .unwrap();
        let all = store.get_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all.get("fresh"), Some(&json!(1)));
    }
}
