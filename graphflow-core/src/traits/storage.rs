//! ABOUTME: MemoryStore and SessionStore trait abstractions
//! ABOUTME: implemented by graphflow-storage, consumed by the UnifiedApi and engine

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;

/// Process-wide persistent key/value store.
///
/// Values are JSON-encoded on write and JSON-decoded on read, falling back
/// to the raw string when decoding fails (so a plain scalar written by an
/// older schema version is never mistaken for an error). Implementations
/// must serialize concurrent access to a single operation per key.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>>;
    async fn set(&self, key: &str, value: Value) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<bool>;
    async fn close(&self) -> Result<()>;
}

/// One session-scoped entry as stored on disk.
#[derive(Debug, Clone)]
pub struct SessionEntry {
    pub value: Value,
    pub created_at: DateTime<Utc>,
    pub accessed_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Per-session key/value store with TTL-based expiration and
/// touch-on-access renewal.
///
/// `Get` (and `GetAll`) must never return an entry whose `expires_at` has
/// passed; `IsExpired` reports `true` for both expired and entirely
/// missing keys. A session's `default_ttl` (when greater than zero) is
/// re-applied to `expires_at` on every successful read.
#[async_trait]
pub trait SessionStore: Send + Sync {
    fn session_id(&self) -> &str;
    fn default_ttl(&self) -> Option<chrono::Duration>;

    async fn get(&self, key: &str) -> Result<Option<Value>>;
    async fn set(&self, key: &str, value: Value) -> Result<()>;
    async fn set_with_ttl(&self, key: &str, value: Value, ttl: chrono::Duration) -> Result<()>;
    async fn touch(&self, key: &str) -> Result<()>;
    async fn touch_with_ttl(&self, key: &str, ttl: chrono::Duration) -> Result<()>;
    async fn is_expired(&self, key: &str) -> Result<bool>;
    async fn delete(&self, key: &str) -> Result<bool>;
    async fn clear(&self) -> Result<()>;
    async fn get_all(&self) -> Result<HashMap<String, Value>>;
    async fn close(&self) -> Result<()>;
}
