//! ABOUTME: Thin wrapper around a libsql database file
//! ABOUTME: Both MemoryStore and SessionStore open connections through this

use graphflow_core::error::{resource_error, Result};
use libsql::{Builder, Connection, Database};

/// Where a `SqliteBackend` persists its file. `:memory:` is accepted for
/// ephemeral, single-process runs (tests, `GRAPHFLOW_MEMORY_DB_PATH=:memory:`).
pub struct SqliteConfig {
    pub path: String,
}

impl SqliteConfig {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

/// Owns the underlying `libsql::Database`. `connect()` hands out a fresh,
/// cheap `Connection` per call - libsql connections are lightweight
/// handles onto the same file, not pooled sockets.
pub struct SqliteBackend {
    db: Database,
}

impl SqliteBackend {
    pub async fn open(config: &SqliteConfig) -> Result<Self> {
        let db = Builder::new_local(&config.path)
            .build()
            .await
            .map_err(|e| resource_error(format!("failed to open sqlite db at {}: {e}", config.path)))?;
        Ok(Self { db })
    }

    pub fn connect(&self) -> Result<Connection> {
        self.db
            .connect()
            .map_err(|e| resource_error(format!("failed to open sqlite connection: {e}")))
    }
}
