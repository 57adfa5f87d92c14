//! ABOUTME: SQLite-backed MemoryStore and SessionStore implementations
//! ABOUTME: Single embedded database file, async via libsql

pub mod backend;
mod codec;
pub mod memory;
pub mod session;

pub use backend::{SqliteBackend, SqliteConfig};
pub use memory::SqliteMemoryStore;
pub use session::{spawn_sweeper, SqliteSessionStore};
