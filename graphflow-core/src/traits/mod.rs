//! ABOUTME: Trait abstractions at the seams the engine calls through

pub mod executor;
pub mod storage;

pub use executor::{Executor, ExecutorRegistry};
pub use storage::{MemoryStore, SessionEntry, SessionStore};
