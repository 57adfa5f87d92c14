//! ABOUTME: Executor trait implemented by each resource-kind strategy
//! ABOUTME: and the process-wide registry mapping kind -> Executor

use crate::error::Result;
use crate::execution_context::ExecutionContext;
use crate::types::ResourceKind;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// One resource kind's execution strategy.
///
/// Implementations assert their expected `ResourceKind` variant and return
/// `BadRequest` on mismatch rather than panicking; the registry is the only
/// place kind dispatch happens; executors do not need to know about one
/// another.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, ctx: &ExecutionContext, kind: &ResourceKind) -> Result<Value>;

    /// The label this executor serves, matching `ResourceKind::label()`.
    fn kind_label(&self) -> &'static str;
}

/// Process-wide mapping of resource kind label -> executor strategy.
///
/// `NewRegistry` starts empty; individual `set_*` style setters install
/// executors by label so call sites can register only the kinds they
/// support (useful for tests that only care about one executor).
#[derive(Clone, Default)]
pub struct ExecutorRegistry {
    executors: HashMap<&'static str, Arc<dyn Executor>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self {
            executors: HashMap::new(),
        }
    }

    pub fn register(&mut self, executor: Arc<dyn Executor>) {
        self.executors.insert(executor.kind_label(), executor);
    }

    pub fn get(&self, label: &str) -> Option<Arc<dyn Executor>> {
        self.executors.get(label).cloned()
    }
}
