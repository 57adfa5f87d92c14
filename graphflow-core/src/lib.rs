//! ABOUTME: Core data model, execution context and trait seams for graphflow
//! ABOUTME: Foundation layer shared by the expression, storage and workflow crates

pub mod error;
pub mod execution_context;
pub mod traits;
pub mod types;

pub use error::{AppError, ErrorKind, Result};
pub use execution_context::{ExecutionContext, LlmMetadata, UnifiedApi};
pub use types::{ActionId, Expression, ExpressionKind, Resource, ResourceKind, Workflow};
