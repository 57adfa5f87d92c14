//! ABOUTME: Data model module - re-exports the workflow/resource/expression types

pub mod detect;
pub mod expression;
pub mod ids;
pub mod request;
pub mod resource;
pub mod workflow;

pub use detect::detect;
pub use expression::{Expression, ExpressionKind};
pub use ids::ActionId;
pub use request::RequestContext;
pub use resource::{
    ApiResponseConfig, ApiResponseMeta, BotReplyConfig, ExecConfig, HttpConfig, LlmConfig,
    OnError, OnErrorAction, PreflightCheck, PreflightError, PythonConfig, Resource,
    ResourceKind, ResourceMetadata, RunConfig, SqlConfig, TtsConfig,
};
pub use workflow::{AgentSettings, Settings, Workflow, WorkflowMetadata};
