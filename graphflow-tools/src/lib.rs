//! ABOUTME: Executor implementations for the eight graphflow resource kinds
//! ABOUTME: Each module asserts its ResourceKind variant and dispatches via the registry

pub mod api_response;
pub mod bot_reply;
pub mod exec;
pub mod http;
pub mod llm;
mod process;
pub mod python;
pub mod sql;
mod support;
pub mod tts;

pub use api_response::ApiResponseExecutor;
pub use bot_reply::BotReplyExecutor;
pub use exec::ExecExecutor;
pub use http::HttpExecutor;
pub use llm::LlmExecutor;
pub use python::{PythonExecutor, VenvManager};
pub use sql::SqlExecutor;
pub use tts::TtsExecutor;
