//! ABOUTME: Resource, RunConfig and the eight resource-kind configs
//! ABOUTME: plus the PreflightCheck / OnError policy shared by every resource

use super::expression::Expression;
use super::ids::ActionId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Metadata every resource carries: its identity and declared dependencies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceMetadata {
    pub action_id: ActionId,
    pub name: String,
    #[serde(default)]
    pub requires: HashSet<ActionId>,
}

/// One node of the workflow DAG: identity plus its run configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    pub metadata: ResourceMetadata,
    pub run: RunConfig,
}

impl Resource {
    pub fn action_id(&self) -> &ActionId {
        &self.metadata.action_id
    }
}

/// The per-resource "kind" discriminant, carrying its configuration and
/// the cross-cutting preflight/on-error policy. Exactly one field of
/// `RunConfig` names the resource kind; the executor registry dispatches
/// on whichever variant `kind` holds rather than on a class hierarchy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(flatten)]
    pub kind: ResourceKind,
    #[serde(default)]
    pub skip_condition: Option<Expression>,
    #[serde(default)]
    pub preflight_check: Option<PreflightCheck>,
    #[serde(default)]
    pub on_error: Option<OnError>,
}

/// Tagged sum of the eight supported resource kinds. Each variant owns the
/// fields specific to that kind's executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ResourceKind {
    Llm(LlmConfig),
    #[serde(rename = "httpClient")]
    HttpClient(HttpConfig),
    Sql(SqlConfig),
    Python(PythonConfig),
    Exec(ExecConfig),
    Tts(TtsConfig),
    BotReply(BotReplyConfig),
    ApiResponse(ApiResponseConfig),
}

impl ResourceKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Llm(_) => "llm",
            Self::HttpClient(_) => "httpClient",
            Self::Sql(_) => "sql",
            Self::Python(_) => "python",
            Self::Exec(_) => "exec",
            Self::Tts(_) => "tts",
            Self::BotReply(_) => "botReply",
            Self::ApiResponse(_) => "apiResponse",
        }
    }
}

/// Boolean validations that must all pass before a resource's body runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreflightCheck {
    pub validations: Vec<Expression>,
    pub error: PreflightError,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreflightError {
    pub code: String,
    pub message: Expression,
}

/// Per-resource error handling policy, applied after the executor fails.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnError {
    pub action: OnErrorAction,
    #[serde(default)]
    pub max_retries: Option<u32>,
    #[serde(default)]
    pub retry_delay: Option<Expression>,
    #[serde(default)]
    pub fallback: Option<serde_json::Value>,
    #[serde(default)]
    pub expr: Vec<Expression>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnErrorAction {
    Continue,
    Retry,
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub prompt: Expression,
    #[serde(default)]
    pub model: Option<Expression>,
    #[serde(default)]
    pub system_prompt: Option<Expression>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub method: Expression,
    pub url: Expression,
    #[serde(default)]
    pub headers: BTreeMap<String, Expression>,
    #[serde(default)]
    pub body: Option<Expression>,
    #[serde(default)]
    pub timeout: Option<Expression>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqlConfig {
    pub driver: String,
    pub dsn: Expression,
    pub statement: Expression,
    #[serde(default)]
    pub params: Vec<Expression>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PythonConfig {
    #[serde(default)]
    pub script: Option<Expression>,
    #[serde(default)]
    pub file: Option<Expression>,
    #[serde(default = "default_python_version")]
    pub python_version: String,
    #[serde(default)]
    pub packages: Vec<String>,
    #[serde(default)]
    pub requirements_file: Option<String>,
    #[serde(default)]
    pub venv_name: Option<String>,
    #[serde(default)]
    pub timeout_duration: Option<Expression>,
}

fn default_python_version() -> String {
    "3".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecConfig {
    pub command: Expression,
    #[serde(default)]
    pub args: Option<Vec<Expression>>,
    #[serde(default)]
    pub env: BTreeMap<String, Expression>,
    #[serde(default)]
    pub timeout_duration: Option<Expression>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsConfig {
    pub text: Expression,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub voice: Option<Expression>,
    #[serde(default)]
    pub output_file: Option<Expression>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotReplyConfig {
    pub text: Expression,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponseConfig {
    pub response: serde_json::Value,
    #[serde(default)]
    pub meta: Option<ApiResponseMeta>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiResponseMeta {
    #[serde(default)]
    pub model: Option<Expression>,
    #[serde(default)]
    pub backend: Option<Expression>,
    #[serde(default)]
    pub headers: BTreeMap<String, Expression>,
}
