//! ABOUTME: ExecutionContext and the UnifiedApi function record it wires
//! ABOUTME: into the expression evaluator for every resource in a run

use crate::error::Result;
use crate::traits::storage::{MemoryStore, SessionStore};
use crate::types::{ActionId, RequestContext, Workflow};
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub type GetFn = Arc<dyn Fn(String, Option<String>) -> BoxFuture<'static, Result<Value>> + Send + Sync>;
pub type SetFn = Arc<dyn Fn(String, Value, Option<String>) -> BoxFuture<'static, Result<bool>> + Send + Sync>;
pub type FileFn = Arc<dyn Fn(String, Vec<String>) -> BoxFuture<'static, Result<Value>> + Send + Sync>;
pub type InfoFn = Arc<dyn Fn(String) -> BoxFuture<'static, Result<Value>> + Send + Sync>;
pub type InputFn = Arc<dyn Fn(String, Option<String>) -> BoxFuture<'static, Result<Value>> + Send + Sync>;
pub type OutputFn = Arc<dyn Fn(String) -> BoxFuture<'static, Result<Value>> + Send + Sync>;
pub type SessionFn = Arc<dyn Fn() -> BoxFuture<'static, Result<Map<String, Value>>> + Send + Sync>;
pub type ItemFn = Arc<dyn Fn(Option<String>) -> BoxFuture<'static, Result<Value>> + Send + Sync>;
pub type EnvFn = Arc<dyn Fn(String) -> BoxFuture<'static, Result<String>> + Send + Sync>;
pub type BotSendFn = Arc<dyn Fn(String) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// A record of callable fields exposed to the expression evaluator.
///
/// Each field is independently optional: a headless batch run might never
/// set `input` (no `RequestContext`), a non-bot run never sets nothing here
/// (bot send lives on `ExecutionContext` directly, not the API), and a unit
/// test can supply only the one function under test. The evaluator probes
/// presence before calling through, so a missing field degrades to a typed
/// default rather than a panic.
#[derive(Clone, Default)]
pub struct UnifiedApi {
    pub get: Option<GetFn>,
    pub set: Option<SetFn>,
    pub file: Option<FileFn>,
    pub info: Option<InfoFn>,
    pub input: Option<InputFn>,
    pub output: Option<OutputFn>,
    pub session: Option<SessionFn>,
    pub item: Option<ItemFn>,
    pub env: Option<EnvFn>,
}

impl fmt::Debug for UnifiedApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnifiedApi")
            .field("get", &self.get.is_some())
            .field("set", &self.set.is_some())
            .field("file", &self.file.is_some())
            .field("info", &self.info.is_some())
            .field("input", &self.input.is_some())
            .field("output", &self.output.is_some())
            .field("session", &self.session.is_some())
            .field("item", &self.item.is_some())
            .field("env", &self.env.is_some())
            .finish()
    }
}

/// Model/backend pair an LLM executor attaches to the context after a call,
/// consumed by `ApiResponse`'s `_meta` construction when the workflow's own
/// YAML did not already set `Model`/`Backend`.
#[derive(Debug, Clone, Default)]
pub struct LlmMetadata {
    pub model: Option<String>,
    pub backend: Option<String>,
}

/// Mutable per-run state: everything a resource can read or write while a
/// workflow executes. `Outputs` and `Items` are exclusively owned here;
/// `Memory` and `Session` are process-lifetime stores shared (by `Arc`)
/// across runs.
#[derive(Clone)]
pub struct ExecutionContext {
    pub workflow: Arc<Workflow>,
    pub api: UnifiedApi,
    pub memory: Arc<dyn MemoryStore>,
    pub session: Arc<dyn SessionStore>,
    pub outputs: Arc<RwLock<HashMap<ActionId, Value>>>,
    pub items: Arc<RwLock<HashMap<String, Value>>>,
    pub request: Option<RequestContext>,
    pub fs_root: String,
    pub llm_metadata: Arc<RwLock<Option<LlmMetadata>>>,
    pub tts_output_file: Arc<RwLock<Option<String>>>,
    pub bot_send: Option<BotSendFn>,
    pub debug: bool,
}

impl ExecutionContext {
    pub fn new(
        workflow: Arc<Workflow>,
        memory: Arc<dyn MemoryStore>,
        session: Arc<dyn SessionStore>,
        fs_root: impl Into<String>,
    ) -> Self {
        let debug = workflow.settings.agent_settings.debug;
        Self {
            workflow,
            api: UnifiedApi::default(),
            memory,
            session,
            outputs: Arc::new(RwLock::new(HashMap::new())),
            items: Arc::new(RwLock::new(HashMap::new())),
            request: None,
            fs_root: fs_root.into(),
            llm_metadata: Arc::new(RwLock::new(None)),
            tts_output_file: Arc::new(RwLock::new(None)),
            bot_send: None,
            debug,
        }
    }

    pub fn with_request(mut self, request: RequestContext) -> Self {
        self.request = Some(request);
        self
    }

    pub fn with_bot_send(mut self, send: BotSendFn) -> Self {
        self.bot_send = Some(send);
        self
    }

    pub fn set_output(&self, action_id: ActionId, value: Value) {
        self.outputs.write().insert(action_id, value);
    }

    pub fn get_output(&self, action_id: &ActionId) -> Option<Value> {
        self.outputs.read().get(action_id).cloned()
    }

    pub fn set_item(&self, key: impl Into<String>, value: Value) {
        self.items.write().insert(key.into(), value);
    }

    pub fn set_llm_metadata(&self, metadata: LlmMetadata) {
        *self.llm_metadata.write() = Some(metadata);
    }

    pub fn set_tts_output_file(&self, path: impl Into<String>) {
        *self.tts_output_file.write() = Some(path.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AgentSettings, Settings, WorkflowMetadata};

    struct NullMemory;
    #[async_trait::async_trait]
    impl MemoryStore for NullMemory {
        async fn get(&self, _key: &str) -> Result<Option<Value>> {
            Ok(None)
        }
        async fn set(&self, _key: &str, _value: Value) -> Result<()> {
            Ok(())
        }
        async fn delete(&self, _key: &str) -> Result<bool> {
            Ok(false)
        }
        async fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    struct NullSession;
    #[async_trait::async_trait]
    impl SessionStore for NullSession {
        fn session_id(&self) -> &str {
            "test"
        }
        fn default_ttl(&self) -> Option<chrono::Duration> {
            None
        }
        async fn get(&self, _key: &str) -> Result<Option<Value>> {
            Ok(None)
        }
        async fn set(&self, _key: &str, _value: Value) -> Result<()> {
            Ok(())
        }
        async fn set_with_ttl(&self, _key: &str, _value: Value, _ttl: chrono::Duration) -> Result<()> {
            Ok(())
        }
        async fn touch(&self, _key: &str) -> Result<()> {
            Ok(())
        }
        async fn touch_with_ttl(&self, _key: &str, _ttl: chrono::Duration) -> Result<()> {
            Ok(())
        }
        async fn is_expired(&self, _key: &str) -> Result<bool> {
            Ok(true)
        }
        async fn delete(&self, _key: &str) -> Result<bool> {
            Ok(false)
        }
        async fn clear(&self) -> Result<()> {
            Ok(())
        }
        async fn get_all(&self) -> Result<HashMap<String, Value>> {
            Ok(HashMap::new())
        }
        async fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    fn test_workflow() -> Arc<Workflow> {
        Arc::new(Workflow {
            metadata: WorkflowMetadata {
                name: "t".into(),
                version: "0.1".into(),
                target_action_id: ActionId::new("out"),
            },
            settings: Settings {
                agent_settings: AgentSettings::default(),
            },
            resources: vec![],
        })
    }

    #[test]
    fn outputs_round_trip() {
        let ctx = ExecutionContext::new(test_workflow(), Arc::new(NullMemory), Arc::new(NullSession), "/tmp");
        ctx.set_output(ActionId::new("a"), Value::String("hi".into()));
        assert_eq!(
            ctx.get_output(&ActionId::new("a")),
            Some(Value::String("hi".into()))
        );
        assert_eq!(ctx.get_output(&ActionId::new("missing")), None);
    }
}
