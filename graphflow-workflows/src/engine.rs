//! ABOUTME: Execution engine - orchestrates the dependency graph, per-resource
//! ABOUTME: evaluation, preflight checks and the OnError continue/retry/fail policy

use crate::graph::DependencyGraph;
use graphflow_core::error::{bad_request_error, not_found_error, preflight_error, wrap_for_resource};
use graphflow_core::execution_context::{BotSendFn, BoxFuture};
use graphflow_core::traits::storage::{MemoryStore, SessionStore};
use graphflow_core::traits::{Executor, ExecutorRegistry};
use graphflow_core::types::{OnError, OnErrorAction, RequestContext, Resource, ResourceKind};
use graphflow_core::{ActionId, ExecutionContext, Result, Workflow};
use graphflow_utils::expr::Evaluator;
use graphflow_utils::{build_unified_api, format_for_template, truthy};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration as StdDuration;

/// Builds a `SessionStore` for a given session id. The engine asks for a
/// fresh store per run rather than holding one open, since a long-lived
/// process (the CLI's server mode) serves many sessions concurrently.
pub type SessionFactory = Arc<dyn Fn(String) -> BoxFuture<'static, Result<Arc<dyn SessionStore>>> + Send + Sync>;

/// Wires the process-lifetime stores and executor registry an `Engine`
/// needs. Mirrors the teacher's builder-over-struct pattern: each field is
/// independently optional so a test can stand up an engine with only the
/// executors it exercises.
pub struct EngineBuilder {
    registry: ExecutorRegistry,
    memory: Option<Arc<dyn MemoryStore>>,
    session_factory: Option<SessionFactory>,
    fs_root: String,
    bot_send: Option<BotSendFn>,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self {
            registry: ExecutorRegistry::new(),
            memory: None,
            session_factory: None,
            fs_root: ".".to_string(),
            bot_send: None,
        }
    }
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.registry.register(executor);
        self
    }

    #[must_use]
    pub fn with_memory(mut self, memory: Arc<dyn MemoryStore>) -> Self {
        self.memory = Some(memory);
        self
    }

    #[must_use]
    pub fn with_session_factory(mut self, factory: SessionFactory) -> Self {
        self.session_factory = Some(factory);
        self
    }

    #[must_use]
    pub fn with_fs_root(mut self, fs_root: impl Into<String>) -> Self {
        self.fs_root = fs_root.into();
        self
    }

    #[must_use]
    pub fn with_bot_send(mut self, send: BotSendFn) -> Self {
        self.bot_send = Some(send);
        self
    }

    /// # Panics
    /// Panics if `with_memory` or `with_session_factory` were never called -
    /// every engine needs both stores to build an `ExecutionContext`.
    pub fn build(self) -> Engine {
        Engine {
            registry: Arc::new(self.registry),
            memory: self.memory.expect("EngineBuilder requires with_memory"),
            session_factory: self
                .session_factory
                .expect("EngineBuilder requires with_session_factory"),
            fs_root: self.fs_root,
            bot_send: self.bot_send,
        }
    }
}

/// Orchestrates one workflow run at a time against a shared registry and
/// shared (process-lifetime) stores. `Engine` is cheap to clone: each call
/// to `execute` builds its own `DependencyGraph` and `ExecutionContext`.
#[derive(Clone)]
pub struct Engine {
    registry: Arc<ExecutorRegistry>,
    memory: Arc<dyn MemoryStore>,
    session_factory: SessionFactory,
    fs_root: String,
    bot_send: Option<BotSendFn>,
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Builds the `DependencyGraph`, computes the execution order up to the
    /// workflow's `TargetActionID`, executes each resource in order and
    /// returns the target's recorded output.
    pub async fn execute(
        &self,
        workflow: Arc<Workflow>,
        request: Option<RequestContext>,
        session_id: &str,
    ) -> Result<Value> {
        let mut graph = DependencyGraph::new();
        for resource in &workflow.resources {
            graph.add_resource(resource.clone())?;
        }
        graph.build()?;

        let target = workflow.target_action_id().clone();
        let order = graph.get_execution_order(&target)?;

        let session = (self.session_factory)(session_id.to_string()).await?;
        let mut ctx = ExecutionContext::new(
            Arc::clone(&workflow),
            Arc::clone(&self.memory),
            session,
            self.fs_root.clone(),
        );
        if let Some(req) = request {
            ctx = ctx.with_request(req);
        }
        if let Some(send) = self.bot_send.clone() {
            ctx = ctx.with_bot_send(send);
        }
        ctx.api = build_unified_api(&ctx);

        for action_id in &order {
            let resource = graph
                .resource(action_id)
                .ok_or_else(|| not_found_error(format!("resource '{action_id}' vanished mid-run")))?
                .clone();
            if let Some(value) = self.execute_resource(&ctx, &resource).await? {
                ctx.set_output(action_id.clone(), value);
            }
        }

        ctx.get_output(&target)
            .ok_or_else(|| not_found_error(format!("no output recorded for target '{target}'")))
    }

    /// Evaluates `SkipCondition`, runs preflight, dispatches to the kind's
    /// executor and applies the `OnError` policy. `Ok(None)` means the
    /// resource was skipped and no output should be recorded.
    pub async fn execute_resource(
        &self,
        ctx: &ExecutionContext,
        resource: &Resource,
    ) -> Result<Option<Value>> {
        let evaluator = Evaluator::new(ctx.api.clone(), Map::new());
        let action_id = resource.action_id();

        if let Some(skip) = &resource.run.skip_condition {
            let v = evaluator
                .evaluate(skip)
                .await
                .map_err(|e| wrap_for_resource(e, action_id.as_str()))?;
            if truthy(&v) {
                return Ok(None);
            }
        }

        self.run_preflight_check(&evaluator, resource)
            .await
            .map_err(|e| wrap_for_resource(e, action_id.as_str()))?;

        let executor = self.registry.get(resource.run.kind.label()).ok_or_else(|| {
            bad_request_error(format!(
                "no executor registered for resource kind '{}'",
                resource.run.kind.label()
            ))
            .with_resource(action_id.as_str())
        })?;

        let value = self
            .run_with_on_error_policy(ctx, &evaluator, resource, executor)
            .await?;
        Ok(Some(value))
    }

    /// Each validation expression must evaluate truthy; the first failure's
    /// message is evaluated as an expression and raised as `PreflightFailed`.
    pub async fn run_preflight_check(&self, evaluator: &Evaluator, resource: &Resource) -> Result<()> {
        let Some(check) = &resource.run.preflight_check else {
            return Ok(());
        };
        for validation in &check.validations {
            let v = evaluator.evaluate(validation).await?;
            if !truthy(&v) {
                let message = evaluator.evaluate(&check.error.message).await?;
                let message_text = format_for_template(&message);
                return Err(preflight_error(check.error.code.clone(), message_text));
            }
        }
        Ok(())
    }

    async fn run_with_on_error_policy(
        &self,
        ctx: &ExecutionContext,
        evaluator: &Evaluator,
        resource: &Resource,
        executor: Arc<dyn Executor>,
    ) -> Result<Value> {
        let action_id = resource.action_id();
        let Some(on_error) = &resource.run.on_error else {
            return executor
                .execute(ctx, &resource.run.kind)
                .await
                .map_err(|e| wrap_for_resource(e, action_id.as_str()));
        };

        match on_error.action {
            OnErrorAction::Fail => executor
                .execute(ctx, &resource.run.kind)
                .await
                .map_err(|e| wrap_for_resource(e, action_id.as_str())),
            OnErrorAction::Retry => {
                self.run_with_retry(ctx, evaluator, &resource.run.kind, action_id.as_str(), on_error, &executor)
                    .await
            }
            OnErrorAction::Continue => {
                self.run_with_continue(ctx, evaluator, &resource.run.kind, on_error, &executor)
                    .await
            }
        }
    }

    async fn run_with_retry(
        &self,
        ctx: &ExecutionContext,
        evaluator: &Evaluator,
        kind: &ResourceKind,
        action_id: &str,
        on_error: &OnError,
        executor: &Arc<dyn Executor>,
    ) -> Result<Value> {
        let max_attempts = on_error.max_retries.unwrap_or(1).max(1);
        let delay = self.resolve_retry_delay(evaluator, on_error).await;

        let mut last_err = None;
        for attempt in 1..=max_attempts {
            match executor.execute(ctx, kind).await {
                Ok(v) => return Ok(v),
                Err(e) => {
                    last_err = Some(e);
                    if attempt < max_attempts {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
        let inner = last_err.expect("loop ran at least once");
        Err(wrap_for_resource(
            graphflow_core::error::resource_error(format!(
                "retry exhausted after {max_attempts} attempt(s): {inner}"
            )),
            action_id,
        ))
    }

    async fn run_with_continue(
        &self,
        ctx: &ExecutionContext,
        evaluator: &Evaluator,
        kind: &ResourceKind,
        on_error: &OnError,
        executor: &Arc<dyn Executor>,
    ) -> Result<Value> {
        match executor.execute(ctx, kind).await {
            Ok(v) => Ok(v),
            Err(e) => {
                let result = match &on_error.fallback {
                    Some(fallback) => evaluator.deep_evaluate(fallback).await?,
                    None => {
                        let mut err_map = Map::new();
                        err_map.insert("handled".into(), Value::Bool(true));
                        err_map.insert("message".into(), Value::String(e.to_string()));
                        let mut outer = Map::new();
                        outer.insert("_error".into(), Value::Object(err_map));
                        Value::Object(outer)
                    }
                };
                for side_effect in &on_error.expr {
                    evaluator.evaluate(side_effect).await?;
                }
                Ok(result)
            }
        }
    }

    async fn resolve_retry_delay(&self, evaluator: &Evaluator, on_error: &OnError) -> StdDuration {
        const DEFAULT: StdDuration = StdDuration::from_secs(30);
        let Some(expr) = &on_error.retry_delay else {
            return DEFAULT;
        };
        let Ok(v) = evaluator.evaluate(expr).await else {
            return DEFAULT;
        };
        let text = match &v {
            Value::String(s) => s.clone(),
            other => format_for_template(other),
        };
        humantime::parse_duration(text.trim()).unwrap_or(DEFAULT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use graphflow_core::error::resource_error;
    use graphflow_core::types::{
        ApiResponseConfig, Expression, LlmConfig, PreflightCheck, PreflightError, ResourceMetadata,
        RunConfig,
    };
    use graphflow_storage::{SqliteBackend, SqliteConfig, SqliteMemoryStore, SqliteSessionStore};
    use serde_json::json;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct EchoExecutor;
    #[async_trait]
    impl Executor for EchoExecutor {
        async fn execute(&self, _ctx: &ExecutionContext, kind: &ResourceKind) -> Result<Value> {
            let ResourceKind::Llm(cfg) = kind else {
                return Err(bad_request_error("expected llm config"));
            };
            Ok(json!({ "text": cfg.prompt.raw.clone() }))
        }
        fn kind_label(&self) -> &'static str {
            "llm"
        }
    }

    struct ApiResponseEchoExecutor;
    #[async_trait]
    impl Executor for ApiResponseEchoExecutor {
        async fn execute(&self, ctx: &ExecutionContext, kind: &ResourceKind) -> Result<Value> {
            let ResourceKind::ApiResponse(cfg) = kind else {
                return Err(bad_request_error("expected apiResponse config"));
            };
            let b_output = ctx.get_output(&ActionId::new("b")).unwrap_or(Value::Null);
            let text = b_output.get("text").cloned().unwrap_or(Value::Null);
            let mut data = Map::new();
            data.insert("msg".into(), text);
            let _ = &cfg.response;
            Ok(json!({ "success": true, "data": Value::Object(data) }))
        }
        fn kind_label(&self) -> &'static str {
            "apiResponse"
        }
    }

    struct FlakyExecutor {
        fail_times: usize,
        calls: AtomicUsize,
    }
    #[async_trait]
    impl Executor for FlakyExecutor {
        async fn execute(&self, _ctx: &ExecutionContext, _kind: &ResourceKind) -> Result<Value> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_times {
                Err(resource_error("flaky failure"))
            } else {
                Ok(json!({ "attempt": n + 1 }))
            }
        }
        fn kind_label(&self) -> &'static str {
            "llm"
        }
    }

    struct AlwaysFailExecutor;
    #[async_trait]
    impl Executor for AlwaysFailExecutor {
        async fn execute(&self, _ctx: &ExecutionContext, _kind: &ResourceKind) -> Result<Value> {
            Err(resource_error("nope"))
        }
        fn kind_label(&self) -> &'static str {
            "llm"
        }
    }

    fn test_session_factory(backend: Arc<SqliteBackend>) -> SessionFactory {
        Arc::new(move |session_id: String| {
            let backend = backend.clone();
            Box::pin(async move {
                let store = SqliteSessionStore::open(backend, session_id, None).await?;
                Ok(Arc::new(store) as Arc<dyn SessionStore>)
            })
        })
    }

    async fn test_engine(executors: Vec<Arc<dyn Executor>>) -> Engine {
        let backend = Arc::new(SqliteBackend::open(&SqliteConfig::new(":memory:")).await.unwrap());
        let memory = Arc::new(SqliteMemoryStore::open(backend.clone()).await.unwrap());
        let mut builder = Engine::builder()
            .with_memory(memory)
            .with_session_factory(test_session_factory(backend))
            .with_fs_root(".");
        for executor in executors {
            builder = builder.with_executor(executor);
        }
        builder.build()
    }

    fn llm_resource(id: &str, requires: &[&str], prompt: &str) -> Resource {
        Resource {
            metadata: ResourceMetadata {
                action_id: ActionId::new(id),
                name: id.to_string(),
                requires: requires.iter().map(|r| ActionId::new(*r)).collect::<HashSet<_>>(),
            },
            run: RunConfig {
                kind: ResourceKind::Llm(LlmConfig {
                    prompt: Expression::literal(prompt),
                    model: None,
                    system_prompt: None,
                    temperature: None,
                    max_tokens: None,
                }),
                skip_condition: None,
                preflight_check: None,
                on_error: None,
            },
        }
    }

    fn api_response_resource(id: &str, requires: &[&str], response: Value) -> Resource {
        Resource {
            metadata: ResourceMetadata {
                action_id: ActionId::new(id),
                name: id.to_string(),
                requires: requires.iter().map(|r| ActionId::new(*r)).collect::<HashSet<_>>(),
            },
            run: RunConfig {
                kind: ResourceKind::ApiResponse(ApiResponseConfig { response, meta: None }),
                skip_condition: None,
                preflight_check: None,
                on_error: None,
            },
        }
    }

    fn workflow(resources: Vec<Resource>, target: &str) -> Arc<Workflow> {
        use graphflow_core::types::{AgentSettings, Settings, WorkflowMetadata};
        Arc::new(Workflow {
            metadata: WorkflowMetadata {
                name: "t".into(),
                version: "0".into(),
                target_action_id: ActionId::new(target),
            },
            settings: Settings { agent_settings: AgentSettings::default() },
            resources,
        })
    }

    #[tokio::test]
    async fn linear_dag_wires_output_through_the_chain() {
        let engine = test_engine(vec![Arc::new(EchoExecutor), Arc::new(ApiResponseEchoExecutor)]).await;
        let wf = workflow(
            vec![
                llm_resource("a", &[], "hi"),
                llm_resource("b", &["a"], "hi"),
                api_response_resource("c", &["b"], json!({"msg": "placeholder"})),
            ],
            "c",
        );
        let result = engine.execute(wf, None, "s1").await.unwrap();
        assert_eq!(result["success"], json!(true));
        assert_eq!(result["data"]["msg"], json!("hi"));
    }

    #[tokio::test]
    async fn retry_policy_retries_until_success() {
        let flaky = Arc::new(FlakyExecutor { fail_times: 2, calls: AtomicUsize::new(0) });
        let engine = test_engine(vec![flaky.clone()]).await;
        let mut resource = llm_resource("a", &[], "hi");
        resource.run.on_error = Some(OnError {
            action: OnErrorAction::Retry,
            max_retries: Some(3),
            retry_delay: Some(Expression::literal("1ms")),
            fallback: None,
            expr: vec![],
        });
        let wf = workflow(vec![resource], "a");
        let result = engine.execute(wf, None, "s1").await.unwrap();
        assert_eq!(result["attempt"], json!(3));
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn continue_policy_returns_fallback_without_error() {
        let engine = test_engine(vec![Arc::new(AlwaysFailExecutor)]).await;
        let mut resource = llm_resource("a", &[], "hi");
        resource.run.on_error = Some(OnError {
            action: OnErrorAction::Continue,
            max_retries: None,
            retry_delay: None,
            fallback: Some(json!({"default": "value"})),
            expr: vec![],
        });
        let wf = workflow(vec![resource], "a");
        let result = engine.execute(wf, None, "s1").await.unwrap();
        assert_eq!(result, json!({"default": "value"}));
    }

    #[tokio::test]
    async fn fail_policy_surfaces_the_error() {
        let engine = test_engine(vec![Arc::new(AlwaysFailExecutor)]).await;
        let resource = llm_resource("a", &[], "hi");
        let wf = workflow(vec![resource], "a");
        let err = engine.execute(wf, None, "s1").await.unwrap_err();
        assert_eq!(err.resource_id.as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn preflight_failure_blocks_execution() {
        let engine = test_engine(vec![Arc::new(EchoExecutor)]).await;
        let mut resource = llm_resource("a", &[], "hi");
        resource.run.preflight_check = Some(PreflightCheck {
            validations: vec![Expression::direct("false")],
            error: PreflightError {
                code: "E1".into(),
                message: Expression::literal("always fails"),
            },
        });
        let wf = workflow(vec![resource], "a");
        let err = engine.execute(wf, None, "s1").await.unwrap_err();
        assert!(err.is_kind(graphflow_core::error::ErrorKind::PreflightFailed));
    }

    #[tokio::test]
    async fn skip_condition_omits_output_and_fails_lookup_as_target() {
        let engine = test_engine(vec![Arc::new(EchoExecutor)]).await;
        let mut resource = llm_resource("a", &[], "hi");
        resource.run.skip_condition = Some(Expression::direct("true"));
        let wf = workflow(vec![resource], "a");
        let err = engine.execute(wf, None, "s1").await.unwrap_err();
        assert!(err.is_kind(graphflow_core::error::ErrorKind::NotFound));
    }
}
