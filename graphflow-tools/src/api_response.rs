//! ABOUTME: ApiResponse executor - the conventional terminal resource that
//! ABOUTME: deep-evaluates the Response tree and attaches _meta/LlmMetadata

use async_trait::async_trait;
use graphflow_core::error::bad_request_error;
use graphflow_core::traits::executor::Executor;
use graphflow_core::types::{ApiResponseMeta, ResourceKind};
use graphflow_core::{ExecutionContext, Result};
use graphflow_utils::Evaluator;
use serde_json::{json, Map, Value};

pub struct ApiResponseExecutor;

impl ApiResponseExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ApiResponseExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Executor for ApiResponseExecutor {
    fn kind_label(&self) -> &'static str {
        "apiResponse"
    }

    async fn execute(&self, ctx: &ExecutionContext, kind: &ResourceKind) -> Result<Value> {
        let ResourceKind::ApiResponse(cfg) = kind else {
            return Err(bad_request_error("ApiResponseExecutor received a non-apiResponse resource"));
        };

        let evaluator = Evaluator::new(ctx.api.clone(), Map::new());
        let data = evaluator.deep_evaluate(&cfg.response).await?;

        let mut meta = Map::new();
        if let Some(meta_cfg) = &cfg.meta {
            self.apply_yaml_meta(&evaluator, meta_cfg, &mut meta).await?;
        }
        // YAML always wins: LlmMetadata only fills gaps the resource's own
        // `meta` block left open.
        if let Some(llm) = ctx.llm_metadata.read().clone() {
            if !meta.contains_key("model") {
                if let Some(model) = llm.model {
                    meta.insert("model".into(), Value::String(model));
                }
            }
            if !meta.contains_key("backend") {
                if let Some(backend) = llm.backend {
                    meta.insert("backend".into(), Value::String(backend));
                }
            }
        }

        let mut out = Map::new();
        out.insert("success".into(), Value::Bool(true));
        out.insert("data".into(), data);
        if !meta.is_empty() {
            out.insert("_meta".into(), Value::Object(meta));
        }
        Ok(Value::Object(out))
    }
}

impl ApiResponseExecutor {
    async fn apply_yaml_meta(&self, evaluator: &Evaluator, cfg: &ApiResponseMeta, meta: &mut Map<String, Value>) -> Result<()> {
        if let Some(model_expr) = &cfg.model {
            let v = evaluator.evaluate(model_expr).await?;
            if !v.is_null() {
                meta.insert("model".into(), v);
            }
        }
        if let Some(backend_expr) = &cfg.backend {
            let v = evaluator.evaluate(backend_expr).await?;
            if !v.is_null() {
                meta.insert("backend".into(), v);
            }
        }
        if !cfg.headers.is_empty() {
            let mut headers = Map::new();
            for (name, expr) in &cfg.headers {
                headers.insert(name.clone(), evaluator.evaluate(expr).await?);
            }
            meta.insert("headers".into(), Value::Object(headers));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphflow_core::execution_context::LlmMetadata;
    use graphflow_core::types::{ActionId, AgentSettings, Settings, Workflow, WorkflowMetadata};
    use graphflow_core::traits::{MemoryStore, SessionStore};
    use std::collections::HashMap;
    use std::sync::Arc;

    struct NullMemory;
    #[async_trait]
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
    #[async_trait]
    impl SessionStore for NullSession {
        fn session_id(&self) -> &str {
            "t"
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

    fn test_ctx() -> ExecutionContext {
        let workflow = Arc::new(Workflow {
            metadata: WorkflowMetadata {
                name: "t".into(),
                version: "0".into(),
                target_action_id: ActionId::new("out"),
            },
            settings: Settings { agent_settings: AgentSettings::default() },
            resources: vec![],
        });
        let mut ctx = ExecutionContext::new(workflow, Arc::new(NullMemory), Arc::new(NullSession), ".");
        ctx.api = graphflow_utils::build_unified_api(&ctx);
        ctx
    }

    #[tokio::test]
    async fn deep_evaluates_the_response_tree_and_passes_primitives_through() {
        let ctx = test_ctx();
        ctx.set_output(ActionId::new("b"), json!({"text": "hi"}));
        let cfg = ResourceKind::ApiResponse(graphflow_core::types::ApiResponseConfig {
            response: json!({"msg": "{{output('b').text}}", "count": 3, "ok": true}),
            meta: None,
        });
        let result = ApiResponseExecutor::new().execute(&ctx, &cfg).await.unwrap();
        assert_eq!(result["success"], json!(true));
        assert_eq!(result["data"]["msg"], json!("hi"));
        assert_eq!(result["data"]["count"], json!(3));
        assert_eq!(result["data"]["ok"], json!(true));
        assert!(result.get("_meta").is_none());
    }

    #[tokio::test]
    async fn yaml_meta_wins_over_llm_metadata() {
        let ctx = test_ctx();
        ctx.set_llm_metadata(LlmMetadata {
            model: Some("gpt-4o".into()),
            backend: Some("openai".into()),
        });
        let cfg = ResourceKind::ApiResponse(graphflow_core::types::ApiResponseConfig {
            response: json!({}),
            meta: Some(ApiResponseMeta {
                model: Some(graphflow_core::types::Expression::literal("claude-3")),
                backend: None,
                headers: Default::default(),
            }),
        });
        let result = ApiResponseExecutor::new().execute(&ctx, &cfg).await.unwrap();
        assert_eq!(result["_meta"]["model"], json!("claude-3"));
        assert_eq!(result["_meta"]["backend"], json!("openai"));
    }
}
