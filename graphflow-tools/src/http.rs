//! ABOUTME: HTTP executor - issues a request built from evaluated
//! ABOUTME: method/url/headers/body/timeout fields and returns the response

use crate::support::{evaluate_to_string, resolve_timeout};
use async_trait::async_trait;
use graphflow_core::error::{bad_request_error, resource_error};
use graphflow_core::traits::executor::Executor;
use graphflow_core::types::ResourceKind;
use graphflow_core::{ExecutionContext, Result};
use graphflow_utils::Evaluator;
use reqwest::Method;
use serde_json::{json, Map, Value};
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub struct HttpExecutor {
    client: reqwest::Client,
}

impl HttpExecutor {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Executor for HttpExecutor {
    fn kind_label(&self) -> &'static str {
        "httpClient"
    }

    async fn execute(&self, ctx: &ExecutionContext, kind: &ResourceKind) -> Result<Value> {
        let ResourceKind::HttpClient(cfg) = kind else {
            return Err(bad_request_error("HttpExecutor received a non-httpClient resource"));
        };

        let evaluator = Evaluator::new(ctx.api.clone(), Map::new());
        let method_str = evaluate_to_string(&evaluator, &cfg.method).await?;
        let method = Method::from_bytes(method_str.to_uppercase().as_bytes())
            .map_err(|_| bad_request_error(format!("invalid http method '{method_str}'")))?;
        let url = evaluate_to_string(&evaluator, &cfg.url).await?;

        let mut builder = self.client.request(method, &url);
        for (name, expr) in &cfg.headers {
            let value = evaluate_to_string(&evaluator, expr).await?;
            builder = builder.header(name, value);
        }
        if let Some(body_expr) = &cfg.body {
            let value = evaluator.evaluate(body_expr).await?;
            builder = match value {
                Value::String(s) => builder.body(s),
                other => builder.json(&other),
            };
        }

        let timeout = resolve_timeout(&evaluator, cfg.timeout.as_ref(), DEFAULT_TIMEOUT).await?;
        builder = builder.timeout(timeout);

        let response = builder
            .send()
            .await
            .map_err(|e| resource_error(format!("http request to '{url}' failed: {e}")))?;

        let status = response.status().as_u16();
        let mut headers = Map::new();
        for (name, value) in response.headers() {
            headers.insert(
                name.to_string(),
                Value::String(value.to_str().unwrap_or_default().to_string()),
            );
        }

        let raw_body = response
            .text()
            .await
            .map_err(|e| resource_error(format!("failed to read response body from '{url}': {e}")))?;
        let body = serde_json::from_str::<Value>(&raw_body).unwrap_or(Value::String(raw_body));

        Ok(json!({
            "status": status,
            "headers": Value::Object(headers),
            "body": body,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphflow_core::error::ErrorKind;
    use graphflow_core::types::{ActionId, AgentSettings, HttpConfig, Settings, Workflow, WorkflowMetadata};
    use graphflow_core::types::Expression;
    use graphflow_core::traits::storage::{MemoryStore, SessionStore};
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

    fn test_ctx() -> ExecutionContext {
        let workflow = Arc::new(Workflow {
            metadata: WorkflowMetadata {
                name: "t".into(),
                version: "0.1".into(),
                target_action_id: ActionId::new("out"),
            },
            settings: Settings {
                agent_settings: AgentSettings::default(),
            },
            resources: vec![],
        });
        ExecutionContext::new(workflow, Arc::new(NullMemory), Arc::new(NullSession), "/tmp")
    }

    #[tokio::test]
    async fn invalid_method_is_rejected_before_any_request_is_sent() {
        let executor = HttpExecutor::new();
        let kind = ResourceKind::HttpClient(HttpConfig {
            method: Expression::literal("BAD METHOD"),
            url: Expression::literal("http://127.0.0.1:9/unreachable"),
            headers: Default::default(),
            body: None,
            timeout: None,
        });
        let ctx = test_ctx();
        let err = executor.execute(&ctx, &kind).await.unwrap_err();
        assert!(err.is_kind(ErrorKind::BadRequest));
    }

    #[tokio::test]
    async fn non_http_resource_is_rejected() {
        let executor = HttpExecutor::new();
        let kind = ResourceKind::BotReply(graphflow_core::types::BotReplyConfig {
            text: Expression::literal("hi"),
        });
        let ctx = test_ctx();
        let err = executor.execute(&ctx, &kind).await.unwrap_err();
        assert!(err.is_kind(ErrorKind::BadRequest));
    }
}
