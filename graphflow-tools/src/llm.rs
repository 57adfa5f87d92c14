//! ABOUTME: LLM executor - issues a chat completion against a configured
//! ABOUTME: provider/model and attaches LlmMetadata for ApiResponse fallback

use crate::support::evaluate_to_string;
use async_trait::async_trait;
use graphflow_core::error::bad_request_error;
use graphflow_core::traits::executor::Executor;
use graphflow_core::types::ResourceKind;
use graphflow_core::{ExecutionContext, LlmMetadata, Result};
use graphflow_providers::{LlmRequest, ModelSpecifier, ProviderManager};
use graphflow_utils::Evaluator;
use serde_json::{json, Map, Value};
use std::sync::Arc;

const DEFAULT_BACKEND: &str = "openai";

/// Resolves `model`/`backend` against the resource's own fields, falling
/// back to the workflow's `agentSettings` when a resource omits them.
pub struct LlmExecutor {
    providers: Arc<ProviderManager>,
}

impl LlmExecutor {
    pub fn new(providers: Arc<ProviderManager>) -> Self {
        Self { providers }
    }
}

#[async_trait]
impl Executor for LlmExecutor {
    fn kind_label(&self) -> &'static str {
        "llm"
    }

    async fn execute(&self, ctx: &ExecutionContext, kind: &ResourceKind) -> Result<Value> {
        let ResourceKind::Llm(cfg) = kind else {
            return Err(bad_request_error("LlmExecutor received a non-llm resource"));
        };

        let evaluator = Evaluator::new(ctx.api.clone(), Map::new());
        let prompt = evaluate_to_string(&evaluator, &cfg.prompt).await?;
        let system_prompt = match &cfg.system_prompt {
            Some(expr) => Some(evaluate_to_string(&evaluator, expr).await?),
            None => None,
        };

        let agent_settings = &ctx.workflow.settings.agent_settings;
        let model_str = match &cfg.model {
            Some(expr) => evaluate_to_string(&evaluator, expr).await?,
            None => agent_settings
                .default_model
                .clone()
                .ok_or_else(|| bad_request_error("llm resource has no model and no default_model is configured"))?,
        };
        let spec = ModelSpecifier::parse(&model_str)?;
        let default_backend = agent_settings.default_backend.as_deref().unwrap_or(DEFAULT_BACKEND);
        let backend = spec.provider_or_default(default_backend).to_string();

        let provider = self.providers.ensure_model(&backend, &spec.model).await?;
        let request = LlmRequest {
            prompt,
            system_prompt,
            temperature: cfg.temperature,
            max_tokens: cfg.max_tokens,
        };
        let completion = provider.complete(&request).await?;

        ctx.set_llm_metadata(LlmMetadata {
            model: Some(spec.model.clone()),
            backend: Some(backend),
        });

        Ok(json!({
            "text": completion.text,
            "usage": {
                "promptTokens": completion.prompt_tokens,
                "completionTokens": completion.completion_tokens,
            },
        }))
    }
}
