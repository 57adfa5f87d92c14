//! ABOUTME: BotReply executor - evaluates its text and sends it through
//! ABOUTME: ctx.bot_send, the host's bot-mode collaborator

use crate::support::evaluate_to_string;
use async_trait::async_trait;
use graphflow_core::error::bad_request_error;
use graphflow_core::traits::executor::Executor;
use graphflow_core::types::ResourceKind;
use graphflow_core::{ExecutionContext, Result};
use graphflow_utils::Evaluator;
use serde_json::{json, Map, Value};

pub struct BotReplyExecutor;

impl BotReplyExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for BotReplyExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Executor for BotReplyExecutor {
    fn kind_label(&self) -> &'static str {
        "botReply"
    }

    async fn execute(&self, ctx: &ExecutionContext, kind: &ResourceKind) -> Result<Value> {
        let ResourceKind::BotReply(cfg) = kind else {
            return Err(bad_request_error("BotReplyExecutor received a non-botReply resource"));
        };

        let Some(bot_send) = &ctx.bot_send else {
            return Err(bad_request_error("botReply resource requires bot mode, but ctx.bot_send is unset"));
        };

        let evaluator = Evaluator::new(ctx.api.clone(), Map::new());
        let text = evaluate_to_string(&evaluator, &cfg.text).await?;
        if text.is_empty() {
            return Err(bad_request_error("botReply resource evaluated to empty text"));
        }

        bot_send(text.clone()).await?;

        Ok(json!({ "success": true, "text": text }))
    }
}
