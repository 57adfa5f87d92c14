//! ABOUTME: TTS executor - synthesises text via a pluggable online/offline
//! ABOUTME: provider, writing the audio to an output file tracked on ctx

use crate::support::evaluate_to_string;
use async_trait::async_trait;
use graphflow_core::error::{bad_request_error, not_found_error, resource_error};
use graphflow_core::traits::executor::Executor;
use graphflow_core::types::ResourceKind;
use graphflow_core::{ExecutionContext, Result};
use graphflow_utils::Evaluator;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// One synthesis backend: an online HTTP provider (OpenAI/Google/
/// ElevenLabs/Azure) or an offline subprocess wrapper (piper/espeak/
/// festival/coqui). Both shapes write the audio to `output_file`.
#[async_trait]
pub trait TtsProvider: Send + Sync {
    async fn synthesize(&self, text: &str, voice: Option<&str>, output_file: &str) -> Result<()>;
}

pub struct TtsExecutor {
    providers: HashMap<String, Arc<dyn TtsProvider>>,
    default_provider: Option<String>,
    output_dir: String,
}

impl TtsExecutor {
    pub fn new(output_dir: impl Into<String>) -> Self {
        Self {
            providers: HashMap::new(),
            default_provider: None,
            output_dir: output_dir.into(),
        }
    }

    #[must_use]
    pub fn with_provider(mut self, name: impl Into<String>, provider: Arc<dyn TtsProvider>) -> Self {
        let name = name.into();
        if self.default_provider.is_none() {
            self.default_provider = Some(name.clone());
        }
        self.providers.insert(name, provider);
        self
    }
}

#[async_trait]
impl Executor for TtsExecutor {
    fn kind_label(&self) -> &'static str {
        "tts"
    }

    async fn execute(&self, ctx: &ExecutionContext, kind: &ResourceKind) -> Result<Value> {
        let ResourceKind::Tts(cfg) = kind else {
            return Err(bad_request_error("TtsExecutor received a non-tts resource"));
        };

        let evaluator = Evaluator::new(ctx.api.clone(), Map::new());
        let text = evaluate_to_string(&evaluator, &cfg.text).await?;
        if text.is_empty() {
            return Err(bad_request_error("tts resource requires non-empty text"));
        }
        let voice = match &cfg.voice {
            Some(expr) => Some(evaluate_to_string(&evaluator, expr).await?),
            None => None,
        };

        let provider_name = cfg
            .provider
            .clone()
            .or_else(|| self.default_provider.clone())
            .ok_or_else(|| bad_request_error("no tts provider configured"))?;
        let provider = self
            .providers
            .get(&provider_name)
            .ok_or_else(|| not_found_error(format!("unknown tts provider '{provider_name}'")))?;

        let output_file = match &cfg.output_file {
            Some(expr) => evaluate_to_string(&evaluator, expr).await?,
            None => {
                let tmp = tempfile::Builder::new()
                    .prefix("graphflow-tts-")
                    .suffix(".mp3")
                    .tempfile_in(&self.output_dir)
                    .map_err(|e| resource_error(format!("failed to allocate tts output file: {e}")))?;
                let (_, path) = tmp
                    .keep()
                    .map_err(|e| resource_error(format!("failed to persist tts output file: {e}")))?;
                path.to_string_lossy().into_owned()
            }
        };

        provider.synthesize(&text, voice.as_deref(), &output_file).await?;
        ctx.set_tts_output_file(output_file.clone());

        Ok(json!({
            "success": true,
            "outputFile": output_file,
            "text": text,
        }))
    }
}
