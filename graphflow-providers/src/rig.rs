//! ABOUTME: Rig provider implementation for LLM completions
//! ABOUTME: Wraps the rig-core crate to provide LLM capabilities

use crate::abstraction::{LlmCompletion, LlmRequest, ProviderCapabilities, ProviderConfig, ProviderInstance};
use async_trait::async_trait;
use graphflow_core::error::{bad_request_error, resource_error};
use graphflow_core::Result;
use rig::{completion::CompletionModel, providers};

/// Enum to hold different provider models
enum RigModel {
    OpenAI(providers::openai::CompletionModel),
    Anthropic(providers::anthropic::completion::CompletionModel),
    Cohere(providers::cohere::CompletionModel),
}

/// Rig provider implementation
pub struct RigProvider {
    config: ProviderConfig,
    capabilities: ProviderCapabilities,
    model: RigModel,
}

impl RigProvider {
    /// Create a new Rig provider instance
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let model = match config.name.as_str() {
            "openai" => {
                let api_key = config
                    .api_key
                    .as_ref()
                    .ok_or_else(|| bad_request_error("OpenAI API key required"))?;

                let client = providers::openai::Client::new(api_key);
                let model = client.completion_model(&config.model);
                RigModel::OpenAI(model)
            }
            "anthropic" => {
                let api_key = config
                    .api_key
                    .as_ref()
                    .ok_or_else(|| bad_request_error("Anthropic API key required"))?;

                let base_url = config.endpoint.as_deref().unwrap_or("https://api.anthropic.com");
                let version = "2023-06-01";

                let client = providers::anthropic::Client::new(api_key, base_url, None, version);
                let model = client.completion_model(&config.model);
                RigModel::Anthropic(model)
            }
            "cohere" => {
                let api_key = config
                    .api_key
                    .as_ref()
                    .ok_or_else(|| bad_request_error("Cohere API key required"))?;

                let client = providers::cohere::Client::new(api_key);
                let model = client.completion_model(&config.model);
                RigModel::Cohere(model)
            }
            other => {
                return Err(bad_request_error(format!("unsupported provider: {other}")));
            }
        };

        let capabilities = ProviderCapabilities {
            supports_streaming: false,
            supports_multimodal: matches!(config.name.as_str(), "openai" | "anthropic"),
            max_context_tokens: Some(match config.name.as_str() {
                "openai" => match config.model.as_str() {
                    "gpt-4" | "gpt-4-turbo" => 128000,
                    "gpt-3.5-turbo" => 16384,
                    _ => 8192,
                },
                "anthropic" => match config.model.as_str() {
                    "claude-3-opus" | "claude-3-sonnet" => 200000,
                    "claude-2.1" => 100000,
                    _ => 100000,
                },
                "cohere" => 4096,
                _ => 4096,
            }),
            max_output_tokens: Some(4096),
            available_models: vec![config.model.clone()],
            custom_features: Default::default(),
        };

        Ok(Self { config, capabilities, model })
    }

    async fn execute_completion(&self, prompt: &str) -> Result<String> {
        let provider = self.config.name.clone();
        match &self.model {
            RigModel::OpenAI(model) => {
                let response = model
                    .completion_request(prompt)
                    .send()
                    .await
                    .map_err(|e| resource_error(format!("{provider} completion failed: {e}")))?;
                match response.choice {
                    rig::completion::ModelChoice::Message(text) => Ok(text),
                    rig::completion::ModelChoice::ToolCall(name, _params) => {
                        Err(resource_error(format!("unexpected tool call response: {name}")))
                    }
                }
            }
            RigModel::Anthropic(model) => {
                let response = model
                    .completion_request(prompt)
                    .send()
                    .await
                    .map_err(|e| resource_error(format!("{provider} completion failed: {e}")))?;
                match response.choice {
                    rig::completion::ModelChoice::Message(text) => Ok(text),
                    rig::completion::ModelChoice::ToolCall(name, _params) => {
                        Err(resource_error(format!("unexpected tool call response: {name}")))
                    }
                }
            }
            RigModel::Cohere(model) => {
                let response = model
                    .completion_request(prompt)
                    .send()
                    .await
                    .map_err(|e| resource_error(format!("{provider} completion failed: {e}")))?;
                match response.choice {
                    rig::completion::ModelChoice::Message(text) => Ok(text),
                    rig::completion::ModelChoice::ToolCall(name, _params) => {
                        Err(resource_error(format!("unexpected tool call response: {name}")))
                    }
                }
            }
        }
    }
}

#[async_trait]
impl ProviderInstance for RigProvider {
    fn capabilities(&self) -> &ProviderCapabilities {
        &self.capabilities
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmCompletion> {
        let prompt = match &request.system_prompt {
            Some(system) => format!("{system}\n\n{}", request.prompt),
            None => request.prompt.clone(),
        };

        let text = self.execute_completion(&prompt).await?;
        Ok(LlmCompletion { text, prompt_tokens: None, completion_tokens: None })
    }

    async fn validate(&self) -> Result<()> {
        let test = LlmRequest { prompt: "Say 'test'".to_string(), ..Default::default() };
        self.complete(&test).await.map(|_| ())
    }

    fn name(&self) -> &str {
        &self.config.name
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

/// Factory function for creating Rig providers
pub fn create_rig_provider(config: ProviderConfig) -> Result<Box<dyn ProviderInstance>> {
    Ok(Box::new(RigProvider::new(config)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_api_key_is_a_bad_request() {
        let config = ProviderConfig::new("openai", "gpt-4");
        let err = RigProvider::new(config).unwrap_err();
        assert!(err.message.contains("API key required"));
    }

    #[test]
    fn unsupported_provider_name_is_rejected() {
        let config = ProviderConfig::new("unsupported", "model");
        let err = RigProvider::new(config).unwrap_err();
        assert!(err.message.contains("unsupported provider"));
    }

    #[test]
    fn openai_gpt4_capabilities_are_populated() {
        let mut config = ProviderConfig::new("openai", "gpt-4");
        config.api_key = Some("test-key".to_string());

        let provider = RigProvider::new(config).unwrap();
        let caps = provider.capabilities();
        assert!(!caps.supports_streaming);
        assert!(caps.supports_multimodal);
        assert_eq!(caps.max_context_tokens, Some(128000));
        assert_eq!(caps.max_output_tokens, Some(4096));
        assert_eq!(caps.available_models, vec!["gpt-4"]);
    }

    #[test]
    fn anthropic_opus_capabilities_are_populated() {
        let mut config = ProviderConfig::new("anthropic", "claude-3-opus");
        config.api_key = Some("test-key".to_string());

        let provider = RigProvider::new(config).unwrap();
        let caps = provider.capabilities();
        assert!(caps.supports_multimodal);
        assert_eq!(caps.max_context_tokens, Some(200000));
    }

    #[test]
    fn cohere_capabilities_have_no_multimodal() {
        let mut config = ProviderConfig::new("cohere", "command");
        config.api_key = Some("test-key".to_string());

        let provider = RigProvider::new(config).unwrap();
        let caps = provider.capabilities();
        assert!(!caps.supports_multimodal);
        assert_eq!(caps.max_context_tokens, Some(4096));
    }
}
