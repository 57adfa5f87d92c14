//! ABOUTME: Provider abstraction layer defining capabilities and management interfaces
//! ABOUTME: Enables provider-agnostic LLM integration with capability detection

use async_trait::async_trait;
use graphflow_core::error::{bad_request_error, not_found_error};
use graphflow_core::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Capabilities that a provider might support
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ProviderCapabilities {
    pub supports_streaming: bool,
    pub supports_multimodal: bool,
    pub max_context_tokens: Option<usize>,
    pub max_output_tokens: Option<usize>,
    pub available_models: Vec<String>,
    pub custom_features: HashMap<String, serde_json::Value>,
}

/// Configuration for a provider instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_secs: Option<u64>,
    pub max_retries: Option<u32>,
    pub custom_config: HashMap<String, serde_json::Value>,
}

impl ProviderConfig {
    pub fn new(name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            endpoint: None,
            api_key: None,
            timeout_secs: Some(30),
            max_retries: Some(3),
            custom_config: HashMap::new(),
        }
    }

    /// Loads endpoint/api_key/model/timeout/max_retries from
    /// `GRAPHFLOW_{NAME}_*` environment variables.
    pub fn from_env(name: &str) -> Result<Self> {
        let env_prefix = format!("GRAPHFLOW_{}_", name.to_uppercase());

        let api_key = std::env::var(format!("{env_prefix}API_KEY")).ok();
        let endpoint = std::env::var(format!("{env_prefix}ENDPOINT")).ok();
        let model = std::env::var(format!("{env_prefix}MODEL")).unwrap_or_else(|_| "default".to_string());

        Ok(Self {
            name: name.to_string(),
            endpoint,
            api_key,
            model,
            timeout_secs: std::env::var(format!("{env_prefix}TIMEOUT")).ok().and_then(|s| s.parse().ok()),
            max_retries: std::env::var(format!("{env_prefix}MAX_RETRIES")).ok().and_then(|s| s.parse().ok()),
            custom_config: HashMap::new(),
        })
    }
}

/// One chat-completion request, shaped after the `LlmConfig` resource
/// fields an executor has already evaluated.
#[derive(Debug, Clone, Default)]
pub struct LlmRequest {
    pub prompt: String,
    pub system_prompt: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
}

/// A completed chat response: the text plus whatever usage accounting the
/// backend reported.
#[derive(Debug, Clone, Default)]
pub struct LlmCompletion {
    pub text: String,
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
}

/// Trait for LLM provider implementations
#[async_trait]
pub trait ProviderInstance: Send + Sync {
    fn capabilities(&self) -> &ProviderCapabilities;
    async fn complete(&self, request: &LlmRequest) -> Result<LlmCompletion>;
    async fn validate(&self) -> Result<()>;
    fn name(&self) -> &str;
    fn model(&self) -> &str;
}

/// Factory function type for creating provider instances
pub type ProviderFactory = Box<dyn Fn(ProviderConfig) -> Result<Box<dyn ProviderInstance>> + Send + Sync>;

/// Type alias for provider instance storage
pub type ProviderInstanceMap = HashMap<String, Arc<Box<dyn ProviderInstance>>>;

/// Provider registry for managing available providers
pub struct ProviderRegistry {
    factories: HashMap<String, ProviderFactory>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self { factories: HashMap::new() }
    }

    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(ProviderConfig) -> Result<Box<dyn ProviderInstance>> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Box::new(factory));
    }

    pub fn create(&self, config: ProviderConfig) -> Result<Box<dyn ProviderInstance>> {
        let factory = self
            .factories
            .get(&config.name)
            .ok_or_else(|| bad_request_error(format!("unknown provider: {}", config.name)))?;
        factory(config)
    }

    pub fn available_providers(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Manages multiple initialized provider instances and a default.
pub struct ProviderManager {
    registry: Arc<RwLock<ProviderRegistry>>,
    instances: Arc<RwLock<ProviderInstanceMap>>,
    default_provider: Arc<RwLock<Option<String>>>,
}

impl ProviderManager {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(RwLock::new(ProviderRegistry::new())),
            instances: Arc::new(RwLock::new(HashMap::new())),
            default_provider: Arc::new(RwLock::new(None)),
        }
    }

    pub async fn register_provider<F>(&self, name: impl Into<String>, factory: F)
    where
        F: Fn(ProviderConfig) -> Result<Box<dyn ProviderInstance>> + Send + Sync + 'static,
    {
        let mut registry = self.registry.write().await;
        registry.register(name, factory);
    }

    pub async fn init_provider(&self, config: ProviderConfig) -> Result<()> {
        let instance_name = format!("{}:{}", config.name, config.model);

        let registry = self.registry.read().await;
        let provider = registry.create(config)?;
        provider.validate().await?;

        let mut instances = self.instances.write().await;
        instances.insert(instance_name.clone(), Arc::new(provider));

        let mut default = self.default_provider.write().await;
        if default.is_none() {
            *default = Some(instance_name);
        }
        Ok(())
    }

    pub async fn get_provider(&self, name: Option<&str>) -> Result<Arc<Box<dyn ProviderInstance>>> {
        let instances = self.instances.read().await;
        let default = self.default_provider.read().await;

        let provider_name = match name {
            Some(name) => name.to_string(),
            None => default
                .as_ref()
                .ok_or_else(|| bad_request_error("no default provider configured"))?
                .clone(),
        };

        instances
            .get(&provider_name)
            .cloned()
            .ok_or_else(|| not_found_error(format!("provider not found: {provider_name}")))
    }

    /// Lazily initializes the `backend:model` instance an LLM resource asks
    /// for, reusing it on subsequent calls for the same pair. `ProviderConfig`
    /// is built from `GRAPHFLOW_{BACKEND}_*` env vars so a backend only
    /// needs to be registered once (see `register_provider`) and every
    /// model it's asked to serve is instantiated on first use.
    pub async fn ensure_model(&self, backend: &str, model: &str) -> Result<Arc<Box<dyn ProviderInstance>>> {
        let instance_key = format!("{backend}:{model}");
        if let Some(existing) = self.instances.read().await.get(&instance_key).cloned() {
            return Ok(existing);
        }

        let mut config = ProviderConfig::from_env(backend)?;
        config.model = model.to_string();

        let registry = self.registry.read().await;
        let provider = registry.create(config)?;
        drop(registry);
        provider.validate().await?;

        let mut instances = self.instances.write().await;
        let instance = Arc::new(provider);
        instances.insert(instance_key.clone(), instance.clone());
        drop(instances);

        let mut default = self.default_provider.write().await;
        if default.is_none() {
            *default = Some(instance_key);
        }
        Ok(instance)
    }

    pub async fn set_default_provider(&self, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        let instances = self.instances.read().await;
        if !instances.contains_key(&name) {
            return Err(not_found_error(format!("cannot set default: provider '{name}' not initialized")));
        }
        let mut default = self.default_provider.write().await;
        *default = Some(name);
        Ok(())
    }

    pub async fn query_capabilities(&self, name: Option<&str>) -> Result<ProviderCapabilities> {
        let instances = self.instances.read().await;
        let default = self.default_provider.read().await;

        let provider_name = match name {
            Some(name) => name.to_string(),
            None => default
                .as_ref()
                .ok_or_else(|| bad_request_error("no default provider configured"))?
                .clone(),
        };

        instances
            .get(&provider_name)
            .ok_or_else(|| not_found_error(format!("provider not found: {provider_name}")))
            .map(|p| p.capabilities().clone())
    }

    pub async fn list_providers(&self) -> Vec<String> {
        self.instances.read().await.keys().cloned().collect()
    }

    pub async fn available_provider_types(&self) -> Vec<String> {
        self.registry
            .read()
            .await
            .available_providers()
            .into_iter()
            .map(str::to_string)
            .collect()
    }
}

impl Default for ProviderManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_capabilities_default_is_empty() {
        let caps = ProviderCapabilities::default();
        assert!(!caps.supports_streaming);
        assert!(!caps.supports_multimodal);
        assert!(caps.max_context_tokens.is_none());
        assert!(caps.available_models.is_empty());
    }

    #[test]
    fn provider_config_new_sets_sane_defaults() {
        let config = ProviderConfig::new("openai", "gpt-4");
        assert_eq!(config.name, "openai");
        assert_eq!(config.model, "gpt-4");
        assert_eq!(config.timeout_secs, Some(30));
        assert_eq!(config.max_retries, Some(3));
    }

    #[test]
    fn registry_lists_registered_names() {
        let mut registry = ProviderRegistry::new();
        registry.register("mock", |_config| Err(bad_request_error("mock provider")));
        assert_eq!(registry.available_providers(), vec!["mock"]);
    }

    #[tokio::test]
    async fn manager_tracks_registered_provider_types() {
        let manager = ProviderManager::new();
        manager.register_provider("mock", |_config| Err(bad_request_error("mock provider"))).await;
        let types = manager.available_provider_types().await;
        assert!(types.contains(&"mock".to_string()));
    }
}
