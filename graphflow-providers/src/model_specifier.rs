//! ABOUTME: ModelSpecifier for parsing provider/model syntax
//! ABOUTME: Handles "provider/model", "model", and base URL override parsing

use graphflow_core::error::bad_request_error;
use graphflow_core::Result;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Specification for a model with optional provider and base URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSpecifier {
    pub provider: Option<String>,
    pub model: String,
    pub base_url: Option<String>,
}

impl ModelSpecifier {
    pub fn new(model: impl Into<String>) -> Self {
        Self { provider: None, model: model.into(), base_url: None }
    }

    pub fn with_provider(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self { provider: Some(provider.into()), model: model.into(), base_url: None }
    }

    pub fn with_base_url(provider: impl Into<String>, model: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self { provider: Some(provider.into()), model: model.into(), base_url: Some(base_url.into()) }
    }

    /// Parses a model specification string.
    ///
    /// - `"model"` -> provider `None`
    /// - `"provider/model"` -> provider `Some("provider")`
    /// - `"provider/subprovider/model"` -> provider `Some("provider/subprovider")`
    pub fn parse(spec: &str) -> Result<Self> {
        let spec = spec.trim();
        if spec.is_empty() {
            return Err(bad_request_error("model specification cannot be empty"));
        }

        let parts: Vec<&str> = spec.split('/').collect();
        match parts.len() {
            1 => Ok(Self::new(parts[0])),
            2 => Ok(Self::with_provider(parts[0], parts[1])),
            n => {
                let provider = parts[..n - 1].join("/");
                let model = parts[n - 1];
                Ok(Self::with_provider(provider, model))
            }
        }
    }

    pub fn parse_with_base_url(spec: &str, base_url: Option<&str>) -> Result<Self> {
        let mut model_spec = Self::parse(spec)?;
        model_spec.base_url = base_url.map(str::to_string);
        Ok(model_spec)
    }

    pub fn provider_or_default<'a>(&'a self, default: &'a str) -> &'a str {
        self.provider.as_deref().unwrap_or(default)
    }

    pub fn has_provider(&self) -> bool {
        self.provider.is_some()
    }

    pub fn has_base_url(&self) -> bool {
        self.base_url.is_some()
    }
}

impl FromStr for ModelSpecifier {
    type Err = graphflow_core::error::AppError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl std::fmt::Display for ModelSpecifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.provider {
            Some(provider) => write!(f, "{provider}/{}", self.model),
            None => write!(f, "{}", self.model),
        }
    }
}
