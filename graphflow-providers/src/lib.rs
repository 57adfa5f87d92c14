//! ABOUTME: graphflow-providers implementation crate
//! ABOUTME: Provider abstraction layer and LLM provider implementations

pub mod abstraction;
pub mod model_specifier;
pub mod rig;

pub use abstraction::{
    LlmCompletion, LlmRequest, ProviderCapabilities, ProviderConfig, ProviderInstance, ProviderManager,
    ProviderRegistry,
};
pub use model_specifier::ModelSpecifier;
pub use rig::create_rig_provider;
