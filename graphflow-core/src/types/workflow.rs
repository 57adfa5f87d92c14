//! ABOUTME: The top-level Workflow document and its settings block

use super::ids::ActionId;
use super::resource::Resource;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowMetadata {
    pub name: String,
    pub version: String,
    pub target_action_id: ActionId,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentSettings {
    #[serde(default)]
    pub default_model: Option<String>,
    #[serde(default)]
    pub default_backend: Option<String>,
    #[serde(default)]
    pub debug: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub agent_settings: AgentSettings,
}

/// Top-level immutable spec: the engine never mutates a `Workflow` once
/// it has been handed to `Execute` — all mutable state lives on the
/// `ExecutionContext` created for that run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub metadata: WorkflowMetadata,
    #[serde(default)]
    pub settings: Settings,
    pub resources: Vec<Resource>,
}

impl Workflow {
    pub fn target_action_id(&self) -> &ActionId {
        &self.metadata.target_action_id
    }

    pub fn find_resource(&self, id: &ActionId) -> Option<&Resource> {
        self.resources.iter().find(|r| r.action_id() == id)
    }
}
