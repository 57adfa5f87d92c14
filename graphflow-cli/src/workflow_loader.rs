//! ABOUTME: Reads a workflow document off disk and parses it into a `Workflow`

use graphflow_core::error::bad_request_error;
use graphflow_core::types::Workflow;
use graphflow_core::Result;
use std::path::Path;

pub async fn load(path: &Path) -> Result<Workflow> {
    let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
        bad_request_error(format!("failed to read workflow file {}: {e}", path.display()))
    })?;

    serde_yaml::from_str(&raw).map_err(|e| {
        bad_request_error(format!("failed to parse workflow file {}: {e}", path.display()))
    })
}
