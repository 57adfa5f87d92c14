//! ABOUTME: `graphflow validate` - parses a workflow and checks its
//! ABOUTME: dependency graph (cycles, missing requirements) without running it

use crate::workflow_loader;
use anyhow::{Context, Result};
use graphflow_workflows::DependencyGraph;
use std::path::Path;

pub async fn validate(workflow_path: &Path) -> Result<()> {
    let workflow = workflow_loader::load(workflow_path)
        .await
        .with_context(|| format!("loading workflow {}", workflow_path.display()))?;

    let mut graph = DependencyGraph::new();
    for resource in &workflow.resources {
        graph.add_resource(resource.clone())?;
    }
    graph.build()?;
    let order = graph.get_execution_order(workflow.target_action_id())?;

    println!(
        "{} is valid: {} resource(s), execution order to '{}': {}",
        workflow_path.display(),
        workflow.resources.len(),
        workflow.target_action_id(),
        order
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" -> ")
    );

    Ok(())
}
