//! ABOUTME: `graphflow run` - executes a workflow file through to its target

use crate::cli::OutputFormat;
use crate::{wiring, workflow_loader};
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

pub async fn run(workflow_path: &Path, session: &str, output: OutputFormat) -> Result<()> {
    let workflow = workflow_loader::load(workflow_path)
        .await
        .with_context(|| format!("loading workflow {}", workflow_path.display()))?;

    let engine = wiring::build_engine().await.context("wiring up the execution engine")?;

    let result = engine
        .execute(Arc::new(workflow), None, session)
        .await
        .context("executing workflow")?;

    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string(&result)?),
        OutputFormat::Pretty => println!("{}", serde_json::to_string_pretty(&result)?),
    }

    Ok(())
}
