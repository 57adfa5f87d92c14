//! ABOUTME: Python executor - ensures a virtualenv via the VenvManager seam,
//! ABOUTME: then runs an inline script or a file relative to the fs root

use crate::process::run_with_timeout;
use crate::support::{evaluate_to_string, resolve_timeout};
use async_trait::async_trait;
use graphflow_core::error::{bad_request_error, resource_error, timeout_error};
use graphflow_core::traits::executor::Executor;
use graphflow_core::types::{Expression, ResourceKind};
use graphflow_core::{ExecutionContext, Result};
use graphflow_utils::{format_for_template, Evaluator};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// External collaborator that prepares interpreters. Backed by whatever the
/// host process uses to materialise virtualenvs (`python -m venv` plus pip,
/// a pooled environment cache, ...); the executor only needs the resulting
/// paths.
#[async_trait]
pub trait VenvManager: Send + Sync {
    async fn ensure_venv(
        &self,
        python_version: &str,
        packages: &[String],
        requirements_file: Option<&str>,
        venv_name: Option<&str>,
    ) -> Result<String>;

    async fn python_path(&self, venv_path: &str) -> Result<String>;
}

pub struct PythonExecutor {
    venv_manager: Arc<dyn VenvManager>,
}

impl PythonExecutor {
    pub fn new(venv_manager: Arc<dyn VenvManager>) -> Self {
        Self { venv_manager }
    }
}

#[async_trait]
impl Executor for PythonExecutor {
    fn kind_label(&self) -> &'static str {
        "python"
    }

    async fn execute(&self, ctx: &ExecutionContext, kind: &ResourceKind) -> Result<Value> {
        let ResourceKind::Python(cfg) = kind else {
            return Err(bad_request_error("PythonExecutor received a non-python resource"));
        };

        let evaluator = Evaluator::new(ctx.api.clone(), Map::new());
        let venv_path = self
            .venv_manager
            .ensure_venv(
                &cfg.python_version,
                &cfg.packages,
                cfg.requirements_file.as_deref(),
                cfg.venv_name.as_deref(),
            )
            .await?;
        let python_path = self.venv_manager.python_path(&venv_path).await?;
        let timeout = resolve_timeout(&evaluator, cfg.timeout_duration.as_ref(), DEFAULT_TIMEOUT).await?;

        let (script_path, _tmp) = match (&cfg.script, &cfg.file) {
            (Some(script_expr), _) => {
                let raw = evaluator.evaluate(script_expr).await?;
                let mut text = format_for_template(&raw);
                if text.contains("{{") {
                    text = evaluate_to_string(&evaluator, &Expression::interpolated(text)).await?;
                }
                let tmp = tempfile::Builder::new()
                    .prefix("graphflow-py-")
                    .suffix(".py")
                    .tempfile()
                    .map_err(|e| resource_error(format!("failed to create temp script: {e}")))?;
                tokio::fs::write(tmp.path(), text)
                    .await
                    .map_err(|e| resource_error(format!("failed to write temp script: {e}")))?;
                (tmp.path().to_string_lossy().into_owned(), Some(tmp))
            }
            (None, Some(file_expr)) => {
                let rel = evaluate_to_string(&evaluator, file_expr).await?;
                let path = Path::new(&ctx.fs_root).join(rel);
                (path.to_string_lossy().into_owned(), None)
            }
            (None, None) => {
                return Err(bad_request_error("python resource requires either `script` or `file`"));
            }
        };

        let output = run_with_timeout(&python_path, &[script_path], &BTreeMap::new(), timeout).await?;

        if output.timed_out {
            return Err(timeout_error(format!("python script timed out after {timeout:?}")));
        }
        if output.exit_code != Some(0) {
            return Err(resource_error("python script exited with a non-zero status")
                .with_detail("stdout", output.stdout)
                .with_detail("stderr", output.stderr)
                .with_detail("exitCode", json!(output.exit_code)));
        }

        Ok(Value::String(output.stdout))
    }
}
