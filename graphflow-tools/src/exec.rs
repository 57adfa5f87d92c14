//! ABOUTME: Exec executor - runs a shell command, either with explicit args
//! ABOUTME: or wrapped in a shell, and reports its exit status and output

use crate::process::run_with_timeout;
use crate::support::{evaluate_to_string, resolve_timeout};
use async_trait::async_trait;
use graphflow_core::error::bad_request_error;
use graphflow_core::traits::executor::Executor;
use graphflow_core::types::ResourceKind;
use graphflow_core::{ExecutionContext, Result};
use graphflow_utils::Evaluator;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub struct ExecExecutor;

impl ExecExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ExecExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Executor for ExecExecutor {
    fn kind_label(&self) -> &'static str {
        "exec"
    }

    async fn execute(&self, ctx: &ExecutionContext, kind: &ResourceKind) -> Result<Value> {
        let ResourceKind::Exec(cfg) = kind else {
            return Err(bad_request_error("ExecExecutor received a non-exec resource"));
        };

        let evaluator = Evaluator::new(ctx.api.clone(), Map::new());
        let command_str = evaluate_to_string(&evaluator, &cfg.command).await?;

        let mut env = BTreeMap::new();
        for (name, expr) in &cfg.env {
            env.insert(name.clone(), evaluate_to_string(&evaluator, expr).await?);
        }

        let timeout = resolve_timeout(&evaluator, cfg.timeout_duration.as_ref(), DEFAULT_TIMEOUT).await?;

        let (program, args, display_command) = match &cfg.args {
            Some(arg_exprs) => {
                let mut values = Vec::with_capacity(arg_exprs.len());
                for expr in arg_exprs {
                    values.push(evaluate_to_string(&evaluator, expr).await?);
                }
                let escaped: Vec<String> = values.iter().map(|v| shell_escape_if_json(v)).collect();
                let display = format!("{command_str} {}", escaped.join(" "));
                (command_str.clone(), values, display)
            }
            None => {
                let (shell, flag) = if cfg!(windows) { ("cmd", "/C") } else { ("sh", "-c") };
                (
                    shell.to_string(),
                    vec![flag.to_string(), command_str.clone()],
                    command_str.clone(),
                )
            }
        };

        let output = run_with_timeout(&program, &args, &env, timeout).await?;
        let success = !output.timed_out && output.exit_code == Some(0);

        Ok(json!({
            "success": success,
            "exitCode": output.exit_code,
            "stdout": output.stdout.clone(),
            "stderr": output.stderr,
            "command": display_command,
            "result": output.stdout.trim_end(),
            "timedOut": output.timed_out,
        }))
    }
}

/// Values that look like a JSON object or array get shell-quoted so a
/// literal `{...}`/`[...]` survives an unquoted `sh -c` pass-through.
fn shell_escape_if_json(value: &str) -> String {
    let trimmed = value.trim_start();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        shell_words::quote(value).into_owned()
    } else {
        value.to_string()
    }
}
