//! ABOUTME: Small helpers shared by the resource executors - expression
//! ABOUTME: evaluation to a plain string and duration parsing with a fallback

use graphflow_core::error::Result;
use graphflow_core::types::Expression;
use graphflow_utils::{format_for_template, Evaluator};
use std::time::Duration;

pub async fn evaluate_to_string(evaluator: &Evaluator, expr: &Expression) -> Result<String> {
    let value = evaluator.evaluate(expr).await?;
    Ok(format_for_template(&value))
}

pub async fn resolve_timeout(
    evaluator: &Evaluator,
    expr: Option<&Expression>,
    default: Duration,
) -> Result<Duration> {
    let Some(expr) = expr else {
        return Ok(default);
    };
    let raw = evaluate_to_string(evaluator, expr).await?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(default);
    }
    Ok(humantime::parse_duration(trimmed).unwrap_or(default))
}
