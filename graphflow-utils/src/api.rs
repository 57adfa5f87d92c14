//! ABOUTME: Wires a live UnifiedApi against an ExecutionContext's stores
//! ABOUTME: so the evaluator can reach Outputs/Memory/Session/Request/Items

use crate::env::lookup_env;
use crate::expr::{format_for_template, functions};
use crate::file_glob::resolve_file;
use graphflow_core::error::not_found_error;
use graphflow_core::types::ActionId;
use graphflow_core::{ExecutionContext, UnifiedApi};
use serde_json::{json, Value};
use std::sync::Arc;

/// Builds the `UnifiedApi` record backing an `ExecutionContext`: every
/// field is a thin adapter over the context's owned state, cloned into
/// each closure so the returned record is `'static` and `Send + Sync`.
pub fn build_unified_api(ctx: &ExecutionContext) -> UnifiedApi {
    let mut api = UnifiedApi::default();

    let outputs = ctx.outputs.clone();
    let memory = ctx.memory.clone();
    let session = ctx.session.clone();
    api.get = Some(Arc::new(move |name, type_hint| {
        let outputs = outputs.clone();
        let memory = memory.clone();
        let session = session.clone();
        Box::pin(async move {
            let action_id = ActionId::new(name.clone());
            if let Some(v) = outputs.read().get(&action_id).cloned() {
                return Ok(coerce(v, type_hint.as_deref()));
            }
            if let Some(v) = memory.get(&name).await? {
                return Ok(coerce(v, type_hint.as_deref()));
            }
            if let Some(v) = session.get(&name).await? {
                return Ok(coerce(v, type_hint.as_deref()));
            }
            Err(not_found_error(format!("no value bound for '{name}'")))
        })
    }));

    let memory = ctx.memory.clone();
    let session = ctx.session.clone();
    api.set = Some(Arc::new(move |key, value, storage| {
        let memory = memory.clone();
        let session = session.clone();
        Box::pin(async move {
            match storage.as_deref() {
                Some("session") => {
                    session.set(&key, value).await?;
                }
                _ => {
                    memory.set(&key, value).await?;
                }
            }
            Ok(true)
        })
    }));

    let fs_root = ctx.fs_root.clone();
    api.file = Some(Arc::new(move |pattern, selectors| {
        let fs_root = fs_root.clone();
        Box::pin(async move { resolve_file(&fs_root, &pattern, &selectors).await })
    }));

    let workflow = ctx.workflow.clone();
    let request = ctx.request.clone();
    api.info = Some(Arc::new(move |field| {
        let root = info_root(&workflow, &request);
        Box::pin(async move {
            let v = functions::safe_access(&root, &field);
            if v.is_null() {
                Err(not_found_error(format!("no info field '{field}'")))
            } else {
                Ok(v)
            }
        })
    }));

    let request = ctx.request.clone();
    api.input = Some(Arc::new(move |name, type_hint| {
        let request = request.clone();
        Box::pin(async move {
            let Some(req) = &request else {
                return Err(not_found_error("no request context for this run"));
            };
            let v = req
                .lookup(&name)
                .ok_or_else(|| not_found_error(format!("no input named '{name}'")))?;
            Ok(coerce(v, type_hint.as_deref()))
        })
    }));

    let outputs = ctx.outputs.clone();
    api.output = Some(Arc::new(move |action_id| {
        let outputs = outputs.clone();
        Box::pin(async move {
            outputs
                .read()
                .get(&ActionId::new(action_id.clone()))
                .cloned()
                .ok_or_else(|| not_found_error(format!("no output recorded for '{action_id}'")))
        })
    }));

    let session = ctx.session.clone();
    api.session = Some(Arc::new(move || {
        let session = session.clone();
        Box::pin(async move {
            let all = session.get_all().await?;
            Ok(all.into_iter().collect())
        })
    }));

    let items = ctx.items.clone();
    api.item = Some(Arc::new(move |which| {
        let items = items.clone();
        Box::pin(async move {
            let key = which.unwrap_or_else(|| "current".to_string());
            items
                .read()
                .get(&key)
                .cloned()
                .ok_or_else(|| not_found_error(format!("no item binding for '{key}'")))
        })
    }));

    api.env = Some(Arc::new(|name| Box::pin(async move { lookup_env(&name) })));

    api
}

fn info_root(
    workflow: &graphflow_core::types::Workflow,
    request: &Option<graphflow_core::types::RequestContext>,
) -> Value {
    json!({
        "workflow": {
            "name": workflow.metadata.name,
            "version": workflow.metadata.version,
            "targetActionId": workflow.metadata.target_action_id.as_str(),
        },
        "settings": {
            "agentSettings": {
                "defaultModel": workflow.settings.agent_settings.default_model,
                "defaultBackend": workflow.settings.agent_settings.default_backend,
                "debug": workflow.settings.agent_settings.debug,
            }
        },
        "request": request.as_ref().map(|r| json!({
            "method": r.method,
            "path": r.path,
            "headers": r.headers,
            "query": r.query,
            "body": r.body,
        })),
    })
}

/// Coerces a stored value toward a requested type hint (`"number"`,
/// `"bool"`/`"boolean"`, `"string"`); unrecognized hints and values that
/// cannot be coerced pass through unchanged.
fn coerce(v: Value, hint: Option<&str>) -> Value {
    match hint {
        Some("number") | Some("int") | Some("float") => match &v {
            Value::Number(_) => v,
            Value::String(s) => s.parse::<f64>().map(|n| json!(n)).unwrap_or(v),
            Value::Bool(b) => json!(if *b { 1 } else { 0 }),
            _ => v,
        },
        Some("bool") | Some("boolean") => match &v {
            Value::Bool(_) => v,
            Value::String(s) => json!(matches!(s.as_str(), "true" | "1" | "yes")),
            Value::Number(n) => json!(n.as_f64().map(|f| f != 0.0).unwrap_or(false)),
            _ => v,
        },
        Some("string") => match &v {
            Value::String(_) => v,
            other => Value::String(format_for_template(other)),
        },
        _ => v,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coerce_string_to_number() {
        assert_eq!(coerce(json!("42"), Some("number")), json!(42.0));
        assert_eq!(coerce(json!("nope"), Some("number")), json!("nope"));
    }

    #[test]
    fn coerce_string_to_bool() {
        assert_eq!(coerce(json!("true"), Some("bool")), json!(true));
        assert_eq!(coerce(json!("no"), Some("bool")), json!(false));
    }

    #[test]
    fn coerce_passes_through_without_hint() {
        assert_eq!(coerce(json!(5), None), json!(5));
    }
}
