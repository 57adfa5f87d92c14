//! ABOUTME: RequestContext - the inbound HTTP-shaped request a run may carry

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// The request that triggered this workflow run, when the engine is
/// invoked behind an API surface. Entirely optional: batch or scheduled
/// runs construct an `ExecutionContext` with `request: None`, and the
/// `input()` API function errors when called without one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestContext {
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub query: BTreeMap<String, String>,
    #[serde(default)]
    pub body: Value,
}

impl RequestContext {
    /// Look up a named value across body, query, then headers/path segments,
    /// mirroring the precedence `input()` uses.
    pub fn lookup(&self, name: &str) -> Option<Value> {
        if let Value::Object(map) = &self.body {
            if let Some(v) = map.get(name) {
                return Some(v.clone());
            }
        }
        if let Some(v) = self.query.get(name) {
            return Some(Value::String(v.clone()));
        }
        if let Some(v) = self.headers.get(name) {
            return Some(Value::String(v.clone()));
        }
        None
    }
}
