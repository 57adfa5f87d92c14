//! ABOUTME: SQL executor - opens a driver-keyed sqlite connection, binds
//! ABOUTME: evaluated parameters and distinguishes queries from mutations

use crate::support::evaluate_to_string;
use async_trait::async_trait;
use graphflow_core::error::{bad_request_error, resource_error};
use graphflow_core::traits::executor::Executor;
use graphflow_core::types::ResourceKind;
use graphflow_core::{ExecutionContext, Result};
use graphflow_utils::Evaluator;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Only the embedded sqlite driver is wired up; other driver names are
/// rejected up front rather than silently falling through to sqlite.
const SUPPORTED_DRIVER: &str = "sqlite";

pub struct SqlExecutor {
    databases: Mutex<HashMap<String, Arc<libsql::Database>>>,
}

impl SqlExecutor {
    pub fn new() -> Self {
        Self {
            databases: Mutex::new(HashMap::new()),
        }
    }

    async fn database_for(&self, dsn: &str) -> Result<Arc<libsql::Database>> {
        let mut guard = self.databases.lock().await;
        if let Some(db) = guard.get(dsn) {
            return Ok(db.clone());
        }
        let db = libsql::Builder::new_local(dsn)
            .build()
            .await
            .map_err(|e| resource_error(format!("failed to open sqlite database '{dsn}': {e}")))?;
        let db = Arc::new(db);
        guard.insert(dsn.to_string(), db.clone());
        Ok(db)
    }
}

impl Default for SqlExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Executor for SqlExecutor {
    fn kind_label(&self) -> &'static str {
        "sql"
    }

    async fn execute(&self, ctx: &ExecutionContext, kind: &ResourceKind) -> Result<Value> {
        let ResourceKind::Sql(cfg) = kind else {
            return Err(bad_request_error("SqlExecutor received a non-sql resource"));
        };
        if cfg.driver != SUPPORTED_DRIVER {
            return Err(bad_request_error(format!(
                "unsupported sql driver '{}': only '{SUPPORTED_DRIVER}' is wired",
                cfg.driver
            )));
        }

        let evaluator = Evaluator::new(ctx.api.clone(), Map::new());
        let dsn = evaluate_to_string(&evaluator, &cfg.dsn).await?;
        let statement = evaluate_to_string(&evaluator, &cfg.statement).await?;

        let mut params = Vec::with_capacity(cfg.params.len());
        for expr in &cfg.params {
            params.push(to_libsql_value(evaluator.evaluate(expr).await?));
        }

        let db = self.database_for(&dsn).await?;
        let conn = db
            .connect()
            .map_err(|e| resource_error(format!("failed to open sqlite connection to '{dsn}': {e}")))?;

        let trimmed = statement.trim_start();
        let is_query = trimmed[..trimmed.len().min(6)].eq_ignore_ascii_case("select")
            || trimmed[..trimmed.len().min(6)].eq_ignore_ascii_case("pragma");

        if is_query {
            let mut rows = conn
                .query(&statement, params)
                .await
                .map_err(|e| resource_error(format!("sql query failed: {e}")))?;
            let mut out = Vec::new();
            while let Some(row) = rows
                .next()
                .await
                .map_err(|e| resource_error(format!("sql row read failed: {e}")))?
            {
                let mut record = Map::new();
                for idx in 0..rows.column_count() {
                    let name = rows
                        .column_name(idx)
                        .map_or_else(|| idx.to_string(), ToString::to_string);
                    let value = row
                        .get_value(idx)
                        .map_err(|e| resource_error(format!("sql column read failed: {e}")))?;
                    record.insert(name, from_libsql_value(value));
                }
                out.push(Value::Object(record));
            }
            Ok(json!({ "rows": out }))
        } else {
            let affected = conn
                .execute(&statement, params)
                .await
                .map_err(|e| resource_error(format!("sql statement failed: {e}")))?;
            Ok(json!({ "affected": affected }))
        }
    }
}

fn to_libsql_value(value: Value) -> libsql::Value {
    match value {
        Value::Null => libsql::Value::Null,
        Value::Bool(b) => libsql::Value::Integer(i64::from(b)),
        Value::Number(n) => n.as_i64().map_or_else(
            || libsql::Value::Real(n.as_f64().unwrap_or_default()),
            libsql::Value::Integer,
        ),
        Value::String(s) => libsql::Value::Text(s),
        other => libsql::Value::Text(other.to_string()),
    }
}

fn from_libsql_value(value: libsql::Value) -> Value {
    match value {
        libsql::Value::Null => Value::Null,
        libsql::Value::Integer(i) => json!(i),
        libsql::Value::Real(f) => json!(f),
        libsql::Value::Text(s) => Value::String(s),
        libsql::Value::Blob(b) => json!(base64_encode(&b)),
    }
}

fn base64_encode(bytes: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(bytes)
}
