//! ABOUTME: Error taxonomy for the graphflow runtime
//! ABOUTME: Provides AppError, ErrorKind, and the wrapping helpers used across crates

use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Tagged error classification shared by every component in the runtime.
///
/// Each kind maps to one failure mode described by the engine's error
/// handling design: validation failures surface field-level detail,
/// preflight/expression/timeout errors carry enough context to explain
/// *why* a resource did not run, and `DependencyFailed` lets a resource
/// blame a prior resource instead of re-deriving the same failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Validation,
    PreflightFailed,
    ResourceFailed,
    ExpressionErr,
    Timeout,
    NotFound,
    BadRequest,
    DependencyFailed,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Validation => "validation",
            Self::PreflightFailed => "preflight_failed",
            Self::ResourceFailed => "resource_failed",
            Self::ExpressionErr => "expression_error",
            Self::Timeout => "timeout",
            Self::NotFound => "not_found",
            Self::BadRequest => "bad_request",
            Self::DependencyFailed => "dependency_failed",
        };
        write!(f, "{s}")
    }
}

use serde::{Deserialize, Serialize};

/// A single field validation failure, as attached to `ErrorKind::Validation` details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub message: String,
    pub value: Option<Value>,
}

/// The runtime's single error type.
///
/// `AppError` is always constructed through one of the `*_error` helpers
/// below so that `resource_id` is attached exactly once: if the wrapped
/// error is already an `AppError`, wrapping only fills in the resource id
/// (it never re-wraps the kind or overwrites existing details).
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct AppError {
    pub kind: ErrorKind,
    pub message: String,
    pub resource_id: Option<String>,
    pub details: HashMap<String, Value>,
    #[source]
    pub wrapped: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            resource_id: None,
            details: HashMap::new(),
            wrapped: None,
        }
    }

    #[must_use]
    pub fn with_resource(mut self, resource_id: impl Into<String>) -> Self {
        if self.resource_id.is_none() {
            self.resource_id = Some(resource_id.into());
        }
        self
    }

    #[must_use]
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_wrapped(mut self, err: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.wrapped = Some(Box::new(err));
        self
    }

    pub fn is_kind(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }
}

/// Attach a resource id to an error, preserving the kind/details if the
/// error already is an `AppError` and only filling in the id once.
pub fn wrap_for_resource(err: AppError, resource_id: &str) -> AppError {
    err.with_resource(resource_id.to_string())
}

pub fn validation_error(message: impl Into<String>, fields: Vec<FieldError>) -> AppError {
    let value = serde_json::to_value(&fields).unwrap_or(Value::Null);
    AppError::new(ErrorKind::Validation, message).with_detail("fields", value)
}

pub fn preflight_error(code: impl Into<String>, message: impl Into<String>) -> AppError {
    let code = code.into();
    AppError::new(ErrorKind::PreflightFailed, message).with_detail("code", Value::String(code))
}

pub fn resource_error(message: impl Into<String>) -> AppError {
    AppError::new(ErrorKind::ResourceFailed, message)
}

pub fn expression_error(expression: impl Into<String>, message: impl Into<String>) -> AppError {
    let expr = expression.into();
    AppError::new(ErrorKind::ExpressionErr, message).with_detail("expression", Value::String(expr))
}

pub fn timeout_error(message: impl Into<String>) -> AppError {
    AppError::new(ErrorKind::Timeout, message)
}

pub fn not_found_error(message: impl Into<String>) -> AppError {
    AppError::new(ErrorKind::NotFound, message)
}

pub fn bad_request_error(message: impl Into<String>) -> AppError {
    AppError::new(ErrorKind::BadRequest, message)
}

pub fn dependency_failed_error(message: impl Into<String>) -> AppError {
    AppError::new(ErrorKind::DependencyFailed, message)
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_for_resource_only_sets_id_once() {
        let err = resource_error("boom").with_resource("a");
        let wrapped = wrap_for_resource(err, "b");
        assert_eq!(wrapped.resource_id.as_deref(), Some("a"));
    }

    #[test]
    fn validation_error_carries_field_list() {
        let err = validation_error(
            "bad input",
            vec![FieldError {
                field: "url".into(),
                type_: "string".into(),
                message: "must not be empty".into(),
                value: None,
            }],
        );
        assert!(err.is_kind(ErrorKind::Validation));
        assert!(err.details.contains_key("fields"));
    }
}
