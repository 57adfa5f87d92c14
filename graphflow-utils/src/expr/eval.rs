//! ABOUTME: Async evaluator that walks a compiled Ast (or scans a mustache
//! ABOUTME: template) against the merged environment and UnifiedApi

use super::ast::{Ast, BinOp, Parser, UnOp};
use super::functions;
use graphflow_core::error::{bad_request_error, expression_error, not_found_error, Result};
use graphflow_core::types::{Expression, ExpressionKind};
use graphflow_core::UnifiedApi;
use serde_json::{json, Map, Value};
use std::future::Future;
use std::pin::Pin;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Walks a parsed `Ast` (or a raw mustache template) against a merged
/// environment: caller-supplied bindings first, the `UnifiedApi` second.
///
/// Template-mode evaluation (inside `{{ ... }}`) swallows API errors to
/// typed defaults so a missing key renders as empty rather than aborting
/// the whole workflow. Direct-expression evaluation propagates them as
/// `ExpressionErr` - two exceptions, `file` and `info`, are noted inline.
#[derive(Clone)]
pub struct Evaluator {
    api: UnifiedApi,
    env: Map<String, Value>,
}

impl Evaluator {
    pub fn new(api: UnifiedApi, env: Map<String, Value>) -> Self {
        Self { api, env }
    }

    fn with_binding(&self, name: &str, value: Value) -> Self {
        let mut env = self.env.clone();
        env.insert(name.to_string(), value);
        Self {
            api: self.api.clone(),
            env,
        }
    }

    pub async fn evaluate(&self, expr: &Expression) -> Result<Value> {
        match expr.kind {
            ExpressionKind::Literal => Ok(Value::String(expr.raw.clone())),
            ExpressionKind::Direct => {
                let ast = Parser::parse(&expr.raw)
                    .map_err(|e| expression_error(&expr.raw, e.to_string()))?;
                self.eval_ast(&ast, false).await
            }
            ExpressionKind::Interpolated => self.eval_interpolated(&expr.raw).await,
        }
    }

    /// Walks an arbitrary JSON tree (e.g. an `apiResponse` resource's
    /// `Response` config) evaluating every string leaf as an expression and
    /// recursing into maps/sequences. Non-string primitives pass through
    /// unchanged; this is how a YAML-authored response body gets its
    /// `{{ ... }}` blocks and bare `get('q')`-style calls resolved.
    pub fn deep_evaluate<'a>(&'a self, value: &'a Value) -> BoxFuture<'a, Result<Value>> {
        Box::pin(async move {
            match value {
                Value::String(s) => {
                    let expr = super::detect(s).map_err(|e| expression_error(s, e))?;
                    self.evaluate(&expr).await
                }
                Value::Array(items) => {
                    let mut out = Vec::with_capacity(items.len());
                    for item in items {
                        out.push(self.deep_evaluate(item).await?);
                    }
                    Ok(Value::Array(out))
                }
                Value::Object(map) => {
                    let mut out = Map::with_capacity(map.len());
                    for (k, v) in map {
                        out.insert(k.clone(), self.deep_evaluate(v).await?);
                    }
                    Ok(Value::Object(out))
                }
                other => Ok(other.clone()),
            }
        })
    }

    /// Evaluates a single `{{ ... }}` body (already stripped of braces).
    async fn eval_template_expr(&self, src: &str) -> Result<Value> {
        let ast = Parser::parse(src).map_err(|e| expression_error(src, e.to_string()))?;
        self.eval_ast(&ast, true).await
    }

    async fn eval_interpolated(&self, raw: &str) -> Result<Value> {
        let trimmed = raw.trim();
        if let Some(inner) = whole_template_body(trimmed) {
            return self.eval_template_expr(inner.trim()).await;
        }

        let mut out = String::new();
        let mut rest = raw;
        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let Some(end) = after.find("}}") else {
                out.push_str(&rest[start..]);
                rest = "";
                break;
            };
            let inner = &after[..end];
            let value = self.eval_template_expr(inner.trim()).await?;
            out.push_str(&format_for_template(&value));
            rest = &after[end + 2..];
        }
        out.push_str(rest);
        Ok(Value::String(out))
    }

    fn eval_ast<'a>(&'a self, ast: &'a Ast, template: bool) -> BoxFuture<'a, Result<Value>> {
        Box::pin(async move {
            match ast {
                Ast::Literal(v) => Ok(v.clone()),
                Ast::Ident(name) => self.resolve_ident(name, template).await,
                Ast::Member(base, field) => {
                    let b = self.eval_ast(base, template).await?;
                    Ok(member_get(&b, field))
                }
                Ast::Index(base, idx) => {
                    let b = self.eval_ast(base, template).await?;
                    let i = self.eval_ast(idx, template).await?;
                    Ok(index_get(&b, &i))
                }
                Ast::Unary(UnOp::Not, inner) => {
                    Ok(Value::Bool(!truthy(&self.eval_ast(inner, template).await?)))
                }
                Ast::Unary(UnOp::Neg, inner) => {
                    let v = self.eval_ast(inner, template).await?;
                    let n = v
                        .as_f64()
                        .ok_or_else(|| expression_error("-", "operand is not a number"))?;
                    Ok(json!(-n))
                }
                Ast::Binary(op, lhs, rhs) => self.eval_binary(*op, lhs, rhs, template).await,
                Ast::Ternary(cond, then_b, else_b) => {
                    if truthy(&self.eval_ast(cond, template).await?) {
                        self.eval_ast(then_b, template).await
                    } else {
                        self.eval_ast(else_b, template).await
                    }
                }
                Ast::Call(name, args) => self.eval_call(name, args, template).await,
                Ast::Lambda(..) => Err(bad_request_error(
                    "lambda expressions may only appear as filter/map/all/any arguments",
                )),
            }
        })
    }

    async fn eval_binary(&self, op: BinOp, lhs: &Ast, rhs: &Ast, template: bool) -> Result<Value> {
        if matches!(op, BinOp::And) {
            let l = self.eval_ast(lhs, template).await?;
            if !truthy(&l) {
                return Ok(Value::Bool(false));
            }
            return Ok(Value::Bool(truthy(&self.eval_ast(rhs, template).await?)));
        }
        if matches!(op, BinOp::Or) {
            let l = self.eval_ast(lhs, template).await?;
            if truthy(&l) {
                return Ok(Value::Bool(true));
            }
            return Ok(Value::Bool(truthy(&self.eval_ast(rhs, template).await?)));
        }

        let l = self.eval_ast(lhs, template).await?;
        let r = self.eval_ast(rhs, template).await?;

        match op {
            BinOp::Eq => Ok(Value::Bool(l == r)),
            BinOp::Ne => Ok(Value::Bool(l != r)),
            BinOp::Add => Ok(add_values(&l, &r)),
            BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod => {
                let a = l
                    .as_f64()
                    .ok_or_else(|| expression_error("arithmetic", "left operand is not a number"))?;
                let b = r
                    .as_f64()
                    .ok_or_else(|| expression_error("arithmetic", "right operand is not a number"))?;
                match op {
                    BinOp::Sub => Ok(json!(a - b)),
                    BinOp::Mul => Ok(json!(a * b)),
                    BinOp::Div => {
                        if b == 0.0 {
                            Err(expression_error("/", "division by zero"))
                        } else {
                            Ok(json!(a / b))
                        }
                    }
                    BinOp::Mod => {
                        if b == 0.0 {
                            Err(expression_error("%", "modulo by zero"))
                        } else {
                            Ok(json!(a % b))
                        }
                    }
                    _ => unreachable!(),
                }
            }
            BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => compare_values(op, &l, &r),
            BinOp::And | BinOp::Or => unreachable!("handled above"),
        }
    }

    async fn resolve_ident(&self, name: &str, template: bool) -> Result<Value> {
        if let Some(v) = self.env.get(name) {
            return Ok(v.clone());
        }
        match &self.api.get {
            Some(get) => match get(name.to_string(), None).await {
                Ok(v) => Ok(v),
                Err(e) => {
                    if template {
                        Ok(Value::String(String::new()))
                    } else {
                        Err(e)
                    }
                }
            },
            None => {
                if template {
                    Ok(Value::String(String::new()))
                } else {
                    Err(not_found_error(format!("unbound identifier '{name}'")))
                }
            }
        }
    }

    async fn eval_call(&self, name: &str, args: &[Ast], template: bool) -> Result<Value> {
        let base = name.strip_suffix("@method").unwrap_or(name);

        if matches!(base, "filter" | "map" | "all" | "any") {
            return self.eval_higher_order(base, args, template).await;
        }
        if base == "@array" {
            let mut items = Vec::with_capacity(args.len());
            for a in args {
                items.push(self.eval_ast(a, template).await?);
            }
            return Ok(Value::Array(items));
        }

        let mut vals = Vec::with_capacity(args.len());
        for a in args {
            vals.push(self.eval_ast(a, template).await?);
        }

        match base {
            "json" => Ok(functions::json_encode(vals.first().unwrap_or(&Value::Null))),
            "debug" => Ok(functions::debug_encode(vals.first().unwrap_or(&Value::Null))),
            "safe" => {
                let root = vals.first().cloned().unwrap_or(Value::Null);
                let path = vals.get(1).and_then(Value::as_str).unwrap_or_default();
                Ok(functions::safe_access(&root, path))
            }
            "default" => {
                let mut it = vals.into_iter();
                let v = it.next().unwrap_or(Value::Null);
                let fallback = it.next().unwrap_or(Value::Null);
                Ok(functions::default_value(v, fallback))
            }
            "len" => Ok(json!(value_len(vals.first().unwrap_or(&Value::Null)))),
            "get" => self.call_get(&vals, template).await,
            "set" => self.call_set(&vals, template).await,
            "file" => self.call_file(&vals).await,
            "info" => self.call_info(&vals, template).await,
            "input" => self.call_input(&vals, template).await,
            "output" => self.call_output(&vals, template).await,
            "session" => self.call_session(template).await,
            "item" => self.call_item(&vals, template).await,
            "env" => self.call_env(&vals, template).await,
            other => Err(bad_request_error(format!("unknown function '{other}'"))),
        }
    }

    async fn eval_higher_order(&self, base: &str, args: &[Ast], template: bool) -> Result<Value> {
        if args.len() != 2 {
            return Err(bad_request_error(format!("{base} takes a list and a lambda")));
        }
        let list_val = self.eval_ast(&args[0], template).await?;
        let Ast::Lambda(param, body) = &args[1] else {
            return Err(bad_request_error(format!("{base} requires a lambda argument")));
        };
        let items = match list_val {
            Value::Array(a) => a,
            other => return Err(bad_request_error(format!("{base} requires an array, got {other:?}"))),
        };

        match base {
            "filter" => {
                let mut out = Vec::new();
                for item in items {
                    let scoped = self.with_binding(param, item.clone());
                    if truthy(&scoped.eval_ast(body, template).await?) {
                        out.push(item);
                    }
                }
                Ok(Value::Array(out))
            }
            "map" => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    let scoped = self.with_binding(param, item);
                    out.push(scoped.eval_ast(body, template).await?);
                }
                Ok(Value::Array(out))
            }
            "all" => {
                for item in items {
                    let scoped = self.with_binding(param, item);
                    if !truthy(&scoped.eval_ast(body, template).await?) {
                        return Ok(Value::Bool(false));
                    }
                }
                Ok(Value::Bool(true))
            }
            "any" => {
                for item in items {
                    let scoped = self.with_binding(param, item);
                    if truthy(&scoped.eval_ast(body, template).await?) {
                        return Ok(Value::Bool(true));
                    }
                }
                Ok(Value::Bool(false))
            }
            _ => unreachable!(),
        }
    }

    async fn call_get(&self, vals: &[Value], template: bool) -> Result<Value> {
        let Some(name) = vals.first().and_then(Value::as_str) else {
            return Err(bad_request_error("get(name) requires a string key"));
        };
        let default = vals.get(1).and_then(Value::as_str).map(str::to_string);
        match &self.api.get {
            Some(get) => match get(name.to_string(), default).await {
                Ok(v) => Ok(v),
                Err(e) => swallow(template, e, Value::Null),
            },
            None => swallow(template, not_found_error(format!("no value for '{name}'")), Value::Null),
        }
    }

    async fn call_set(&self, vals: &[Value], template: bool) -> Result<Value> {
        let Some(name) = vals.first().and_then(Value::as_str) else {
            return Err(bad_request_error("set(name, value) requires a string key"));
        };
        let value = vals.get(1).cloned().unwrap_or(Value::Null);
        let scope = vals.get(2).and_then(Value::as_str).map(str::to_string);
        match &self.api.set {
            Some(set) => match set(name.to_string(), value, scope).await {
                Ok(ok) => Ok(Value::Bool(ok)),
                Err(e) => swallow(template, e, Value::Bool(false)),
            },
            None => swallow(template, not_found_error("set api not configured"), Value::Bool(false)),
        }
    }

    /// `file()` always surfaces its error, in templates and direct expressions alike.
    async fn call_file(&self, vals: &[Value]) -> Result<Value> {
        let Some(pattern) = vals.first().and_then(Value::as_str) else {
            return Err(bad_request_error("file(pattern, ...) requires a string pattern"));
        };
        let selectors: Vec<String> = vals[1..]
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect();
        match &self.api.file {
            Some(file) => file(pattern.to_string(), selectors).await,
            None => Err(not_found_error("file api not configured")),
        }
    }

    async fn call_info(&self, vals: &[Value], template: bool) -> Result<Value> {
        let Some(name) = vals.first().and_then(Value::as_str) else {
            return Err(bad_request_error("info(name) requires a string key"));
        };
        match &self.api.info {
            Some(info) => match info(name.to_string()).await {
                Ok(v) => Ok(v),
                Err(e) => swallow(template, e, Value::Null),
            },
            None => swallow(template, not_found_error("info api not configured"), Value::Null),
        }
    }

    async fn call_input(&self, vals: &[Value], template: bool) -> Result<Value> {
        let Some(name) = vals.first().and_then(Value::as_str) else {
            return Err(bad_request_error("input(name) requires a string key"));
        };
        let default = vals.get(1).and_then(Value::as_str).map(str::to_string);
        match &self.api.input {
            Some(input) => match input(name.to_string(), default).await {
                Ok(v) => Ok(v),
                Err(e) => swallow(template, e, Value::Null),
            },
            None => swallow(template, not_found_error("input api not configured"), Value::Null),
        }
    }

    async fn call_output(&self, vals: &[Value], template: bool) -> Result<Value> {
        let Some(action_id) = vals.first().and_then(Value::as_str) else {
            return Err(bad_request_error("output(actionId) requires a string key"));
        };
        match &self.api.output {
            Some(output) => match output(action_id.to_string()).await {
                Ok(v) => Ok(v),
                Err(e) => swallow(template, e, Value::Null),
            },
            None => swallow(template, not_found_error("output api not configured"), Value::Null),
        }
    }

    async fn call_session(&self, template: bool) -> Result<Value> {
        match &self.api.session {
            Some(session) => match session().await {
                Ok(map) => Ok(Value::Object(map)),
                Err(e) => swallow(template, e, Value::Object(Map::new())),
            },
            None => swallow(template, not_found_error("session api not configured"), Value::Object(Map::new())),
        }
    }

    async fn call_item(&self, vals: &[Value], template: bool) -> Result<Value> {
        let which = vals.first().and_then(Value::as_str).map(str::to_string);
        let default = match which.as_deref() {
            Some("index") | Some("count") => json!(0),
            Some("all") => Value::Array(vec![]),
            _ => Value::Null,
        };
        match &self.api.item {
            Some(item) => match item(which).await {
                Ok(v) => Ok(v),
                Err(e) => swallow(template, e, default),
            },
            None => swallow(template, not_found_error("item api not configured"), default),
        }
    }

    async fn call_env(&self, vals: &[Value], template: bool) -> Result<Value> {
        let Some(name) = vals.first().and_then(Value::as_str) else {
            return Err(bad_request_error("env(name) requires a string key"));
        };
        match &self.api.env {
            Some(env) => match env(name.to_string()).await {
                Ok(v) => Ok(Value::String(v)),
                Err(e) => swallow(template, e, Value::Null),
            },
            None => swallow(template, not_found_error("env api not configured"), Value::Null),
        }
    }
}

fn swallow(template: bool, err: graphflow_core::error::AppError, default: Value) -> Result<Value> {
    if template {
        Ok(default)
    } else {
        Err(err)
    }
}

/// `Some(inner)` when `trimmed` is exactly one `{{ ... }}` block with no
/// surrounding text, so the caller can return the evaluated native type
/// instead of stringifying it.
fn whole_template_body(trimmed: &str) -> Option<&str> {
    let inner = trimmed.strip_prefix("{{")?.strip_suffix("}}")?;
    if inner.contains("{{") || inner.contains("}}") {
        return None;
    }
    Some(inner)
}

fn member_get(v: &Value, field: &str) -> Value {
    match v {
        Value::Object(m) => m.get(field).cloned().unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

fn index_get(v: &Value, idx: &Value) -> Value {
    match v {
        Value::Array(a) => idx
            .as_f64()
            .and_then(|n| a.get(n as usize).cloned())
            .unwrap_or(Value::Null),
        Value::Object(m) => idx
            .as_str()
            .and_then(|s| m.get(s).cloned())
            .unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

/// Truthiness used by `&&`/`||`/ternary/preflight validations: `null`,
/// `false`, `0`, `""` and empty arrays/objects are falsy.
pub fn truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(m) => !m.is_empty(),
    }
}

fn value_len(v: &Value) -> f64 {
    match v {
        Value::String(s) => s.chars().count() as f64,
        Value::Array(a) => a.len() as f64,
        Value::Object(m) => m.len() as f64,
        _ => 0.0,
    }
}

fn add_values(l: &Value, r: &Value) -> Value {
    if let (Some(a), Some(b)) = (l.as_f64(), r.as_f64()) {
        if l.is_number() && r.is_number() {
            return json!(a + b);
        }
    }
    let mut s = format_for_template(l);
    s.push_str(&format_for_template(r));
    Value::String(s)
}

fn compare_values(op: BinOp, l: &Value, r: &Value) -> Result<Value> {
    if let (Value::String(a), Value::String(b)) = (l, r) {
        let ord = a.cmp(b);
        return Ok(Value::Bool(match op {
            BinOp::Lt => ord.is_lt(),
            BinOp::Le => ord.is_le(),
            BinOp::Gt => ord.is_gt(),
            BinOp::Ge => ord.is_ge(),
            _ => unreachable!(),
        }));
    }
    let a = l
        .as_f64()
        .ok_or_else(|| expression_error("comparison", "left operand is not comparable"))?;
    let b = r
        .as_f64()
        .ok_or_else(|| expression_error("comparison", "right operand is not comparable"))?;
    Ok(Value::Bool(match op {
        BinOp::Lt => a < b,
        BinOp::Le => a <= b,
        BinOp::Gt => a > b,
        BinOp::Ge => a >= b,
        _ => unreachable!(),
    }))
}

/// `formatValue`: maps and sequences render as JSON, scalars render as
/// their plain textual form.
pub fn format_for_template(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(_) | Value::Object(_) => serde_json::to_string(v).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphflow_core::execution_context::{GetFn, InfoFn};
    use std::sync::Arc;

    fn evaluator_with_env(pairs: &[(&str, Value)]) -> Evaluator {
        let mut env = Map::new();
        for (k, v) in pairs {
            env.insert((*k).to_string(), v.clone());
        }
        Evaluator::new(UnifiedApi::default(), env)
    }

    #[tokio::test]
    async fn literal_returns_raw_string() {
        let ev = evaluator_with_env(&[]);
        let v = ev.evaluate(&Expression::literal("https://x.test")).await.unwrap();
        assert_eq!(v, json!("https://x.test"));
    }

    #[tokio::test]
    async fn direct_arithmetic_and_comparison() {
        let ev = evaluator_with_env(&[("a", json!(3)), ("b", json!(4))]);
        assert_eq!(ev.evaluate(&Expression::direct("a + b")).await.unwrap(), json!(7.0));
        assert_eq!(
            ev.evaluate(&Expression::direct("a < b")).await.unwrap(),
            json!(true)
        );
        assert_eq!(
            ev.evaluate(&Expression::direct("a > b ? 'big' : 'small'")).await.unwrap(),
            json!("small")
        );
    }

    #[tokio::test]
    async fn direct_property_and_index_access() {
        let ev = evaluator_with_env(&[(
            "user",
            json!({"name": "ada", "roles": ["admin", "ops"]}),
        )]);
        assert_eq!(
            ev.evaluate(&Expression::direct("user.name")).await.unwrap(),
            json!("ada")
        );
        assert_eq!(
            ev.evaluate(&Expression::direct("user.roles[0]")).await.unwrap(),
            json!("admin")
        );
    }

    #[tokio::test]
    async fn filter_and_map_evaluate_lambdas() {
        let ev = evaluator_with_env(&[("nums", json!([1, 2, 3, 4]))]);
        let filtered = ev
            .evaluate(&Expression::direct("filter(nums, n => n > 2)"))
            .await
            .unwrap();
        assert_eq!(filtered, json!([3, 4]));
        let mapped = ev
            .evaluate(&Expression::direct("map(nums, n => n * 2)"))
            .await
            .unwrap();
        assert_eq!(mapped, json!([2.0, 4.0, 6.0, 8.0]));
    }

    #[tokio::test]
    async fn interpolation_with_surrounding_text_is_stringified() {
        let ev = evaluator_with_env(&[("name", json!("Ada"))]);
        let v = ev
            .evaluate(&Expression::interpolated("Hello {{name}}!"))
            .await
            .unwrap();
        assert_eq!(v, json!("Hello Ada!"));
    }

    #[tokio::test]
    async fn whole_template_passes_native_type_through() {
        let ev = evaluator_with_env(&[("count", json!(5))]);
        let v = ev
            .evaluate(&Expression::interpolated("  {{ count }}  "))
            .await
            .unwrap();
        assert_eq!(v, json!(5));
    }

    #[tokio::test]
    async fn missing_mustache_identifier_defaults_to_empty_string() {
        let ev = evaluator_with_env(&[]);
        let v = ev
            .evaluate(&Expression::interpolated("Hi {{missing}}"))
            .await
            .unwrap();
        assert_eq!(v, json!("Hi "));
    }

    #[tokio::test]
    async fn get_error_swallowed_in_template_but_propagates_directly() {
        let get: GetFn = Arc::new(|_name, _default| {
            Box::pin(async { Err(not_found_error("nope")) })
        });
        let mut api = UnifiedApi::default();
        api.get = Some(get);
        let ev = Evaluator::new(api, Map::new());

        let templated = ev.evaluate(&Expression::interpolated("{{ get('q') }}")).await.unwrap();
        assert_eq!(templated, Value::Null);

        let err = ev.evaluate(&Expression::direct("get('q')")).await.unwrap_err();
        assert!(err.is_kind(graphflow_core::error::ErrorKind::NotFound));
    }

    #[tokio::test]
    async fn info_swallows_only_in_template_context() {
        let info: InfoFn = Arc::new(|_name| Box::pin(async { Err(not_found_error("nope")) }));
        let mut api = UnifiedApi::default();
        api.info = Some(info);
        let ev = Evaluator::new(api, Map::new());

        let templated = ev.evaluate(&Expression::interpolated("{{ info('x') }}")).await.unwrap();
        assert_eq!(templated, Value::Null);
        assert!(ev.evaluate(&Expression::direct("info('x')")).await.is_err());
    }

    #[tokio::test]
    async fn file_errors_surface_even_inside_templates() {
        let ev = evaluator_with_env(&[]);
        let err = ev
            .evaluate(&Expression::interpolated("{{ file('*.csv', 'first') }}"))
            .await
            .unwrap_err();
        assert!(err.is_kind(graphflow_core::error::ErrorKind::NotFound));
    }

    #[tokio::test]
    async fn reparsing_and_reevaluating_direct_expression_is_stable() {
        let ev = evaluator_with_env(&[("a", json!(2)), ("b", json!(3))]);
        let expr = Expression::direct("a + b * 2");
        let first = ev.evaluate(&expr).await.unwrap();
        let reparsed = Expression::direct(&expr.raw);
        let second = ev.evaluate(&reparsed).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first, json!(8.0));
    }
}
