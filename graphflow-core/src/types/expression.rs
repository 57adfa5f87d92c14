//! ABOUTME: The tagged Expression value produced by the expression parser

use super::detect;
use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a raw YAML/PKL scalar was classified by the expression parser.
///
/// The classification is cached on the `Expression` so the evaluator never
/// re-detects a string's type: detection happens once, at parse time, and
/// the tag is what every downstream consumer (preflight, field evaluation,
/// mustache substitution) dispatches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpressionKind {
    /// Returned unchanged; never evaluated.
    Literal,
    /// A single expression, braces optional, evaluated once.
    Direct,
    /// A string containing one or more `{{ ... }}` blocks.
    Interpolated,
}

/// A parsed field value: the original text plus its detected kind.
///
/// `Expression` is deliberately cheap to clone (one `String` and a `Copy`
/// enum) because resources are evaluated field-by-field on every run and
/// the same `Expression` may be re-evaluated across retries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Expression {
    pub raw: String,
    pub kind: ExpressionKind,
}

/// A workflow author writes a plain YAML/JSON scalar (`prompt: "Hello
/// {{name}}"`), never a tagged `{raw, kind}` object - classification
/// happens here, once, via the same heuristics `graphflow_utils::detect`
/// re-exports. The tagged form is still accepted so round-tripping an
/// already-classified `Expression` (tests, `Workflow` re-serialization)
/// does not re-run detection.
impl<'de> Deserialize<'de> for Expression {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(ExpressionVisitor)
    }
}

struct ExpressionVisitor;

impl<'de> Visitor<'de> for ExpressionVisitor {
    type Value = Expression;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a scalar (classified via detection) or a {raw, kind} object")
    }

    fn visit_str<E>(self, v: &str) -> Result<Expression, E>
    where
        E: de::Error,
    {
        detect::detect(v).map_err(de::Error::custom)
    }

    fn visit_string<E>(self, v: String) -> Result<Expression, E>
    where
        E: de::Error,
    {
        self.visit_str(&v)
    }

    fn visit_bool<E>(self, v: bool) -> Result<Expression, E>
    where
        E: de::Error,
    {
        Ok(Expression::literal(v.to_string()))
    }

    fn visit_i64<E>(self, v: i64) -> Result<Expression, E>
    where
        E: de::Error,
    {
        Ok(Expression::literal(v.to_string()))
    }

    fn visit_u64<E>(self, v: u64) -> Result<Expression, E>
    where
        E: de::Error,
    {
        Ok(Expression::literal(v.to_string()))
    }

    fn visit_f64<E>(self, v: f64) -> Result<Expression, E>
    where
        E: de::Error,
    {
        Ok(Expression::literal(v.to_string()))
    }

    fn visit_map<A>(self, mut map: A) -> Result<Expression, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut raw: Option<String> = None;
        let mut kind: Option<ExpressionKind> = None;
        while let Some(key) = map.next_key::<String>()? {
            match key.as_str() {
                "raw" => raw = Some(map.next_value()?),
                "kind" => kind = Some(map.next_value()?),
                _ => {
                    let _: serde::de::IgnoredAny = map.next_value()?;
                }
            }
        }
        let raw = raw.ok_or_else(|| de::Error::missing_field("raw"))?;
        let kind = kind.ok_or_else(|| de::Error::missing_field("kind"))?;
        Ok(Expression::new(raw, kind))
    }
}

impl Expression {
    pub fn new(raw: impl Into<String>, kind: ExpressionKind) -> Self {
        Self {
            raw: raw.into(),
            kind,
        }
    }

    pub fn literal(raw: impl Into<String>) -> Self {
        Self::new(raw, ExpressionKind::Literal)
    }

    pub fn direct(raw: impl Into<String>) -> Self {
        Self::new(raw, ExpressionKind::Direct)
    }

    pub fn interpolated(raw: impl Into<String>) -> Self {
        Self::new(raw, ExpressionKind::Interpolated)
    }

    pub fn is_literal(&self) -> bool {
        self.kind == ExpressionKind::Literal
    }
}
