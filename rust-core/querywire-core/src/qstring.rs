// SPDX-License-Identifier: PMPL-1.0-or-later
//! Query-string composition.
//!
//! A [`Q`] value composes free-text query-string fragments with `&` (AND),
//! `|` (OR), and `!` (NOT), producing the string consumed by the assembly
//! layer's scored-query context:
//!
//! ```
//! use querywire_core::Q;
//!
//! let q = Q::equal("status", "error") & Q::gte("level", 3);
//! assert_eq!(q.build().unwrap(), r#"status: "error" AND level: >=3"#);
//! ```
//!
//! Reserved query-string characters are backslash-escaped; input that is
//! already escaped is not escaped twice.

use regex::Regex;
use serde_json::Value;
use std::fmt;
use std::ops::{BitAnd, BitOr, Not};
use std::str::FromStr;
use std::sync::LazyLock;

use crate::error::QueryError;
use crate::Combinator;

/// `+ - = & | > < ! ( ) { } [ ] ^ " ~ * ? : \ /` and space.
static RESERVED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"([+\-=&|><!(){}\[\]^"~*?\\:/ ])"#).expect("literal pattern"));
/// An already-escaped reserved character, matched to avoid double escaping.
static ESCAPED_RESERVED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\\([+\-=&|><!(){}\[\]^"~*?\\:/ ])"#).expect("literal pattern")
});

/// Escape the engine's reserved query-string characters so the input is
/// matched literally. Idempotent: escaping an escaped string changes nothing.
pub fn escape_query_string(input: &str) -> String {
    let unescaped = ESCAPED_RESERVED.replace_all(input, "$1");
    RESERVED.replace_all(&unescaped, r"\$1").into_owned()
}

/// Comparison operators available in query-string fragments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryStringOperator {
    Exists,
    NotExists,
    Equal,
    NotEqual,
    /// Substring match.
    Include,
    NotInclude,
    Gt,
    Gte,
    Lt,
    Lte,
    /// Inclusive range over two bounds.
    Between,
    Regex,
    NotRegex,
}

impl FromStr for QueryStringOperator {
    type Err = QueryError;

    /// Parse an operator token, accepting the common aliases callers use
    /// (`eq`/`equal`, `contains`/`include`, `reg`/`regex`, ...).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "exists" => Ok(QueryStringOperator::Exists),
            "not_exists" | "nexists" => Ok(QueryStringOperator::NotExists),
            "equal" | "eq" => Ok(QueryStringOperator::Equal),
            "not_equal" | "neq" => Ok(QueryStringOperator::NotEqual),
            "include" | "contains" => Ok(QueryStringOperator::Include),
            "not_include" | "not_contains" | "exclude" => Ok(QueryStringOperator::NotInclude),
            "gt" => Ok(QueryStringOperator::Gt),
            "gte" => Ok(QueryStringOperator::Gte),
            "lt" => Ok(QueryStringOperator::Lt),
            "lte" => Ok(QueryStringOperator::Lte),
            "between" => Ok(QueryStringOperator::Between),
            "reg" | "regex" => Ok(QueryStringOperator::Regex),
            "nreg" | "not_regex" => Ok(QueryStringOperator::NotRegex),
            other => Err(QueryError::UnsupportedOperator(other.to_string())),
        }
    }
}

/// A single `field op value` fragment.
#[derive(Debug, Clone)]
struct Leaf {
    field: String,
    operator: QueryStringOperator,
    value: Value,
}

#[derive(Debug, Clone)]
enum Part {
    Leaf(Leaf),
    Group(Q),
}

/// A composable query-string condition.
///
/// `Q` values combine with the std operator traits: `&` for AND, `|` for
/// OR, `!` for NOT. Combining with an empty `Q` yields the other operand
/// unchanged. [`Q::build`] renders the final string.
#[derive(Debug, Clone, Default)]
pub struct Q {
    connector: Combinator,
    negated: bool,
    parts: Vec<Part>,
}

impl Q {
    /// The empty condition; renders to an empty string and is the identity
    /// for `&` and `|`.
    pub fn empty() -> Self {
        Q::default()
    }

    /// General constructor.
    ///
    /// # Errors
    ///
    /// `Between` requires the value to be an array of exactly two bounds;
    /// anything else is [`QueryError::BetweenBounds`].
    pub fn new(
        field: impl Into<String>,
        operator: QueryStringOperator,
        value: Value,
    ) -> Result<Self, QueryError> {
        if operator == QueryStringOperator::Between {
            let bounds = value.as_array().map(Vec::len).unwrap_or(1);
            if bounds != 2 {
                return Err(QueryError::BetweenBounds(bounds));
            }
        }
        Ok(Self::leaf(field.into(), operator, value))
    }

    pub fn equal(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::leaf(field.into(), QueryStringOperator::Equal, value.into())
    }

    pub fn not_equal(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::leaf(field.into(), QueryStringOperator::NotEqual, value.into())
    }

    pub fn include(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::leaf(field.into(), QueryStringOperator::Include, value.into())
    }

    pub fn not_include(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::leaf(field.into(), QueryStringOperator::NotInclude, value.into())
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::leaf(field.into(), QueryStringOperator::Gt, value.into())
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::leaf(field.into(), QueryStringOperator::Gte, value.into())
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::leaf(field.into(), QueryStringOperator::Lt, value.into())
    }

    pub fn lte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::leaf(field.into(), QueryStringOperator::Lte, value.into())
    }

    pub fn between(
        field: impl Into<String>,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Self {
        Self::leaf(
            field.into(),
            QueryStringOperator::Between,
            Value::Array(vec![low.into(), high.into()]),
        )
    }

    pub fn exists(field: impl Into<String>) -> Self {
        Self::leaf(field.into(), QueryStringOperator::Exists, Value::Null)
    }

    pub fn not_exists(field: impl Into<String>) -> Self {
        Self::leaf(field.into(), QueryStringOperator::NotExists, Value::Null)
    }

    pub fn regex(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::leaf(
            field.into(),
            QueryStringOperator::Regex,
            Value::from(pattern.into()),
        )
    }

    pub fn not_regex(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::leaf(
            field.into(),
            QueryStringOperator::NotRegex,
            Value::from(pattern.into()),
        )
    }

    fn leaf(field: String, operator: QueryStringOperator, value: Value) -> Self {
        Q {
            connector: Combinator::And,
            negated: false,
            parts: vec![Part::Leaf(Leaf {
                field,
                operator,
                value,
            })],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Render the composed query string.
    pub fn build(&self) -> Result<String, QueryError> {
        if self.parts.is_empty() {
            return Ok(String::new());
        }
        let body = self.build_parts()?;
        if self.negated && !body.is_empty() {
            return Ok(format!("NOT ({body})"));
        }
        Ok(body)
    }

    fn build_parts(&self) -> Result<String, QueryError> {
        let mut rendered = Vec::new();

        for part in &self.parts {
            match part {
                Part::Group(child) => {
                    let child_str = child.build()?;
                    if child_str.is_empty() {
                        continue;
                    }
                    // Parenthesize when precedence could change the meaning.
                    let needs_parens = child.parts.len() > 1
                        || child.negated
                        || child.connector != self.connector;
                    if needs_parens {
                        rendered.push(format!("({child_str})"));
                    } else {
                        rendered.push(child_str);
                    }
                }
                Part::Leaf(leaf) => {
                    let leaf_str = render_leaf(leaf);
                    if !leaf_str.is_empty() {
                        rendered.push(leaf_str);
                    }
                }
            }
        }

        let connector = match self.connector {
            Combinator::And => " AND ",
            Combinator::Or => " OR ",
        };
        Ok(rendered.join(connector))
    }

    fn combine(self, other: Q, connector: Combinator) -> Q {
        // The empty Q is the identity element.
        if self.parts.is_empty() {
            return other;
        }
        if other.parts.is_empty() {
            return self;
        }
        Q {
            connector,
            negated: false,
            parts: vec![Part::Group(self), Part::Group(other)],
        }
    }
}

impl BitAnd for Q {
    type Output = Q;

    fn bitand(self, other: Q) -> Q {
        self.combine(other, Combinator::And)
    }
}

impl BitOr for Q {
    type Output = Q;

    fn bitor(self, other: Q) -> Q {
        self.combine(other, Combinator::Or)
    }
}

impl Not for Q {
    type Output = Q;

    fn not(mut self) -> Q {
        self.negated = !self.negated;
        self
    }
}

impl fmt::Display for Q {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.build().map_err(|_| fmt::Error)?)
    }
}

/// Render one leaf fragment. Empty operand values render to nothing and the
/// fragment is dropped from the output.
fn render_leaf(leaf: &Leaf) -> String {
    use QueryStringOperator::*;

    let field = &leaf.field;
    match leaf.operator {
        Exists => format!("{field}: *"),
        NotExists => format!("NOT {field}: *"),
        Equal | NotEqual => {
            let text = value_text(&leaf.value);
            if text.is_empty() {
                return String::new();
            }
            // Exact match quotes the operand; only the quote itself needs
            // escaping inside.
            let escaped = text.replace('"', "\\\"");
            match leaf.operator {
                Equal => format!("{field}: \"{escaped}\""),
                _ => format!("NOT {field}: \"{escaped}\""),
            }
        }
        Include | NotInclude => {
            // Strip caller-supplied wildcards before adding our own.
            let text = value_text(&leaf.value);
            let trimmed = text.trim_matches('*');
            if trimmed.is_empty() {
                return String::new();
            }
            let escaped = escape_query_string(trimmed);
            match leaf.operator {
                Include => format!("{field}: *{escaped}*"),
                _ => format!("NOT {field}: *{escaped}*"),
            }
        }
        Gt | Gte | Lt | Lte => {
            let text = value_text(&leaf.value);
            if text.is_empty() {
                return String::new();
            }
            let escaped = escape_query_string(&text);
            let op = match leaf.operator {
                Gt => ">",
                Gte => ">=",
                Lt => "<",
                _ => "<=",
            };
            format!("{field}: {op}{escaped}")
        }
        Between => {
            // Arity was validated at construction.
            let bounds = leaf.value.as_array().cloned().unwrap_or_default();
            let low = bounds.first().map(value_text).unwrap_or_default();
            let high = bounds.get(1).map(value_text).unwrap_or_default();
            if low.is_empty() || high.is_empty() {
                return String::new();
            }
            format!(
                "{field}: [{} TO {}]",
                escape_query_string(&low),
                escape_query_string(&high)
            )
        }
        Regex | NotRegex => {
            // Regular expressions pass through unescaped.
            let text = value_text(&leaf.value);
            if text.is_empty() {
                return String::new();
            }
            match leaf.operator {
                Regex => format!("{field}: /{text}/"),
                _ => format!("NOT {field}: /{text}/"),
            }
        }
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}
