// SPDX-License-Identifier: PMPL-1.0-or-later
//! The condition model.
//!
//! A condition tree is a tagged union of three node kinds:
//!
//! - `item` — a single field comparison,
//! - `group` — a logical AND/OR group of child nodes,
//! - `nested` — a group scoped to a nested-document path.
//!
//! Nodes are immutable, short-lived value objects: constructed per query,
//! compiled once, then discarded. Constructors are strict (an empty nested
//! path or a malformed minimum-should-match is an error raised to the
//! caller); the JSON decoding entry point [`decode_conditions`] is lenient
//! and skips malformed nodes with a diagnostic, so one bad fragment never
//! aborts a whole compile.
//!
//! On the wire each node is an object with a `kind` discriminator:
//!
//! ```json
//! {
//!   "kind": "group",
//!   "combinator": "or",
//!   "minimum_should_match": 1,
//!   "children": [
//!     {"kind": "item", "field": "status", "method": "eq", "values": ["error"]},
//!     {"kind": "nested", "path": "comments", "children": [
//!       {"kind": "item", "field": "score", "method": "gt", "values": [3]}
//!     ]}
//!   ]
//! }
//! ```

use regex::Regex;
use serde::de;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::str::FromStr;
use std::sync::LazyLock;
use tracing::warn;

use crate::error::QueryError;
use crate::{Combinator, CompareMethod, ScoreMode};

/// Percentage (`"50%"`) or combination (`"3<5"`) expression format.
static MSM_EXPR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+%$|^[\d<>]+$").expect("literal pattern"));

/// Minimum number (or percentage expression) of OR-combined sibling clauses
/// that must match for the group to match.
///
/// Only meaningful on an OR group; the compiler ignores it on AND groups
/// without rejecting it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum MinimumShouldMatch {
    /// Absolute clause count.
    Count(i64),
    /// Engine expression such as `"50%"` or `"3<5"`.
    Expr(String),
}

impl MinimumShouldMatch {
    /// Validate an absolute count (must be non-negative).
    pub fn count(n: i64) -> Result<Self, QueryError> {
        if n < 0 {
            return Err(QueryError::InvalidMinimumShouldMatch(format!(
                "must be >= 0, got {n}"
            )));
        }
        Ok(MinimumShouldMatch::Count(n))
    }

    /// Validate an expression like `"50%"` or `"3<5"`.
    pub fn expr(s: impl Into<String>) -> Result<Self, QueryError> {
        let s = s.into();
        if !MSM_EXPR.is_match(&s) {
            return Err(QueryError::InvalidMinimumShouldMatch(format!(
                "invalid format: {s:?}"
            )));
        }
        Ok(MinimumShouldMatch::Expr(s))
    }

    /// Decode from a JSON value (integer or string).
    pub fn from_value(value: &Value) -> Result<Self, QueryError> {
        match value {
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::count(i),
                None => Err(QueryError::InvalidMinimumShouldMatch(format!(
                    "not an integer: {n}"
                ))),
            },
            Value::String(s) => Self::expr(s.clone()),
            other => Err(QueryError::InvalidMinimumShouldMatch(format!(
                "expected integer or string, got {other}"
            ))),
        }
    }

    /// Render as the wire value for `minimum_should_match`.
    pub fn to_value(&self) -> Value {
        match self {
            MinimumShouldMatch::Count(n) => Value::from(*n),
            MinimumShouldMatch::Expr(s) => Value::from(s.clone()),
        }
    }
}

impl<'de> Deserialize<'de> for MinimumShouldMatch {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        MinimumShouldMatch::from_value(&value).map_err(de::Error::custom)
    }
}

/// A single field comparison.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConditionItem {
    /// Application-level field name (resolved to a wire name at compile time).
    pub field: String,
    /// Comparison method.
    pub method: CompareMethod,
    /// Comparison values. Always a list; scalar input is normalized on decode.
    pub values: Vec<Value>,
    /// How this node joins its siblings at the call site.
    pub combinator: Combinator,
}

impl ConditionItem {
    pub fn new(
        field: impl Into<String>,
        method: CompareMethod,
        values: impl IntoIterator<Item = Value>,
    ) -> Self {
        Self {
            field: field.into(),
            method,
            values: values.into_iter().collect(),
            combinator: Combinator::And,
        }
    }

    /// Set how this item joins its siblings (default AND).
    pub fn with_combinator(mut self, combinator: Combinator) -> Self {
        self.combinator = combinator;
        self
    }
}

/// A logical group of child condition nodes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConditionGroup {
    /// Logical relation between the group's children.
    pub combinator: Combinator,
    /// Ordered child nodes of any kind.
    pub children: Vec<ConditionNode>,
    /// Optional minimum-match threshold, meaningful only when `combinator`
    /// is OR.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum_should_match: Option<MinimumShouldMatch>,
}

impl ConditionGroup {
    pub fn new(combinator: Combinator, children: Vec<ConditionNode>) -> Self {
        Self {
            combinator,
            children,
            minimum_should_match: None,
        }
    }

    pub fn with_minimum_should_match(mut self, msm: MinimumShouldMatch) -> Self {
        self.minimum_should_match = Some(msm);
        self
    }
}

/// A condition scoped to a nested-document path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NestedCondition {
    /// Nested field path, e.g. `"comments"`. Never empty.
    pub path: String,
    /// Logical relation between the inner children.
    pub combinator: Combinator,
    /// Ordered child nodes compiled inside the nested scope.
    pub children: Vec<ConditionNode>,
    /// How sub-document scores combine into the parent score.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score_mode: Option<ScoreMode>,
    /// Optional minimum-match threshold for an OR combinator.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum_should_match: Option<MinimumShouldMatch>,
    /// Opaque inner-hits echo configuration, passed through to the wire.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inner_hits: Option<Value>,
}

impl NestedCondition {
    /// Create a nested condition.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::EmptyNestedPath`] when `path` is empty or
    /// whitespace-only. This is a construction-time error, not a compile
    /// degradation.
    pub fn new(
        path: impl Into<String>,
        combinator: Combinator,
        children: Vec<ConditionNode>,
    ) -> Result<Self, QueryError> {
        let path = path.into();
        if path.trim().is_empty() {
            return Err(QueryError::EmptyNestedPath);
        }
        Ok(Self {
            path,
            combinator,
            children,
            score_mode: None,
            minimum_should_match: None,
            inner_hits: None,
        })
    }

    pub fn with_score_mode(mut self, score_mode: ScoreMode) -> Self {
        self.score_mode = Some(score_mode);
        self
    }

    pub fn with_minimum_should_match(mut self, msm: MinimumShouldMatch) -> Self {
        self.minimum_should_match = Some(msm);
        self
    }

    pub fn with_inner_hits(mut self, inner_hits: Value) -> Self {
        self.inner_hits = Some(inner_hits);
        self
    }
}

/// A node of the condition tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ConditionNode {
    Item(ConditionItem),
    Group(ConditionGroup),
    Nested(NestedCondition),
}

impl ConditionNode {
    /// The sibling combinator this node declares at its call site.
    pub fn combinator(&self) -> Combinator {
        match self {
            ConditionNode::Item(item) => item.combinator,
            ConditionNode::Group(group) => group.combinator,
            ConditionNode::Nested(nested) => nested.combinator,
        }
    }
}

impl From<ConditionItem> for ConditionNode {
    fn from(item: ConditionItem) -> Self {
        ConditionNode::Item(item)
    }
}

impl From<ConditionGroup> for ConditionNode {
    fn from(group: ConditionGroup) -> Self {
        ConditionNode::Group(group)
    }
}

impl From<NestedCondition> for ConditionNode {
    fn from(nested: NestedCondition) -> Self {
        ConditionNode::Nested(nested)
    }
}

impl<'de> Deserialize<'de> for ConditionNode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        decode_node(&value).map_err(de::Error::custom)
    }
}

/// Decode a caller-supplied list of condition objects, skipping malformed
/// entries with a warning instead of failing.
///
/// This is the fault-tolerant boundary: a node with a missing required
/// field, an unknown `kind`, an invalid combinator token, an empty nested
/// path, or a malformed minimum-should-match is excluded from the result
/// and logged; its siblings still decode.
pub fn decode_conditions(values: &[Value]) -> Vec<ConditionNode> {
    let mut nodes = Vec::with_capacity(values.len());
    for value in values {
        match decode_node(value) {
            Ok(node) => nodes.push(node),
            Err(err) => {
                warn!(error = %err, node = %value, "skipping invalid condition");
            }
        }
    }
    nodes
}

/// Strictly decode one condition node from JSON.
fn decode_node(value: &Value) -> Result<ConditionNode, QueryError> {
    let obj = value
        .as_object()
        .ok_or(QueryError::MalformedConditionNode)?;

    // Missing discriminator means a plain item, matching caller shorthand.
    let kind = obj.get("kind").and_then(Value::as_str).unwrap_or("item");

    match kind {
        "item" => decode_item(obj).map(ConditionNode::Item),
        "group" => decode_group(obj).map(ConditionNode::Group),
        "nested" => decode_nested(obj).map(ConditionNode::Nested),
        other => Err(QueryError::UnknownConditionKind(other.to_string())),
    }
}

fn decode_combinator(obj: &serde_json::Map<String, Value>) -> Result<Combinator, QueryError> {
    match obj.get("combinator") {
        Some(Value::String(s)) => Combinator::from_str(s),
        Some(other) => Err(QueryError::InvalidCombinator(other.to_string())),
        None => Ok(Combinator::And),
    }
}

fn decode_minimum(
    obj: &serde_json::Map<String, Value>,
) -> Result<Option<MinimumShouldMatch>, QueryError> {
    match obj.get("minimum_should_match") {
        Some(Value::Null) | None => Ok(None),
        Some(value) => MinimumShouldMatch::from_value(value).map(Some),
    }
}

fn decode_item(obj: &serde_json::Map<String, Value>) -> Result<ConditionItem, QueryError> {
    let field = obj
        .get("field")
        .and_then(Value::as_str)
        .ok_or(QueryError::MissingConditionField {
            kind: "item",
            field: "field",
        })?;

    // Scalar values are normalized to a single-element list.
    let values = match obj.get("values") {
        Some(Value::Array(items)) => items.clone(),
        Some(Value::Null) | None => {
            return Err(QueryError::MissingConditionField {
                kind: "item",
                field: "values",
            })
        }
        Some(scalar) => vec![scalar.clone()],
    };

    let method = obj
        .get("method")
        .and_then(Value::as_str)
        .map(CompareMethod::parse_lossy)
        .unwrap_or_default();

    Ok(ConditionItem::new(field, method, values).with_combinator(decode_combinator(obj)?))
}

fn decode_group(obj: &serde_json::Map<String, Value>) -> Result<ConditionGroup, QueryError> {
    let combinator = decode_combinator(obj)?;
    let children = decode_children(obj);
    let mut group = ConditionGroup::new(combinator, children);
    group.minimum_should_match = decode_minimum(obj)?;
    Ok(group)
}

fn decode_nested(obj: &serde_json::Map<String, Value>) -> Result<NestedCondition, QueryError> {
    let path = obj
        .get("path")
        .and_then(Value::as_str)
        .ok_or(QueryError::MissingConditionField {
            kind: "nested",
            field: "path",
        })?;

    let combinator = decode_combinator(obj)?;
    let mut nested = NestedCondition::new(path, combinator, decode_children(obj))?;

    match obj.get("score_mode") {
        Some(Value::Null) | None => {}
        Some(Value::String(mode)) => nested.score_mode = Some(ScoreMode::from_str(mode)?),
        Some(other) => return Err(QueryError::InvalidScoreMode(other.to_string())),
    }
    nested.minimum_should_match = decode_minimum(obj)?;
    nested.inner_hits = obj.get("inner_hits").filter(|v| !v.is_null()).cloned();

    Ok(nested)
}

/// Children decode leniently: a malformed child is skipped, its siblings
/// survive.
fn decode_children(obj: &serde_json::Map<String, Value>) -> Vec<ConditionNode> {
    match obj.get("children") {
        Some(Value::Array(children)) => decode_conditions(children),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_minimum_should_match_count_validation() {
        assert!(MinimumShouldMatch::count(0).is_ok());
        assert!(MinimumShouldMatch::count(3).is_ok());
        assert!(MinimumShouldMatch::count(-1).is_err());
    }

    #[test]
    fn test_minimum_should_match_expr_validation() {
        assert!(MinimumShouldMatch::expr("50%").is_ok());
        assert!(MinimumShouldMatch::expr("3<5").is_ok());
        assert!(MinimumShouldMatch::expr("half").is_err());
        assert!(MinimumShouldMatch::expr("50%%extra").is_err());
    }

    #[test]
    fn test_nested_empty_path_is_construction_error() {
        assert!(matches!(
            NestedCondition::new("", Combinator::And, vec![]),
            Err(QueryError::EmptyNestedPath)
        ));
        assert!(matches!(
            NestedCondition::new("   ", Combinator::Or, vec![]),
            Err(QueryError::EmptyNestedPath)
        ));
        assert!(NestedCondition::new("comments", Combinator::And, vec![]).is_ok());
    }

    #[test]
    fn test_decode_item_defaults() {
        let nodes = decode_conditions(&[json!({"field": "status", "values": ["error"]})]);
        assert_eq!(nodes.len(), 1);
        let ConditionNode::Item(item) = &nodes[0] else {
            panic!("expected item");
        };
        assert_eq!(item.field, "status");
        assert_eq!(item.method, CompareMethod::Equals);
        assert_eq!(item.combinator, Combinator::And);
    }

    #[test]
    fn test_decode_scalar_value_normalized_to_list() {
        let nodes = decode_conditions(&[json!({
            "kind": "item", "field": "level", "method": "gte", "values": 3
        })]);
        let ConditionNode::Item(item) = &nodes[0] else {
            panic!("expected item");
        };
        assert_eq!(item.values, vec![json!(3)]);
    }

    #[test]
    fn test_decode_skips_missing_required_fields() {
        let nodes = decode_conditions(&[
            json!({"kind": "item", "method": "eq", "values": ["x"]}),
            json!({"kind": "item", "field": "ok", "values": ["y"]}),
            json!({"kind": "item", "field": "no_values"}),
        ]);
        assert_eq!(nodes.len(), 1);
    }

    #[test]
    fn test_decode_skips_unknown_kind() {
        let nodes = decode_conditions(&[
            json!({"kind": "geo", "field": "location"}),
            json!({"field": "status", "values": ["active"]}),
        ]);
        assert_eq!(nodes.len(), 1);
    }

    #[test]
    fn test_decode_skips_invalid_combinator() {
        let nodes = decode_conditions(&[json!({
            "field": "status", "values": ["active"], "combinator": "xor"
        })]);
        assert!(nodes.is_empty());
    }

    #[test]
    fn test_decode_group_with_lenient_children() {
        let nodes = decode_conditions(&[json!({
            "kind": "group",
            "combinator": "or",
            "minimum_should_match": 1,
            "children": [
                {"field": "a", "values": [1]},
                {"kind": "bogus"},
                {"field": "b", "values": [2]}
            ]
        })]);
        let ConditionNode::Group(group) = &nodes[0] else {
            panic!("expected group");
        };
        assert_eq!(group.combinator, Combinator::Or);
        assert_eq!(group.children.len(), 2);
        assert_eq!(
            group.minimum_should_match,
            Some(MinimumShouldMatch::Count(1))
        );
    }

    #[test]
    fn test_decode_nested_full() {
        let nodes = decode_conditions(&[json!({
            "kind": "nested",
            "path": "comments",
            "combinator": "or",
            "score_mode": "avg",
            "minimum_should_match": "50%",
            "inner_hits": {"size": 3, "name": "matched"},
            "children": [{"field": "score", "method": "gt", "values": [3]}]
        })]);
        let ConditionNode::Nested(nested) = &nodes[0] else {
            panic!("expected nested");
        };
        assert_eq!(nested.path, "comments");
        assert_eq!(nested.score_mode, Some(ScoreMode::Avg));
        assert_eq!(
            nested.minimum_should_match,
            Some(MinimumShouldMatch::Expr("50%".into()))
        );
        assert!(nested.inner_hits.is_some());
    }

    #[test]
    fn test_decode_invalid_score_mode_skips_node() {
        // A non-string score_mode is a decode error for the whole node, not
        // a silently dropped field.
        let nodes = decode_conditions(&[json!({
            "kind": "nested", "path": "comments", "score_mode": 5,
            "children": [{"field": "score", "values": [1]}]
        })]);
        assert!(nodes.is_empty());

        let nodes = decode_conditions(&[json!({
            "kind": "nested", "path": "comments", "score_mode": "median",
            "children": [{"field": "score", "values": [1]}]
        })]);
        assert!(nodes.is_empty());
    }

    #[test]
    fn test_decode_nested_without_path_skipped() {
        let nodes = decode_conditions(&[json!({"kind": "nested", "children": []})]);
        assert!(nodes.is_empty());
        let nodes = decode_conditions(&[json!({"kind": "nested", "path": "  ", "children": []})]);
        assert!(nodes.is_empty());
    }

    #[test]
    fn test_decode_invalid_minimum_should_match_skipped() {
        let nodes = decode_conditions(&[json!({
            "kind": "group", "combinator": "or",
            "minimum_should_match": "half of them",
            "children": [{"field": "a", "values": [1]}]
        })]);
        assert!(nodes.is_empty());
    }

    #[test]
    fn test_serde_roundtrip_through_kind_tag() {
        let node: ConditionNode = ConditionItem::new(
            "status",
            CompareMethod::NotEquals,
            [json!("error")],
        )
        .with_combinator(Combinator::Or)
        .into();
        let value = serde_json::to_value(&node).unwrap();
        assert_eq!(value["kind"], "item");
        assert_eq!(value["method"], "neq");
        let back: ConditionNode = serde_json::from_value(value).unwrap();
        assert_eq!(back, node);
    }

    #[test]
    fn test_non_object_node_skipped() {
        let nodes = decode_conditions(&[json!("not an object"), json!(42)]);
        assert!(nodes.is_empty());
    }
}
