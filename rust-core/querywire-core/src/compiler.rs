// SPDX-License-Identifier: PMPL-1.0-or-later
//! Condition compilation.
//!
//! Walks a condition tree depth-first (children before parent) and emits a
//! boolean query tree as `serde_json::Value`:
//!
//! - AND group  → `{"bool": {"must": [...]}}`
//! - OR group   → `{"bool": {"should": [...], "minimum_should_match"?: n}}`
//! - nested     → `{"nested": {"path": p, "query": inner, "score_mode"?: m,
//!   "inner_hits"?: cfg}}`
//!
//! Compilation degrades rather than fails: a leaf that cannot be built is
//! skipped with a diagnostic, a group whose children all degraded collapses
//! to absence, and an empty input list compiles to `None` — never to an
//! always-true or always-false placeholder.

use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::condition::{ConditionGroup, ConditionItem, ConditionNode, NestedCondition};
use crate::fields::FieldResolver;
use crate::{Combinator, CompareMethod};

/// Compiles condition trees into boolean query documents.
///
/// Holds a read-only field resolver; the compiler itself carries no state
/// between calls and may be shared freely.
pub struct ConditionCompiler<'a> {
    resolver: &'a FieldResolver,
}

impl<'a> ConditionCompiler<'a> {
    pub fn new(resolver: &'a FieldResolver) -> Self {
        Self { resolver }
    }

    /// Compile a list of top-level condition nodes into a single boolean
    /// query node.
    ///
    /// Siblings fold pairwise left to right: each node's own `combinator`
    /// joins it with everything accumulated so far, so `[a, b(or), c]`
    /// becomes `bool(must=[bool(should=[a, b]), c])` and the OR clause keeps
    /// its filtering effect even in filter context. Runs of the same
    /// combinator collapse into one flat clause list. Returns `None` when
    /// nothing usable remains (absence of a filter).
    pub fn compile(&self, nodes: &[ConditionNode]) -> Option<Value> {
        let mut combined: Option<Value> = None;

        for node in nodes {
            let Some(clause) = self.compile_node(node) else {
                continue;
            };
            combined = Some(match combined.take() {
                None => clause,
                Some(acc) => match node.combinator() {
                    Combinator::And => fold_clause(acc, clause, "must"),
                    Combinator::Or => fold_clause(acc, clause, "should"),
                },
            });
        }

        combined
    }

    /// Compile one node of any kind.
    pub fn compile_node(&self, node: &ConditionNode) -> Option<Value> {
        match node {
            ConditionNode::Item(item) => self.compile_item(item),
            ConditionNode::Group(group) => self.compile_group(group),
            ConditionNode::Nested(nested) => self.compile_nested(nested),
        }
    }

    /// Build the leaf predicate for a single comparison.
    fn compile_item(&self, item: &ConditionItem) -> Option<Value> {
        if item.field.is_empty() {
            warn!("skipping condition item with empty field name");
            return None;
        }
        let field = self.resolver.resolve(&item.field, false);

        match item.method {
            CompareMethod::Equals => Some(json!({"terms": {field: item.values}})),
            CompareMethod::NotEquals => Some(negate(json!({"terms": {field: item.values}}))),
            CompareMethod::Contains => self.wildcard_any(field, &item.values),
            CompareMethod::NotContains => self.wildcard_any(field, &item.values).map(negate),
            CompareMethod::GreaterThan
            | CompareMethod::GreaterOrEqual
            | CompareMethod::LessThan
            | CompareMethod::LessOrEqual => {
                // Range predicates use only the first value even when a list
                // was supplied.
                let Some(bound) = item.values.first() else {
                    warn!(field, "skipping range condition without a bound value");
                    return None;
                };
                Some(json!({"range": {field: {item.method.as_str(): bound}}}))
            }
            CompareMethod::Exists => {
                if !item.values.is_empty() {
                    debug!(field, "'exists' ignores value parameter");
                }
                Some(json!({"exists": {"field": field}}))
            }
            CompareMethod::NotExists => {
                if !item.values.is_empty() {
                    debug!(field, "'nexists' ignores value parameter");
                }
                Some(negate(json!({"exists": {"field": field}})))
            }
        }
    }

    /// OR-combined wildcard match over one or more values.
    fn wildcard_any(&self, field: &str, values: &[Value]) -> Option<Value> {
        let clauses: Vec<Value> = values
            .iter()
            .map(|v| json!({"wildcard": {field: format!("*{}*", value_text(v))}}))
            .collect();
        match clauses.len() {
            0 => {
                warn!(field, "skipping substring condition without values");
                None
            }
            1 => clauses.into_iter().next(),
            _ => Some(json!({"bool": {"should": clauses}})),
        }
    }

    /// Compile a group's children and combine them per the group combinator.
    ///
    /// A group with no usable children contributes nothing.
    fn compile_group(&self, group: &ConditionGroup) -> Option<Value> {
        let clauses = self.compile_children(&group.children)?;
        Some(combine(
            group.combinator,
            clauses,
            group.minimum_should_match.as_ref().map(|m| m.to_value()),
        ))
    }

    /// Compile a nested condition: its children compile exactly as a group's
    /// do, and the result is wrapped in a nested-scope query.
    fn compile_nested(&self, nested: &NestedCondition) -> Option<Value> {
        let clauses = self.compile_children(&nested.children)?;
        let inner = combine(
            nested.combinator,
            clauses,
            nested.minimum_should_match.as_ref().map(|m| m.to_value()),
        );

        let mut wrapper = serde_json::Map::new();
        wrapper.insert("path".into(), Value::from(nested.path.clone()));
        wrapper.insert("query".into(), inner);
        if let Some(mode) = nested.score_mode {
            wrapper.insert("score_mode".into(), Value::from(mode.as_str()));
        }
        if let Some(ref inner_hits) = nested.inner_hits {
            wrapper.insert("inner_hits".into(), inner_hits.clone());
        }
        Some(json!({"nested": wrapper}))
    }

    /// Compile a child list, dropping children that degrade to nothing.
    /// Returns `None` when no child survived.
    fn compile_children(&self, children: &[ConditionNode]) -> Option<Vec<Value>> {
        let clauses: Vec<Value> = children
            .iter()
            .filter_map(|child| self.compile_node(child))
            .collect();
        if clauses.is_empty() {
            None
        } else {
            Some(clauses)
        }
    }
}

/// Join an accumulated clause with the next sibling under `must` or
/// `should`. When the accumulator is already a bool query holding only the
/// same key, the new clause appends to its list instead of nesting another
/// level.
fn fold_clause(mut acc: Value, clause: Value, key: &str) -> Value {
    if let Some(list) = acc
        .get_mut("bool")
        .and_then(Value::as_object_mut)
        .filter(|inner| inner.len() == 1)
        .and_then(|inner| inner.get_mut(key))
        .and_then(Value::as_array_mut)
    {
        list.push(clause);
        return acc;
    }
    json!({"bool": {key: [acc, clause]}})
}

/// Wrap clauses in a bool query per the combinator. The minimum-should-match
/// threshold only attaches to OR; on AND it is ignored, not rejected.
fn combine(combinator: Combinator, clauses: Vec<Value>, minimum: Option<Value>) -> Value {
    match combinator {
        Combinator::And => json!({"bool": {"must": clauses}}),
        Combinator::Or => match minimum {
            Some(minimum) => {
                json!({"bool": {"should": clauses, "minimum_should_match": minimum}})
            }
            None => json!({"bool": {"should": clauses}}),
        },
    }
}

/// Negation wrapper.
fn negate(clause: Value) -> Value {
    json!({"bool": {"must_not": [clause]}})
}

/// Text form of a wildcard operand; non-string scalars render via Display.
fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
