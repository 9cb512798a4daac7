// SPDX-License-Identifier: PMPL-1.0-or-later
//! Search request assembly.
//!
//! [`SearchQueryBuilder`] accumulates conditions, a free-text query, sort
//! fields, paging, and aggregations, then [`build`](SearchQueryBuilder::build)
//! merges them into one wire document:
//!
//! ```text
//! {
//!   "query": { "bool": { "filter": [...], "must": [ <query_string> ] } },
//!   "sort":  [ ... ],
//!   "from":  <int>, "size": <int>,
//!   "aggs":  { ... }
//! }
//! ```
//!
//! `build` never fails and never returns a partial document: condition
//! compilation degrades malformed input per the core crate's rules, and
//! everything that can hard-fail (nested paths, aggregation names, between
//! bounds) already failed when the value was constructed.

use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use querywire_core::{ConditionCompiler, ConditionNode, FieldResolver, Q, QueryError};

use crate::aggregation::Aggregation;

const DEFAULT_PAGE: i64 = 1;
const DEFAULT_PAGE_SIZE: i64 = 10;

/// Per-request builder for the search wire document.
///
/// Not safe for concurrent mutation; independent builders share nothing but
/// the (immutable) resolver. Mutating after `build` is legal and affects only
/// the next `build` call.
#[derive(Debug, Clone)]
pub struct SearchQueryBuilder {
    resolver: FieldResolver,
    conditions: Vec<ConditionNode>,
    query_string: String,
    ordering: Vec<String>,
    page: i64,
    page_size: i64,
    extra_filters: Vec<Value>,
    aggregations: Vec<Aggregation>,
    raw_aggregations: Vec<Value>,
}

impl SearchQueryBuilder {
    pub fn new(resolver: FieldResolver) -> Self {
        Self {
            resolver,
            conditions: Vec::new(),
            query_string: String::new(),
            ordering: Vec::new(),
            page: DEFAULT_PAGE,
            page_size: DEFAULT_PAGE_SIZE,
            extra_filters: Vec::new(),
            aggregations: Vec::new(),
            raw_aggregations: Vec::new(),
        }
    }

    /// Set the filter conditions. Replaces any previously set list.
    pub fn conditions(mut self, conditions: Vec<ConditionNode>) -> Self {
        self.conditions = conditions;
        self
    }

    /// Set conditions from their serialized form. Malformed entries are
    /// skipped with a diagnostic, per the core decoding rules.
    pub fn conditions_json(mut self, raw: &[Value]) -> Self {
        self.conditions = querywire_core::condition::decode_conditions(raw);
        self
    }

    /// Set the free-text query string. Trimmed at build time; empty means no
    /// scored-query context.
    pub fn query_string(mut self, query_string: impl Into<String>) -> Self {
        self.query_string = query_string.into();
        self
    }

    /// Set the free-text query from a composed [`Q`] condition.
    pub fn query(self, q: &Q) -> Result<Self, QueryError> {
        let rendered = q.build()?;
        Ok(self.query_string(rendered))
    }

    /// Set the sort fields. A leading `-` marks descending order and is
    /// preserved through field resolution.
    pub fn ordering<I, S>(mut self, ordering: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ordering = ordering.into_iter().map(Into::into).collect();
        self
    }

    /// Set paging. Page is 1-based and clamps to 1; a size of 0 is legal and
    /// means "aggregations only, no documents" (negative sizes clamp to 0).
    pub fn pagination(mut self, page: i64, page_size: i64) -> Self {
        self.page = page.max(1);
        self.page_size = page_size.max(0);
        self
    }

    /// Inject a pre-built filter fragment, ANDed with the compiled
    /// conditions. `Null` is ignored.
    pub fn add_filter(mut self, fragment: Value) -> Self {
        if !fragment.is_null() {
            self.extra_filters.push(fragment);
        }
        self
    }

    /// Register an aggregation. Sibling order is preserved in the output.
    pub fn add_aggregation(mut self, aggregation: Aggregation) -> Self {
        self.aggregations.push(aggregation);
        self
    }

    /// Merge a fully-formed aggregation fragment into the document by key.
    ///
    /// The fragment's top-level keys are aggregation names; each key
    /// overwrites any aggregation already registered under that name (last
    /// write wins on that key only, other keys and the rest of the document
    /// are untouched).
    pub fn add_aggregation_raw(mut self, fragment: Value) -> Self {
        if fragment.is_object() {
            self.raw_aggregations.push(fragment);
        } else {
            warn!("raw aggregation fragment is not an object, ignoring");
        }
        self
    }

    /// Reset every accumulated parameter to its default.
    pub fn clear(mut self) -> Self {
        self.conditions.clear();
        self.query_string.clear();
        self.ordering.clear();
        self.page = DEFAULT_PAGE;
        self.page_size = DEFAULT_PAGE_SIZE;
        self.extra_filters.clear();
        self.aggregations.clear();
        self.raw_aggregations.clear();
        self
    }

    /// Assemble the wire document.
    pub fn build(&self) -> Value {
        let mut doc = Map::new();

        if let Some(query) = self.build_query() {
            doc.insert("query".to_string(), query);
        }

        if !self.ordering.is_empty() {
            let sort: Vec<Value> = self
                .ordering
                .iter()
                .map(|field| Value::from(self.resolver.resolve_sort(field)))
                .collect();
            doc.insert("sort".to_string(), Value::Array(sort));
        }

        doc.insert("from".to_string(), json!((self.page - 1) * self.page_size));
        doc.insert("size".to_string(), json!(self.page_size));

        if let Some(aggs) = self.build_aggregations() {
            doc.insert("aggs".to_string(), aggs);
        }

        Value::Object(doc)
    }

    /// The `query` key: compiled conditions and extra fragments in filter
    /// context, the trimmed query string in scored context. `None` when both
    /// are absent.
    fn build_query(&self) -> Option<Value> {
        let mut filter: Vec<Value> = Vec::new();
        let compiler = ConditionCompiler::new(&self.resolver);
        if let Some(compiled) = compiler.compile(&self.conditions) {
            filter.push(compiled);
        }
        filter.extend(self.extra_filters.iter().cloned());

        let mut must: Vec<Value> = Vec::new();
        let trimmed = self.query_string.trim();
        if !trimmed.is_empty() {
            must.push(json!({"query_string": {"query": trimmed}}));
        }

        if filter.is_empty() && must.is_empty() {
            return None;
        }

        let mut body = Map::new();
        if !filter.is_empty() {
            body.insert("filter".to_string(), Value::Array(filter));
        }
        if !must.is_empty() {
            body.insert("must".to_string(), Value::Array(must));
        }
        Some(json!({"bool": body}))
    }

    /// The `aggs` key: registered aggregations in input order, then raw
    /// fragments merged in by key. `None` when empty.
    fn build_aggregations(&self) -> Option<Value> {
        let mut aggs = Map::new();
        for aggregation in &self.aggregations {
            aggregation.emit_into(&mut aggs, &self.resolver);
        }
        for fragment in &self.raw_aggregations {
            // Registration rejected non-objects.
            if let Some(entries) = fragment.as_object() {
                for (name, body) in entries {
                    if aggs.contains_key(name) {
                        debug!(name = name.as_str(), "raw aggregation replaces existing entry");
                    }
                    aggs.insert(name.clone(), body.clone());
                }
            }
        }
        if aggs.is_empty() {
            None
        } else {
            Some(Value::Object(aggs))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use querywire_core::{CompareMethod, ConditionItem, FieldMapping};
    use serde_json::json;

    fn resolver() -> FieldResolver {
        FieldResolver::new([
            FieldMapping::new("status", "status").with_agg_name("status.keyword"),
            FieldMapping::new("create_time", "create_time"),
            FieldMapping::new("price", "price"),
        ])
    }

    fn builder() -> SearchQueryBuilder {
        SearchQueryBuilder::new(resolver())
    }

    fn status_eq(value: &str) -> ConditionNode {
        ConditionItem::new("status", CompareMethod::Equals, vec![json!(value)]).into()
    }

    #[test]
    fn test_default_build_is_paging_only() {
        assert_eq!(builder().build(), json!({"from": 0, "size": 10}));
    }

    #[test]
    fn test_conditions_land_in_filter_context() {
        let doc = builder().conditions(vec![status_eq("error")]).build();
        assert_eq!(
            doc,
            json!({
                "query": {"bool": {"filter": [{"terms": {"status": ["error"]}}]}},
                "from": 0,
                "size": 10
            })
        );
    }

    #[test]
    fn test_query_string_is_trimmed_into_must() {
        let doc = builder().query_string("  message: *timeout*  ").build();
        assert_eq!(
            doc["query"],
            json!({"bool": {"must": [{"query_string": {"query": "message: *timeout*"}}]}})
        );
    }

    #[test]
    fn test_blank_query_string_is_omitted() {
        let doc = builder().query_string("   ").build();
        assert_eq!(doc, json!({"from": 0, "size": 10}));
    }

    #[test]
    fn test_query_from_composed_q() {
        let q = Q::equal("status", "error") & Q::gte("level", 3);
        let doc = builder().query(&q).unwrap().build();
        assert_eq!(
            doc["query"]["bool"]["must"][0]["query_string"]["query"],
            json!(r#"status: "error" AND level: >=3"#)
        );
    }

    #[test]
    fn test_extra_filters_join_compiled_conditions() {
        let doc = builder()
            .conditions(vec![status_eq("error")])
            .add_filter(json!({"range": {"create_time": {"gte": "now-1d"}}}))
            .add_filter(Value::Null)
            .build();
        assert_eq!(
            doc["query"]["bool"]["filter"],
            json!([
                {"terms": {"status": ["error"]}},
                {"range": {"create_time": {"gte": "now-1d"}}}
            ])
        );
    }

    #[test]
    fn test_sort_resolution_preserves_descending_prefix() {
        let doc = builder().ordering(["-status", "create_time"]).build();
        assert_eq!(doc["sort"], json!(["-status.keyword", "create_time"]));
    }

    #[test]
    fn test_pagination_offset_math() {
        let doc = builder().pagination(3, 20).build();
        assert_eq!(doc["from"], json!(40));
        assert_eq!(doc["size"], json!(20));
    }

    #[test]
    fn test_page_clamps_to_one() {
        let doc = builder().pagination(0, 20).build();
        assert_eq!(doc["from"], json!(0));
        let doc = builder().pagination(-5, 20).build();
        assert_eq!(doc["from"], json!(0));
    }

    #[test]
    fn test_size_zero_is_aggregations_only() {
        let doc = builder()
            .pagination(7, 0)
            .add_aggregation(
                Aggregation::new("by_status", "terms")
                    .unwrap()
                    .with_field("status"),
            )
            .build();
        assert_eq!(doc["from"], json!(0));
        assert_eq!(doc["size"], json!(0));
        assert_eq!(
            doc["aggs"],
            json!({"by_status": {"terms": {"field": "status.keyword"}}})
        );
    }

    #[test]
    fn test_negative_size_clamps_to_zero() {
        let doc = builder().pagination(1, -3).build();
        assert_eq!(doc["size"], json!(0));
    }

    #[test]
    fn test_raw_aggregation_merges_by_key() {
        let doc = builder()
            .add_aggregation(
                Aggregation::new("by_status", "terms")
                    .unwrap()
                    .with_field("status"),
            )
            .add_aggregation(Aggregation::stats("price_stats", "price").unwrap())
            .add_aggregation_raw(json!({
                "by_status": {"terms": {"field": "status.keyword", "size": 100}}
            }))
            .build();
        // Last write wins on the overlapping key only.
        assert_eq!(
            doc["aggs"],
            json!({
                "by_status": {"terms": {"field": "status.keyword", "size": 100}},
                "price_stats": {"stats": {"field": "price"}}
            })
        );
    }

    #[test]
    fn test_raw_aggregation_repeat_key_is_idempotent() {
        let fragment = json!({"extra": {"avg": {"field": "price"}}});
        let doc = builder()
            .add_aggregation_raw(fragment.clone())
            .add_aggregation_raw(fragment)
            .build();
        assert_eq!(doc["aggs"], json!({"extra": {"avg": {"field": "price"}}}));
    }

    #[test]
    fn test_raw_non_object_fragment_is_ignored() {
        let doc = builder().add_aggregation_raw(json!([1, 2])).build();
        assert_eq!(doc, json!({"from": 0, "size": 10}));
    }

    #[test]
    fn test_clear_resets_to_defaults() {
        let doc = builder()
            .conditions(vec![status_eq("error")])
            .query_string("message: x")
            .ordering(["-create_time"])
            .pagination(4, 50)
            .add_aggregation(Aggregation::stats("s", "price").unwrap())
            .clear()
            .build();
        assert_eq!(doc, json!({"from": 0, "size": 10}));
    }

    #[test]
    fn test_conditions_json_skips_malformed_entries() {
        let doc = builder()
            .conditions_json(&[
                json!({"kind": "item", "field": "status", "values": ["error"]}),
                json!("not an object"),
            ])
            .build();
        assert_eq!(
            doc["query"]["bool"]["filter"],
            json!([{"terms": {"status": ["error"]}}])
        );
    }

    #[test]
    fn test_rebuild_is_deterministic() {
        let b = builder()
            .conditions(vec![status_eq("error")])
            .query_string("a: b")
            .ordering(["-status"])
            .pagination(2, 25)
            .add_aggregation(Aggregation::stats("s", "price").unwrap());
        assert_eq!(b.build(), b.build());
    }
}
