// SPDX-License-Identifier: PMPL-1.0-or-later
//! Aggregation trees.
//!
//! An [`Aggregation`] names one node of the request's aggregation document:
//! a wire type (`terms`, `avg`, `top_hits`, ...), an optional field, a bag of
//! type-specific parameters, and child aggregations nested beneath it. Names
//! are validated when the node is constructed, so an invalid name can never
//! end up attached to a caller's document.
//!
//! The common presets (`stats`, `cardinality`, `percentiles`, `top_hits`, ...)
//! are thin constructors over the general node; they add no emission logic of
//! their own.

use serde_json::{Map, Value};

use querywire_core::FieldResolver;

use crate::error::DslError;

/// The `top_hits` type returns documents rather than a metric over a field,
/// so a supplied field is dropped on emission.
const TOP_HITS: &str = "top_hits";

/// One node of an aggregation tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation {
    name: String,
    kind: String,
    field: Option<String>,
    params: Map<String, Value>,
    children: Vec<Aggregation>,
}

impl Aggregation {
    /// Create an aggregation node of the given wire type.
    ///
    /// # Errors
    ///
    /// [`DslError::InvalidAggregationName`] if the name is empty or contains
    /// a double quote, a dot, or a space. Dots would collide with the
    /// engine's response-path notation.
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Result<Self, DslError> {
        let name = name.into();
        validate_name(&name)?;
        Ok(Self {
            name,
            kind: kind.into(),
            field: None,
            params: Map::new(),
            children: Vec::new(),
        })
    }

    /// Set the field this aggregation runs over. Resolution to the wire name
    /// happens at emission time, in aggregation context.
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// Add a type-specific parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Nest a child aggregation beneath this one.
    pub fn with_child(mut self, child: Aggregation) -> Self {
        self.children.push(child);
        self
    }

    /// `stats` over a field: count, min, max, avg, sum in one pass.
    pub fn stats(name: impl Into<String>, field: impl Into<String>) -> Result<Self, DslError> {
        Ok(Self::new(name, "stats")?.with_field(field))
    }

    /// `extended_stats` over a field: `stats` plus variance and deviation.
    pub fn extended_stats(
        name: impl Into<String>,
        field: impl Into<String>,
    ) -> Result<Self, DslError> {
        Ok(Self::new(name, "extended_stats")?.with_field(field))
    }

    /// Approximate distinct count. A precision threshold trades memory for
    /// accuracy; `None` keeps the engine default.
    pub fn cardinality(
        name: impl Into<String>,
        field: impl Into<String>,
        precision_threshold: Option<u64>,
    ) -> Result<Self, DslError> {
        let mut agg = Self::new(name, "cardinality")?.with_field(field);
        if let Some(threshold) = precision_threshold {
            agg = agg.with_param("precision_threshold", threshold);
        }
        Ok(agg)
    }

    /// Percentile breakpoints over a numeric field. `None` keeps the engine's
    /// default breakpoints.
    pub fn percentiles(
        name: impl Into<String>,
        field: impl Into<String>,
        percents: Option<Vec<f64>>,
    ) -> Result<Self, DslError> {
        let mut agg = Self::new(name, "percentiles")?.with_field(field);
        if let Some(percents) = percents {
            agg = agg.with_param("percents", percents);
        }
        Ok(agg)
    }

    /// Top matching documents per bucket, with optional sort and source
    /// filtering. Takes no field.
    pub fn top_hits(
        name: impl Into<String>,
        size: u64,
        sort: Option<Vec<Value>>,
        source: Option<Vec<String>>,
    ) -> Result<Self, DslError> {
        let mut agg = Self::new(name, TOP_HITS)?.with_param("size", size);
        if let Some(sort) = sort {
            agg = agg.with_param("sort", sort);
        }
        if let Some(source) = source {
            agg = agg.with_param("_source", source);
        }
        Ok(agg)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Decode one node from its serialized form:
    /// `{name, type, field?, params?, children?}`.
    ///
    /// Unlike condition decoding this is strict: a malformed aggregation is a
    /// construction-time error, never silently dropped from the document.
    pub fn from_value(value: &Value) -> Result<Self, DslError> {
        let obj = value.as_object().ok_or(DslError::MalformedAggregationNode)?;
        let name = obj
            .get("name")
            .and_then(Value::as_str)
            .ok_or(DslError::MissingAggregationField("name"))?;
        let kind = obj
            .get("type")
            .and_then(Value::as_str)
            .ok_or(DslError::MissingAggregationField("type"))?;

        let mut agg = Aggregation::new(name, kind)?;
        if let Some(field) = obj.get("field").and_then(Value::as_str) {
            agg = agg.with_field(field);
        }
        if let Some(params) = obj.get("params").and_then(Value::as_object) {
            agg.params = params.clone();
        }
        if let Some(children) = obj.get("children").and_then(Value::as_array) {
            for child in children {
                agg = agg.with_child(Aggregation::from_value(child)?);
            }
        }
        Ok(agg)
    }

    /// Emit this node into `parent` under its name, recursing into children.
    pub(crate) fn emit_into(&self, parent: &mut Map<String, Value>, resolver: &FieldResolver) {
        let mut body = Map::new();
        if self.kind != TOP_HITS {
            if let Some(ref field) = self.field {
                body.insert(
                    "field".to_string(),
                    Value::from(resolver.resolve(field, true)),
                );
            }
        }
        for (key, value) in &self.params {
            body.insert(key.clone(), value.clone());
        }

        let mut node = Map::new();
        node.insert(self.kind.clone(), Value::Object(body));

        if !self.children.is_empty() {
            let mut child_map = Map::new();
            for child in &self.children {
                child.emit_into(&mut child_map, resolver);
            }
            node.insert("aggs".to_string(), Value::Object(child_map));
        }

        parent.insert(self.name.clone(), Value::Object(node));
    }
}

fn validate_name(name: &str) -> Result<(), DslError> {
    if name.is_empty() || name.contains(['"', '.', ' ']) {
        return Err(DslError::InvalidAggregationName(name.to_string()));
    }
    Ok(())
}
