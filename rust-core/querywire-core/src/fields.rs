// SPDX-License-Identifier: PMPL-1.0-or-later
//! Field name resolution.
//!
//! Maps application-level field names to the wire field names the remote
//! engine understands. Aggregation and sort contexts may use a different
//! wire name than filtering (typically a keyword sub-field of a text field),
//! so every lookup carries a `for_aggregation` flag.
//!
//! Resolution never fails: a name with no registered mapping passes through
//! unchanged.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Mapping from one application-level field name to its wire name(s).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldMapping {
    /// Application-level name used by callers.
    pub name: String,
    /// Wire name used in filter context.
    pub wire_name: String,
    /// Wire name used in aggregation/sort context, when it differs.
    #[serde(default)]
    pub wire_name_for_agg: Option<String>,
    /// Human-readable label (passed through to UI layers, unused here).
    #[serde(default)]
    pub display: String,
    /// Whether the field is text-like (informs aggregation result handling
    /// downstream, unused by the compiler itself).
    #[serde(default)]
    pub is_text: bool,
}

impl FieldMapping {
    /// Create a mapping with identical filter and aggregation wire names.
    pub fn new(name: impl Into<String>, wire_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            wire_name: wire_name.into(),
            wire_name_for_agg: None,
            display: String::new(),
            is_text: false,
        }
    }

    /// Set a distinct wire name for aggregation/sort context.
    pub fn with_agg_name(mut self, wire_name_for_agg: impl Into<String>) -> Self {
        self.wire_name_for_agg = Some(wire_name_for_agg.into());
        self
    }

    /// Set the display label.
    pub fn with_display(mut self, display: impl Into<String>) -> Self {
        self.display = display.into();
        self
    }

    /// Mark the field as text-like.
    pub fn text(mut self) -> Self {
        self.is_text = true;
        self
    }

    /// The wire name for the given context.
    pub fn wire_name(&self, for_aggregation: bool) -> &str {
        if for_aggregation {
            if let Some(ref agg) = self.wire_name_for_agg {
                return agg;
            }
        }
        &self.wire_name
    }
}

/// Immutable registry of field mappings.
///
/// Safe to share read-only across concurrent compiles.
#[derive(Debug, Clone, Default)]
pub struct FieldResolver {
    mappings: HashMap<String, FieldMapping>,
}

impl FieldResolver {
    /// Build a resolver from a list of mappings. Later duplicates of the
    /// same application name replace earlier ones.
    pub fn new(mappings: impl IntoIterator<Item = FieldMapping>) -> Self {
        Self {
            mappings: mappings
                .into_iter()
                .map(|m| (m.name.clone(), m))
                .collect(),
        }
    }

    /// Resolve an application-level name to its wire name.
    ///
    /// Unknown names are returned unchanged. With `for_aggregation` set, the
    /// aggregation-specific wire name is preferred when registered, falling
    /// back to the filter wire name.
    pub fn resolve<'a>(&'a self, name: &'a str, for_aggregation: bool) -> &'a str {
        match self.mappings.get(name) {
            Some(mapping) => mapping.wire_name(for_aggregation),
            None => name,
        }
    }

    /// Resolve a sort field, preserving a leading `-` descending marker.
    ///
    /// Sort resolution uses aggregation-context wire names, since sorting on
    /// a text field requires the same keyword-like sub-field as aggregating
    /// on it.
    pub fn resolve_sort(&self, field: &str) -> String {
        match field.strip_prefix('-') {
            Some(rest) => format!("-{}", self.resolve(rest, true)),
            None => self.resolve(field, true).to_string(),
        }
    }

    /// Look up the full mapping for an application name, if registered.
    pub fn mapping(&self, name: &str) -> Option<&FieldMapping> {
        self.mappings.get(name)
    }
}
