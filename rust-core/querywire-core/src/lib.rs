// SPDX-License-Identifier: PMPL-1.0-or-later
//! Querywire core
//!
//! Compiles declarative condition trees into boolean query documents for a
//! JSON search-engine wire protocol. Callers describe *what* to filter with
//! a small vocabulary of node kinds (single condition, logical group,
//! nested-document scope) over application-level field names; this crate
//! resolves field names, validates structure, and emits the boolean query
//! tree with correct AND/OR/NOT semantics and nested-document scoping.
//!
//! The crate performs no I/O: the compiled document is handed to a transport
//! collaborator elsewhere.

pub mod compiler;
pub mod condition;
pub mod error;
pub mod fields;
pub mod qstring;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use compiler::ConditionCompiler;
pub use condition::{
    ConditionGroup, ConditionItem, ConditionNode, MinimumShouldMatch, NestedCondition,
};
pub use error::QueryError;
pub use fields::{FieldMapping, FieldResolver};
pub use qstring::{escape_query_string, Q, QueryStringOperator};

/// Logical combinator joining a node with its siblings (or, for a group,
/// joining the group's children).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Combinator {
    /// `must` semantics — every clause has to match.
    #[default]
    And,
    /// `should` semantics — any clause may match.
    Or,
}

impl fmt::Display for Combinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Combinator::And => write!(f, "and"),
            Combinator::Or => write!(f, "or"),
        }
    }
}

impl FromStr for Combinator {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "and" => Ok(Combinator::And),
            "or" => Ok(Combinator::Or),
            _ => Err(QueryError::InvalidCombinator(s.to_string())),
        }
    }
}

/// Relevance-score aggregation for matching sub-documents in a nested scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreMode {
    Avg,
    Max,
    Min,
    Sum,
    None,
}

impl ScoreMode {
    /// Wire token for the `score_mode` key of a nested query.
    pub fn as_str(self) -> &'static str {
        match self {
            ScoreMode::Avg => "avg",
            ScoreMode::Max => "max",
            ScoreMode::Min => "min",
            ScoreMode::Sum => "sum",
            ScoreMode::None => "none",
        }
    }
}

impl fmt::Display for ScoreMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScoreMode {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "avg" => Ok(ScoreMode::Avg),
            "max" => Ok(ScoreMode::Max),
            "min" => Ok(ScoreMode::Min),
            "sum" => Ok(ScoreMode::Sum),
            "none" => Ok(ScoreMode::None),
            _ => Err(QueryError::InvalidScoreMode(s.to_string())),
        }
    }
}

/// Comparison method of a single condition item.
///
/// The token set matches the wire-level vocabulary callers use
/// (`eq`, `neq`, `include`, ...). Unrecognized tokens degrade to [`Equals`]
/// via [`CompareMethod::parse_lossy`] rather than failing the compile.
///
/// [`Equals`]: CompareMethod::Equals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareMethod {
    #[default]
    #[serde(rename = "eq")]
    Equals,
    #[serde(rename = "neq")]
    NotEquals,
    /// Substring/wildcard match.
    #[serde(rename = "include")]
    Contains,
    #[serde(rename = "exclude")]
    NotContains,
    #[serde(rename = "gt")]
    GreaterThan,
    #[serde(rename = "gte")]
    GreaterOrEqual,
    #[serde(rename = "lt")]
    LessThan,
    #[serde(rename = "lte")]
    LessOrEqual,
    /// Field-presence test; ignores the item's values.
    #[serde(rename = "exists")]
    Exists,
    #[serde(rename = "nexists")]
    NotExists,
}

impl CompareMethod {
    /// Wire token for this method.
    pub fn as_str(self) -> &'static str {
        match self {
            CompareMethod::Equals => "eq",
            CompareMethod::NotEquals => "neq",
            CompareMethod::Contains => "include",
            CompareMethod::NotContains => "exclude",
            CompareMethod::GreaterThan => "gt",
            CompareMethod::GreaterOrEqual => "gte",
            CompareMethod::LessThan => "lt",
            CompareMethod::LessOrEqual => "lte",
            CompareMethod::Exists => "exists",
            CompareMethod::NotExists => "nexists",
        }
    }

    /// True for the four range comparisons.
    pub fn is_range(self) -> bool {
        matches!(
            self,
            CompareMethod::GreaterThan
                | CompareMethod::GreaterOrEqual
                | CompareMethod::LessThan
                | CompareMethod::LessOrEqual
        )
    }

    /// Parse a wire token, degrading unknown tokens to [`CompareMethod::Equals`]
    /// with a warning instead of failing.
    pub fn parse_lossy(token: &str) -> Self {
        match token {
            "eq" => CompareMethod::Equals,
            "neq" => CompareMethod::NotEquals,
            "include" => CompareMethod::Contains,
            "exclude" => CompareMethod::NotContains,
            "gt" => CompareMethod::GreaterThan,
            "gte" => CompareMethod::GreaterOrEqual,
            "lt" => CompareMethod::LessThan,
            "lte" => CompareMethod::LessOrEqual,
            "exists" => CompareMethod::Exists,
            "nexists" => CompareMethod::NotExists,
            other => {
                tracing::warn!(method = other, "unknown comparison method, treating as eq");
                CompareMethod::Equals
            }
        }
    }
}

impl fmt::Display for CompareMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
