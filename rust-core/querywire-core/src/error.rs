// SPDX-License-Identifier: PMPL-1.0-or-later
//! Core error types.

use thiserror::Error;

/// Errors raised at construction time, before a node ever reaches the
/// compiler. Malformed input encountered *during* compilation is skipped
/// with a diagnostic instead (see the compiler module).
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("invalid combinator: {0:?}, must be 'and' or 'or'")]
    InvalidCombinator(String),

    #[error("nested condition path cannot be empty")]
    EmptyNestedPath,

    #[error("invalid score_mode: {0:?}, must be one of avg, max, min, sum, none")]
    InvalidScoreMode(String),

    #[error("invalid minimum_should_match: {0}")]
    InvalidMinimumShouldMatch(String),

    #[error("missing required field {field:?} in {kind} condition")]
    MissingConditionField {
        kind: &'static str,
        field: &'static str,
    },

    #[error("unknown condition kind: {0:?}")]
    UnknownConditionKind(String),

    #[error("condition node must be a JSON object")]
    MalformedConditionNode,

    #[error("between comparison requires exactly two bounds, got {0}")]
    BetweenBounds(usize),

    #[error("unsupported query string operator: {0}")]
    UnsupportedOperator(String),
}
