// SPDX-License-Identifier: PMPL-1.0-or-later
//! Assembly-layer error types.

use thiserror::Error;

/// Errors raised while registering aggregations or assembling a request.
///
/// Like the core crate, construction-time validation is fatal to the
/// offending call; nothing here aborts a `build()` already in progress.
#[derive(Error, Debug)]
pub enum DslError {
    #[error("invalid aggregation name {0:?}: must be non-empty and contain no '\"', '.' or space")]
    InvalidAggregationName(String),

    #[error("aggregation node must be a JSON object")]
    MalformedAggregationNode,

    #[error("aggregation node is missing required field {0:?}")]
    MissingAggregationField(&'static str),
}
