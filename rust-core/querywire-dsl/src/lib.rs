// SPDX-License-Identifier: PMPL-1.0-or-later
//! Querywire DSL
//!
//! Request-assembly layer on top of `querywire-core`: aggregation trees and
//! the [`SearchQueryBuilder`] that merges compiled conditions, a free-text
//! query, extra filters, sort, paging, and aggregations into one wire
//! document. Transport is out of scope; the built document is handed to a
//! sender collaborator elsewhere.

pub mod aggregation;
pub mod error;
pub mod query;

pub use aggregation::Aggregation;
pub use error::DslError;
pub use query::SearchQueryBuilder;
