// SPDX-License-Identifier: PMPL-1.0-or-later
//! Property-based tests for request assembly

use proptest::prelude::*;
use serde_json::{json, Value};

use querywire_core::{FieldMapping, FieldResolver};
use querywire_dsl::{Aggregation, SearchQueryBuilder};

fn resolver() -> FieldResolver {
    FieldResolver::new([FieldMapping::new("status", "status").with_agg_name("status.keyword")])
}

/// Generate arbitrary aggregation names that pass validation
fn arb_agg_name() -> impl Strategy<Value = String> {
    "[a-z_][a-z0-9_-]{0,15}"
}

proptest! {
    #[test]
    fn test_from_is_page_offset_times_size(page in -5i64..50, size in -5i64..100) {
        let doc = SearchQueryBuilder::new(resolver())
            .pagination(page, size)
            .build();
        let clamped_page = page.max(1);
        let clamped_size = size.max(0);
        prop_assert_eq!(&doc["from"], &json!((clamped_page - 1) * clamped_size));
        prop_assert_eq!(&doc["size"], &json!(clamped_size));
        // from is never negative regardless of input
        prop_assert!(doc["from"].as_i64().unwrap() >= 0);
    }

    #[test]
    fn test_raw_merge_is_last_write_wins(name in arb_agg_name(), a in 0u64..100, b in 0u64..100) {
        let doc = SearchQueryBuilder::new(resolver())
            .add_aggregation_raw(json!({name.as_str(): {"terms": {"size": a}}}))
            .add_aggregation_raw(json!({name.as_str(): {"terms": {"size": b}}}))
            .build();
        prop_assert_eq!(&doc["aggs"][&name]["terms"]["size"], &json!(b));
    }

    #[test]
    fn test_raw_merge_never_disturbs_other_fields(name in arb_agg_name(), fragment in 0u64..100) {
        let doc = SearchQueryBuilder::new(resolver())
            .query_string("status: active")
            .ordering(["-status"])
            .pagination(2, 25)
            .add_aggregation_raw(json!({name.as_str(): {"terms": {"size": fragment}}}))
            .build();
        prop_assert_eq!(&doc["from"], &json!(25));
        prop_assert_eq!(&doc["size"], &json!(25));
        prop_assert_eq!(&doc["sort"], &json!(["-status.keyword"]));
        prop_assert_eq!(
            &doc["query"],
            &json!({"bool": {"must": [{"query_string": {"query": "status: active"}}]}})
        );
    }

    #[test]
    fn test_registered_aggregation_names_all_appear(
        names in prop::collection::hash_set(arb_agg_name(), 1..6)
    ) {
        let mut builder = SearchQueryBuilder::new(resolver());
        for name in &names {
            builder = builder.add_aggregation(
                Aggregation::new(name.clone(), "terms").unwrap().with_field("status"),
            );
        }
        let doc = builder.build();
        let aggs = doc["aggs"].as_object().unwrap();
        for name in &names {
            prop_assert!(aggs.contains_key(name));
        }
        prop_assert_eq!(aggs.len(), names.len());
    }

    #[test]
    fn test_build_is_pure(qs in "[a-z: ]{0,20}", page in 1i64..10, size in 0i64..50) {
        let builder = SearchQueryBuilder::new(resolver())
            .query_string(qs)
            .ordering(["-status"])
            .pagination(page, size);
        let first = builder.build();
        let second = builder.build();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn test_invalid_names_never_construct(name in "[a-z]{0,4}[\". ][a-z]{0,4}") {
        prop_assert!(Aggregation::new(name, "terms").is_err());
    }
}
