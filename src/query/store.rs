//! Document-store encoder
//!
//! Produces a find predicate plus retrieval options:
//!
//! - every exact clause becomes `{field: {"$in": [...]}}`, even for a single
//!   value (a one-element `$in` is equality)
//! - match clauses form a second equality predicate that is AND-ed with the
//!   exact predicate via `$and`; with no exact clauses the left-hand side is
//!   the always-true `{}`
//! - projection includes only the named fields (`_id` is excluded unless `id`
//!   is requested)
//! - sort keys map to `1` / `-1` in the order given; BSON documents keep
//!   insertion order so the multi-key precedence is deterministic

use crate::core::document::{STORE_ID_FIELD, store_field, value_to_bson};
use crate::core::filter::CanonicalFilterRequest;
use crate::query::plan::FilterPlan;
use mongodb::bson::{Bson, Document, doc};

/// Projection and sort for a find call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrievalOptions {
    pub projection: Option<Document>,
    pub sort: Option<Document>,
}

/// A compiled document-store query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreQuery {
    pub filter: Document,
    pub options: RetrievalOptions,
}

impl StoreQuery {
    /// Match every record, unprojected, in store order
    pub fn all() -> Self {
        Self::default()
    }
}

/// Compile a validated request for the document store
pub fn compile_for_store(req: &CanonicalFilterRequest) -> StoreQuery {
    encode_store(&FilterPlan::from_request(req))
}

/// Encode a filter plan as a store predicate and retrieval options
pub fn encode_store(plan: &FilterPlan) -> StoreQuery {
    let mut exact = Document::new();
    for (field, values) in plan.exact_clauses() {
        let set: Vec<Bson> = values.iter().map(value_to_bson).collect();
        exact.insert(store_field(field), doc! { "$in": set });
    }

    let mut matched = Document::new();
    for (field, value) in plan.match_clauses() {
        matched.insert(store_field(field), value_to_bson(value));
    }

    let filter = if matched.is_empty() {
        exact
    } else {
        doc! { "$and": [exact, matched] }
    };

    StoreQuery {
        filter,
        options: RetrievalOptions {
            projection: projection(&plan.projection),
            sort: sort(plan),
        },
    }
}

fn projection(fields: &[String]) -> Option<Document> {
    if fields.is_empty() {
        return None;
    }

    let mut projection = Document::new();
    for field in fields {
        projection.insert(store_field(field), 1);
    }
    if !projection.contains_key(STORE_ID_FIELD) {
        projection.insert(STORE_ID_FIELD, 0);
    }
    Some(projection)
}

fn sort(plan: &FilterPlan) -> Option<Document> {
    if plan.sort.is_empty() {
        return None;
    }

    let mut sort = Document::new();
    for key in &plan.sort {
        sort.insert(store_field(&key.field), key.direction.as_store_key());
    }
    Some(sort)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::filter::SortKey;

    #[test]
    fn test_empty_request_matches_everything() {
        let query = compile_for_store(&CanonicalFilterRequest::new());
        assert!(query.filter.is_empty());
        assert_eq!(query.options, RetrievalOptions::default());
        assert_eq!(query, StoreQuery::all());
    }

    #[test]
    fn test_single_value_uses_set_membership() {
        let query = compile_for_store(&CanonicalFilterRequest::new().exact("status", ["Shipped"]));
        assert_eq!(query.filter, doc! { "status": { "$in": ["Shipped"] } });
    }

    #[test]
    fn test_multi_value_and_across_fields() {
        let req = CanonicalFilterRequest::new()
            .exact("status", ["Shipped", "Delivered"])
            .exact("city", ["Izmir"]);
        let query = compile_for_store(&req);
        assert_eq!(
            query.filter,
            doc! {
                "status": { "$in": ["Shipped", "Delivered"] },
                "city": { "$in": ["Izmir"] }
            }
        );
    }

    #[test]
    fn test_match_is_anded_with_exact() {
        let req = CanonicalFilterRequest::new()
            .exact("status", ["Shipped"])
            .matching("userId", "u1");
        let query = compile_for_store(&req);
        assert_eq!(
            query.filter,
            doc! { "$and": [ { "status": { "$in": ["Shipped"] } }, { "userId": "u1" } ] }
        );
    }

    #[test]
    fn test_match_only_keeps_empty_left_hand_side() {
        let req = CanonicalFilterRequest::new().matching("city", "Izmir");
        let query = compile_for_store(&req);
        assert_eq!(query.filter, doc! { "$and": [ {}, { "city": "Izmir" } ] });
    }

    #[test]
    fn test_id_maps_to_primary_key() {
        let req = CanonicalFilterRequest::new()
            .exact("id", ["o-1"])
            .project(["id", "status"])
            .sort_by(SortKey::asc("id"));
        let query = compile_for_store(&req);

        assert_eq!(query.filter, doc! { "_id": { "$in": ["o-1"] } });
        assert_eq!(
            query.options.projection,
            Some(doc! { "_id": 1, "status": 1 })
        );
        assert_eq!(query.options.sort, Some(doc! { "_id": 1 }));
    }

    #[test]
    fn test_projection_excludes_primary_key_unless_requested() {
        let req = CanonicalFilterRequest::new().project(["status", "total"]);
        let query = compile_for_store(&req);
        assert_eq!(
            query.options.projection,
            Some(doc! { "status": 1, "total": 1, "_id": 0 })
        );
    }

    #[test]
    fn test_projection_has_no_path_collision() {
        let req = CanonicalFilterRequest::new().project(["lineItems", "lineItems.name"]);
        let query = compile_for_store(&req);
        assert_eq!(
            query.options.projection,
            Some(doc! { "lineItems": 1, "_id": 0 })
        );
    }

    #[test]
    fn test_sort_keys_keep_given_order() {
        let req = CanonicalFilterRequest::new()
            .sort_by(SortKey::desc("total"))
            .sort_by(SortKey::asc("createdAt"));
        let sort = compile_for_store(&req).options.sort.unwrap();
        let keys: Vec<&String> = sort.keys().collect();
        assert_eq!(keys, vec!["total", "createdAt"]);
        assert_eq!(sort.get_i32("total").unwrap(), -1);
        assert_eq!(sort.get_i32("createdAt").unwrap(), 1);
    }

    #[test]
    fn test_compilation_is_idempotent() {
        let req = CanonicalFilterRequest::new()
            .exact("status", ["Shipped", "Delivered"])
            .matching("city", "Izmir")
            .project(["status"])
            .sort_by(SortKey::desc("total"));
        assert_eq!(compile_for_store(&req), compile_for_store(&req));
    }
}
