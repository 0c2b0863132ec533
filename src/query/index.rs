//! Search-index encoder
//!
//! Produces one self-contained query document for the index's `_search`
//! endpoint:
//!
//! ```json
//! {
//!   "query": { "bool": { "must": [
//!       { "terms": { "status": ["Shipped", "Delivered"] } },
//!       { "term":  { "city": "Izmir" } },
//!       { "match": { "addressDetail": "harbour" } }
//!   ] } },
//!   "_source": ["id", "status"],
//!   "sort": [ { "total": { "order": "desc" } } ],
//!   "size": 10000,
//!   "track_total_hits": true
//! }
//! ```
//!
//! An unrestricted plan compiles to `match_all`. Sort is always a list so that
//! multi-key precedence survives JSON encoding. The index returns only 10 hits
//! unless told otherwise, so every body asks for a full result window and an
//! exact total; the normalizer rejects a response that holds fewer hits than
//! the total.

use crate::core::filter::CanonicalFilterRequest;
use crate::query::plan::FilterPlan;
use serde::Serialize;
use serde_json::{Map, Value, json};

/// Hits requested per search; the index's default `max_result_window`
pub const MAX_RESULT_WINDOW: u64 = 10_000;

/// A compiled search-index query body
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SearchQuery(Value);

impl SearchQuery {
    /// Match every record, unprojected, in index order
    pub fn all() -> Self {
        encode_index(&FilterPlan::default())
    }

    /// Ask for at most `size` hits instead of the full result window
    pub fn with_size(mut self, size: u64) -> Self {
        if let Value::Object(body) = &mut self.0 {
            body.insert("size".to_string(), json!(size));
        }
        self
    }

    pub fn body(&self) -> &Value {
        &self.0
    }

    pub fn into_body(self) -> Value {
        self.0
    }
}

/// Compile a validated request for the search index
pub fn compile_for_index(req: &CanonicalFilterRequest) -> SearchQuery {
    encode_index(&FilterPlan::from_request(req))
}

/// Encode a filter plan as a boolean query document
pub fn encode_index(plan: &FilterPlan) -> SearchQuery {
    let mut must: Vec<Value> = Vec::with_capacity(plan.clauses.len());

    for (field, values) in plan.exact_clauses() {
        let clause = match values {
            [single] => json!({ "term": { field: single } }),
            many => json!({ "terms": { field: many } }),
        };
        must.push(clause);
    }

    for (field, value) in plan.match_clauses() {
        must.push(json!({ "match": { field: value } }));
    }

    let query = if must.is_empty() {
        json!({ "match_all": {} })
    } else {
        json!({ "bool": { "must": must } })
    };

    let mut body = Map::new();
    body.insert("query".to_string(), query);

    if !plan.projection.is_empty() {
        body.insert("_source".to_string(), json!(plan.projection));
    }

    if !plan.sort.is_empty() {
        let sort: Vec<Value> = plan
            .sort
            .iter()
            .map(|key| json!({ key.field.as_str(): { "order": key.direction.as_str() } }))
            .collect();
        body.insert("sort".to_string(), Value::Array(sort));
    }

    body.insert("size".to_string(), json!(MAX_RESULT_WINDOW));
    body.insert("track_total_hits".to_string(), Value::Bool(true));

    SearchQuery(Value::Object(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::filter::SortKey;

    #[test]
    fn test_empty_request_is_match_all() {
        let query = compile_for_index(&CanonicalFilterRequest::new());
        assert_eq!(
            query.body(),
            &json!({
                "query": { "match_all": {} },
                "size": MAX_RESULT_WINDOW,
                "track_total_hits": true
            })
        );
        assert_eq!(query, SearchQuery::all());
    }

    #[test]
    fn test_filtered_body_asks_for_full_window() {
        let req = CanonicalFilterRequest::new().exact("status", ["Shipped", "Delivered"]);
        let body = compile_for_index(&req).into_body();
        assert_eq!(body["size"], json!(10_000));
        assert_eq!(body["track_total_hits"], json!(true));
    }

    #[test]
    fn test_with_size_overrides_window() {
        let query = SearchQuery::all().with_size(3);
        assert_eq!(query.body()["size"], json!(3));
        assert_eq!(query.body()["query"], json!({ "match_all": {} }));
    }

    #[test]
    fn test_single_value_is_term() {
        let query = compile_for_index(&CanonicalFilterRequest::new().exact("status", ["Shipped"]));
        assert_eq!(
            query.body()["query"],
            json!({ "bool": { "must": [ { "term": { "status": "Shipped" } } ] } })
        );
    }

    #[test]
    fn test_multi_value_is_terms() {
        let req = CanonicalFilterRequest::new().exact("status", ["Shipped", "Delivered"]);
        let query = compile_for_index(&req);
        assert_eq!(
            query.body()["query"]["bool"]["must"][0],
            json!({ "terms": { "status": ["Shipped", "Delivered"] } })
        );
    }

    #[test]
    fn test_match_joins_the_same_bool_group() {
        let req = CanonicalFilterRequest::new()
            .exact("status", ["Shipped"])
            .matching("addressDetail", "harbour street");
        let must = compile_for_index(&req).into_body()["query"]["bool"]["must"].clone();
        assert_eq!(
            must,
            json!([
                { "term": { "status": "Shipped" } },
                { "match": { "addressDetail": "harbour street" } }
            ])
        );
    }

    #[test]
    fn test_source_inclusion_list() {
        let req = CanonicalFilterRequest::new().project(["id", "total"]);
        let query = compile_for_index(&req);
        assert_eq!(query.body()["_source"], json!(["id", "total"]));
        assert_eq!(query.body()["query"], json!({ "match_all": {} }));
    }

    #[test]
    fn test_sort_is_ordered_list() {
        let req = CanonicalFilterRequest::new()
            .sort_by(SortKey::desc("total"))
            .sort_by(SortKey::asc("createdAt"));
        assert_eq!(
            compile_for_index(&req).body()["sort"],
            json!([
                { "total": { "order": "desc" } },
                { "createdAt": { "order": "asc" } }
            ])
        );
    }

    #[test]
    fn test_compilation_is_idempotent() {
        let req = CanonicalFilterRequest::new()
            .exact("status", ["Shipped", "Delivered"])
            .exact("city", ["Izmir"])
            .matching("addressDetail", "harbour")
            .project(["status"])
            .sort_by(SortKey::desc("total"))
            .sort_by(SortKey::asc("city"));
        assert_eq!(compile_for_index(&req), compile_for_index(&req));
    }
}
