//! In-memory store and index for development and testing
//!
//! Both backends execute the *compiled* queries rather than the canonical
//! request, so tests exercise the same predicate documents and query bodies
//! that the real backends receive. Supported surface:
//!
//! - store: implicit equality, `$in`, `$eq`, `$and`, `$or`, dotted paths that
//!   fan out over arrays, inclusion projection, multi-key sort
//! - index: `match_all`, `bool.must`/`bool.filter`, `term`, `terms`, `match`
//!   (lower-cased token overlap), `_source` inclusion list, sort list, `size`
//!   (the total still counts every match)

use crate::core::document::{STORE_ID_FIELD, json_to_document};
use crate::core::order::Order;
use crate::core::service::{Backend, BackendRejection, OrderIndex, OrderStore};
use crate::query::{SearchQuery, StoreQuery};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use indexmap::IndexMap;
use mongodb::bson::{Bson, Document};
use serde_json::{Map, Value, json};
use std::cmp::Ordering;
use std::sync::{Arc, RwLock};

// ---------------------------------------------------------------------------
// InMemoryOrderStore
// ---------------------------------------------------------------------------

/// In-memory document store keeping insertion order
#[derive(Clone, Default)]
pub struct InMemoryOrderStore {
    documents: Arc<RwLock<Vec<Document>>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents
    pub fn len(&self) -> usize {
        self.documents.read().map(|docs| docs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn document_id(doc: &Document) -> Option<&str> {
    doc.get_str(STORE_ID_FIELD).ok()
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn insert(&self, order: &Order) -> Result<()> {
        let doc = json_to_document(serde_json::to_value(order)?)?;
        let mut documents = self
            .documents
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        if documents.iter().any(|d| document_id(d) == Some(order.id.as_str())) {
            let reason = format!("Duplicate key: {}", order.id);
            return Err(BackendRejection::new(Backend::Store, reason).into());
        }
        documents.push(doc);

        Ok(())
    }

    async fn find(&self, query: &StoreQuery) -> Result<Vec<Document>> {
        let documents = self
            .documents
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;

        let mut found: Vec<&Document> = documents
            .iter()
            .filter(|doc| matches_filter(doc, &query.filter))
            .collect();

        if let Some(sort) = &query.options.sort {
            found.sort_by(|a, b| compare_documents(a, b, sort));
        }

        Ok(found
            .into_iter()
            .map(|doc| match &query.options.projection {
                Some(projection) => project_document(doc, projection),
                None => doc.clone(),
            })
            .collect())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Document>> {
        let documents = self
            .documents
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;

        Ok(documents.iter().find(|d| document_id(d) == Some(id)).cloned())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let mut documents = self
            .documents
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        let before = documents.len();
        documents.retain(|d| document_id(d) != Some(id));

        Ok(documents.len() != before)
    }
}

fn matches_filter(doc: &Document, filter: &Document) -> bool {
    filter.iter().all(|(key, condition)| match key.as_str() {
        "$and" => sub_filters(condition).all(|sub| matches_filter(doc, sub)),
        "$or" => sub_filters(condition).any(|sub| matches_filter(doc, sub)),
        field => matches_condition(&bson_path(doc, field), condition),
    })
}

fn sub_filters(condition: &Bson) -> impl Iterator<Item = &Document> {
    condition
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(Bson::as_document)
}

fn matches_condition(values: &[&Bson], condition: &Bson) -> bool {
    match condition {
        Bson::Document(ops) if ops.keys().any(|k| k.starts_with('$')) => {
            ops.iter().all(|(op, arg)| match op.as_str() {
                "$in" => arg.as_array().is_some_and(|set| {
                    values
                        .iter()
                        .any(|value| set.iter().any(|candidate| bson_eq(value, candidate)))
                }),
                "$eq" => values.iter().any(|value| bson_eq(value, arg)),
                _ => false,
            })
        }
        _ => values.iter().any(|value| bson_eq(value, condition)),
    }
}

/// Resolve a dotted path, fanning out over arrays like the store does
fn bson_path<'a>(doc: &'a Document, path: &str) -> Vec<&'a Bson> {
    let mut segments = path.split('.');
    let mut current: Vec<&Bson> = segments
        .next()
        .and_then(|first| doc.get(first))
        .into_iter()
        .collect();

    for segment in segments {
        current = current
            .into_iter()
            .flat_map(|value| descend_bson(value, segment))
            .collect();
    }

    current
        .into_iter()
        .flat_map(|value| match value {
            Bson::Array(items) => items.iter().chain(std::iter::once(value)).collect(),
            other => vec![other],
        })
        .collect()
}

fn descend_bson<'a>(value: &'a Bson, segment: &str) -> Vec<&'a Bson> {
    match value {
        Bson::Document(doc) => doc.get(segment).into_iter().collect(),
        Bson::Array(items) => items
            .iter()
            .flat_map(|item| descend_bson(item, segment))
            .collect(),
        _ => Vec::new(),
    }
}

fn bson_number(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(i) => Some(f64::from(*i)),
        Bson::Int64(i) => Some(*i as f64),
        Bson::Double(d) => Some(*d),
        _ => None,
    }
}

fn bson_eq(a: &Bson, b: &Bson) -> bool {
    match (bson_number(a), bson_number(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn compare_bson(a: Option<&Bson>, b: Option<&Bson>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => match (bson_number(a), bson_number(b)) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            _ => match (a, b) {
                (Bson::String(x), Bson::String(y)) => x.cmp(y),
                (Bson::Boolean(x), Bson::Boolean(y)) => x.cmp(y),
                _ => Ordering::Equal,
            },
        },
    }
}

fn compare_documents(a: &Document, b: &Document, sort: &Document) -> Ordering {
    for (field, direction) in sort {
        let ordering = compare_bson(
            bson_path(a, field).first().copied(),
            bson_path(b, field).first().copied(),
        );
        let ordering = if bson_number(direction).is_some_and(|d| d < 0.0) {
            ordering.reverse()
        } else {
            ordering
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Inclusion projection on top-level keys (`a.b` keeps `a`)
fn project_document(doc: &Document, projection: &Document) -> Document {
    let keep_id = projection
        .get(STORE_ID_FIELD)
        .and_then(bson_number)
        .is_none_or(|flag| flag != 0.0);

    let mut projected = Document::new();
    if keep_id {
        if let Some(id) = doc.get(STORE_ID_FIELD) {
            projected.insert(STORE_ID_FIELD, id.clone());
        }
    }

    for (field, flag) in projection {
        if field == STORE_ID_FIELD || bson_number(flag).is_some_and(|f| f == 0.0) {
            continue;
        }
        let top = field.split('.').next().unwrap_or(field);
        if let Some(value) = doc.get(top) {
            projected.insert(top, value.clone());
        }
    }
    projected
}

// ---------------------------------------------------------------------------
// InMemoryOrderIndex
// ---------------------------------------------------------------------------

/// In-memory search index keyed by order id
#[derive(Clone)]
pub struct InMemoryOrderIndex {
    name: String,
    sources: Arc<RwLock<IndexMap<String, Value>>>,
}

impl InMemoryOrderIndex {
    pub fn new() -> Self {
        Self::named("orders")
    }

    /// Create an index reporting `name` as `_index` on every hit
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sources: Arc::new(RwLock::new(IndexMap::new())),
        }
    }

    /// Whether a document with this id is indexed
    pub fn contains(&self, id: &str) -> bool {
        self.sources
            .read()
            .map(|sources| sources.contains_key(id))
            .unwrap_or(false)
    }

    /// Number of indexed documents
    pub fn len(&self) -> usize {
        self.sources.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryOrderIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OrderIndex for InMemoryOrderIndex {
    async fn put(&self, order: &Order) -> Result<()> {
        let source = serde_json::to_value(order)?;
        let mut sources = self
            .sources
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        sources.insert(order.id.clone(), source);
        Ok(())
    }

    async fn search(&self, query: &SearchQuery) -> Result<Value> {
        let body = query.body();
        let sources = self
            .sources
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;

        let clause = body.get("query").cloned().unwrap_or(json!({ "match_all": {} }));
        let mut hits: Vec<(&String, &Value)> = sources
            .iter()
            .filter(|(_, source)| matches_query(source, &clause))
            .collect();

        if let Some(Value::Array(sort)) = body.get("sort") {
            let keys = sort_keys(sort);
            hits.sort_by(|(_, a), (_, b)| compare_sources(a, b, &keys));
        }

        let total = hits.len();
        if let Some(size) = body.get("size").and_then(Value::as_u64) {
            hits.truncate(usize::try_from(size).unwrap_or(usize::MAX));
        }

        let includes: Option<Vec<&str>> = match body.get("_source") {
            Some(Value::Array(fields)) => Some(fields.iter().filter_map(Value::as_str).collect()),
            _ => None,
        };

        let hits: Vec<Value> = hits
            .into_iter()
            .map(|(id, source)| {
                let source = match &includes {
                    Some(fields) => filter_source(source, fields),
                    None => source.clone(),
                };
                json!({ "_index": self.name, "_id": id, "_score": null, "_source": source })
            })
            .collect();

        Ok(json!({
            "took": 0,
            "timed_out": false,
            "hits": {
                "total": { "value": total, "relation": "eq" },
                "max_score": null,
                "hits": hits
            }
        }))
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let mut sources = self
            .sources
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        Ok(sources.shift_remove(id).is_some())
    }
}

fn matches_query(source: &Value, query: &Value) -> bool {
    let Some(query) = query.as_object() else {
        return false;
    };

    query.iter().all(|(kind, params)| match kind.as_str() {
        "match_all" => true,
        "bool" => ["must", "filter"]
            .iter()
            .all(|group| clause_list(params.get(*group)).all(|c| matches_query(source, c))),
        "term" => single_field(params).is_some_and(|(field, expected)| {
            let expected = unwrap_param(expected, "value");
            json_path(source, field).iter().any(|v| json_eq(v, expected))
        }),
        "terms" => single_field(params).is_some_and(|(field, set)| {
            let set = set.as_array().map(Vec::as_slice).unwrap_or_default();
            json_path(source, field)
                .iter()
                .any(|v| set.iter().any(|candidate| json_eq(v, candidate)))
        }),
        "match" => single_field(params).is_some_and(|(field, expected)| {
            let expected = unwrap_param(expected, "query");
            json_path(source, field)
                .iter()
                .any(|v| text_matches(v, expected))
        }),
        _ => false,
    })
}

fn clause_list(group: Option<&Value>) -> impl Iterator<Item = &Value> {
    let items: Vec<&Value> = match group {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(single @ Value::Object(_)) => vec![single],
        _ => Vec::new(),
    };
    items.into_iter()
}

fn single_field(params: &Value) -> Option<(&str, &Value)> {
    params.as_object()?
        .iter()
        .next()
        .map(|(field, value)| (field.as_str(), value))
}

/// `{"field": {"value": x}}` and `{"field": x}` are equivalent
fn unwrap_param<'a>(value: &'a Value, key: &str) -> &'a Value {
    value.get(key).unwrap_or(value)
}

fn json_path<'a>(source: &'a Value, path: &str) -> Vec<&'a Value> {
    let mut current = vec![source];
    for segment in path.split('.') {
        current = current
            .into_iter()
            .flat_map(|value| descend_json(value, segment))
            .collect();
    }
    current
        .into_iter()
        .flat_map(|value| match value {
            Value::Array(items) => items.iter().collect(),
            other => vec![other],
        })
        .collect()
}

fn descend_json<'a>(value: &'a Value, segment: &str) -> Vec<&'a Value> {
    match value {
        Value::Object(map) => map.get(segment).into_iter().collect(),
        Value::Array(items) => items
            .iter()
            .flat_map(|item| descend_json(item, segment))
            .collect(),
        _ => Vec::new(),
    }
}

fn json_eq(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Analyzed match: any query token present in the field's tokens
fn text_matches(value: &Value, query: &Value) -> bool {
    match (value, query) {
        (Value::String(text), Value::String(q)) => {
            let haystack = tokens(text);
            tokens(q).iter().any(|token| haystack.contains(token))
        }
        (Value::String(text), other) => tokens(text).contains(&other.to_string().to_lowercase()),
        _ => json_eq(value, query),
    }
}

fn sort_keys(sort: &[Value]) -> Vec<(String, bool)> {
    sort.iter()
        .filter_map(|entry| match entry {
            Value::String(field) => Some((field.clone(), false)),
            Value::Object(map) => map.iter().next().map(|(field, order)| {
                let order = order.get("order").unwrap_or(order);
                (field.clone(), order.as_str() == Some("desc"))
            }),
            _ => None,
        })
        .collect()
}

fn compare_json(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => match (a, b) {
            (Value::Number(x), Value::Number(y)) => x
                .as_f64()
                .partial_cmp(&y.as_f64())
                .unwrap_or(Ordering::Equal),
            (Value::String(x), Value::String(y)) => x.cmp(y),
            (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
            _ => Ordering::Equal,
        },
        _ => Ordering::Equal,
    }
}

/// Missing values sort last in both directions
fn compare_sources(a: &Value, b: &Value, keys: &[(String, bool)]) -> Ordering {
    for (field, descending) in keys {
        let left = json_path(a, field).first().copied();
        let right = json_path(b, field).first().copied();
        let ordering = match (left, right) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            _ if *descending => compare_json(left, right).reverse(),
            _ => compare_json(left, right),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn filter_source(source: &Value, fields: &[&str]) -> Value {
    let Some(object) = source.as_object() else {
        return source.clone();
    };

    let mut filtered = Map::new();
    for field in fields {
        let top = field.split('.').next().unwrap_or(field);
        if let Some(value) = object.get(top) {
            filtered.insert(top.to_string(), value.clone());
        }
    }
    Value::Object(filtered)
}
