//! JSON ↔ BSON conversion shared by the store backends and the normalizer
//!
//! Records travel through `serde_json::Value` before becoming BSON so that
//! timestamps are stored as RFC 3339 strings and ids as plain strings. The
//! `id` field is mapped to the store's `_id` primary key.

use anyhow::{Result, anyhow};
use mongodb::bson::{Bson, Document};
use serde_json::Value;

/// Primary key field of the document store
pub const STORE_ID_FIELD: &str = "_id";

/// Record identity field exposed to callers
pub const ID_FIELD: &str = "id";

/// Map a caller-facing field name to its store name
pub fn store_field(field: &str) -> &str {
    if field == ID_FIELD { STORE_ID_FIELD } else { field }
}

/// Convert a JSON object into a BSON document, renaming `id` → `_id`
pub fn json_to_document(json: Value) -> Result<Document> {
    let bson_val =
        mongodb::bson::to_bson(&json).map_err(|e| anyhow!("Failed to convert JSON to BSON: {}", e))?;

    let mut doc = match bson_val {
        Bson::Document(d) => d,
        _ => return Err(anyhow!("Expected BSON document, got non-object")),
    };

    if let Some(id) = doc.remove(ID_FIELD) {
        doc.insert(STORE_ID_FIELD, id);
    }

    Ok(doc)
}

/// Convert a BSON document back into JSON, renaming `_id` → `id`
pub fn document_to_json(mut doc: Document) -> Value {
    if let Some(id) = doc.remove(STORE_ID_FIELD) {
        doc.insert(ID_FIELD, id);
    }

    Bson::Document(doc).into_relaxed_extjson()
}

/// Convert a scalar filter value into BSON
///
/// Total over every JSON value: integers become `Int64`, other numbers
/// `Double`, and nested values convert structurally.
pub fn value_to_bson(value: &Value) -> Bson {
    match value {
        Value::Null => Bson::Null,
        Value::Bool(b) => Bson::Boolean(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Bson::Int64(i),
            None => Bson::Double(n.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(s) => Bson::String(s.clone()),
        Value::Array(items) => Bson::Array(items.iter().map(value_to_bson).collect()),
        Value::Object(map) => Bson::Document(
            map.iter()
                .map(|(k, v)| (k.clone(), value_to_bson(v)))
                .collect(),
        ),
    }
}
