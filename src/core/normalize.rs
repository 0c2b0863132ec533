//! Result normalizer
//!
//! Maps whatever each backend returned back onto [`Order`]. Backend order is
//! preserved. A single undecodable record fails the whole call so that a
//! reported item count is never silently short.

use crate::core::document::document_to_json;
use crate::core::error::{OrderError, OrderResult};
use crate::core::order::Order;
use crate::core::service::Backend;
use mongodb::bson::Document;
use serde_json::Value;

/// Raw output of one backend call
#[derive(Debug, Clone)]
pub enum BackendResult {
    /// Documents drained from a store cursor
    Store(Vec<Document>),
    /// A complete search response (`{"hits": {"hits": [...]}}`)
    Index(Value),
}

/// Normalize a raw backend result into orders
pub fn normalize(result: BackendResult) -> OrderResult<Vec<Order>> {
    match result {
        BackendResult::Store(docs) => docs.into_iter().map(decode_document).collect(),
        BackendResult::Index(response) => decode_hits(response),
    }
}

fn decode_document(doc: Document) -> OrderResult<Order> {
    let json = document_to_json(doc);
    serde_json::from_value(json).map_err(|e| {
        tracing::error!(error = %e, "store record does not decode into an order");
        OrderError::Decode {
            backend: Backend::Store,
            message: e.to_string(),
        }
    })
}

fn decode_hits(mut response: Value) -> OrderResult<Vec<Order>> {
    let hits = match response.pointer_mut("/hits/hits").map(Value::take) {
        Some(Value::Array(hits)) => hits,
        _ => return Err(index_decode_error("response has no hits array")),
    };

    // An exact total larger than the page means the index cut the result short
    let total = response.pointer("/hits/total/value").and_then(Value::as_u64);
    let exact = response
        .pointer("/hits/total/relation")
        .and_then(Value::as_str)
        .is_none_or(|relation| relation == "eq");
    if let Some(total) = total {
        if exact && total > hits.len() as u64 {
            return Err(index_decode_error(format!(
                "search returned {} of {} matching hits",
                hits.len(),
                total
            )));
        }
    }

    hits.into_iter()
        .enumerate()
        .map(|(position, mut hit)| {
            let source = match hit.get_mut("_source").map(Value::take) {
                Some(Value::String(raw)) => serde_json::from_str(&raw)
                    .map_err(|e| index_decode_error(format!("hit {}: {}", position, e)))?,
                Some(source @ Value::Object(_)) => source,
                Some(other) => {
                    return Err(index_decode_error(format!(
                        "hit {} has a non-object _source: {}",
                        position, other
                    )));
                }
                None => {
                    return Err(index_decode_error(format!(
                        "hit {} carries no _source",
                        position
                    )));
                }
            };

            serde_json::from_value::<Order>(source)
                .map_err(|e| index_decode_error(format!("hit {}: {}", position, e)))
        })
        .collect()
}

fn index_decode_error(message: impl Into<String>) -> OrderError {
    let message = message.into();
    tracing::error!(%message, "search hit does not decode into an order");
    OrderError::Decode {
        backend: Backend::Index,
        message,
    }
}
