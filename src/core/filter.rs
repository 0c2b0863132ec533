//! Canonical filter request
//!
//! The backend-neutral description of what a caller wants filtered, matched,
//! projected and sorted. It is bound from the request body once, validated
//! once, and then handed to exactly one query compiler.
//!
//! # Wire format
//!
//! ```json
//! {
//!   "exact_filters": { "status": ["Shipped", "Delivered"], "city": "Izmir" },
//!   "match":         { "addressDetail": "harbour street" },
//!   "fields":        ["id", "status", "total"],
//!   "sort":          { "total": -1, "createdAt": "asc" }
//! }
//! ```
//!
//! `sort` may also be a list: `[{"field": "total", "direction": "desc"}]`.
//! Both forms become an ordered `Vec<SortKey>`; object key order is kept.

use crate::core::document::{ID_FIELD, STORE_ID_FIELD};
use crate::core::error::{OrderError, OrderResult};
use indexmap::IndexMap;
use regex::Regex;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::sync::LazyLock;

static FIELD_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z0-9_]+)*$").expect("field name pattern")
});

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    /// Ordering key understood by the document store
    pub fn as_store_key(self) -> i32 {
        match self {
            SortDirection::Ascending => 1,
            SortDirection::Descending => -1,
        }
    }

    /// Order keyword understood by the search index
    pub fn as_str(self) -> &'static str {
        match self {
            SortDirection::Ascending => "asc",
            SortDirection::Descending => "desc",
        }
    }

    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Number(n) => match n.as_i64() {
                Some(1) => Ok(SortDirection::Ascending),
                Some(-1) => Ok(SortDirection::Descending),
                _ => Err(format!("sort direction must be 1 or -1, got {}", n)),
            },
            Value::String(s) => match s.to_ascii_lowercase().as_str() {
                "asc" | "ascending" | "1" => Ok(SortDirection::Ascending),
                "desc" | "descending" | "-1" => Ok(SortDirection::Descending),
                _ => Err(format!("sort direction must be 'asc' or 'desc', got '{}'", s)),
            },
            other => Err(format!("invalid sort direction: {}", other)),
        }
    }
}

impl Serialize for SortDirection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SortDirection {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        SortDirection::from_value(&raw).map_err(D::Error::custom)
    }
}

/// One entry of the ordered sort list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub field: String,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Ascending,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Descending,
        }
    }
}

/// Backend-neutral filter request
///
/// `exact_filters` is OR within a field and AND across fields; `matches` is
/// AND-combined with it. An empty request matches every record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanonicalFilterRequest {
    #[serde(alias = "exactFilters", deserialize_with = "de_exact_filters")]
    pub exact_filters: IndexMap<String, Vec<Value>>,

    #[serde(rename = "match", deserialize_with = "de_or_default")]
    pub matches: IndexMap<String, Value>,

    #[serde(deserialize_with = "de_or_default")]
    pub fields: Vec<String>,

    #[serde(deserialize_with = "de_sort")]
    pub sort: Vec<SortKey>,
}

impl CanonicalFilterRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `field` to equal any of `values`
    pub fn exact<I, V>(mut self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let entry = self.exact_filters.entry(field.into()).or_default();
        for value in values {
            let value = value.into();
            if !entry.contains(&value) {
                entry.push(value);
            }
        }
        self
    }

    /// Require `field` to approximately match `value`
    pub fn matching(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.matches.insert(field.into(), value.into());
        self
    }

    /// Project only the named fields
    pub fn project<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for field in fields {
            let field = field.into();
            if !self.fields.contains(&field) {
                self.fields.push(field);
            }
        }
        self
    }

    /// Append a sort key; earlier keys take precedence
    pub fn sort_by(mut self, key: SortKey) -> Self {
        self.sort.retain(|existing| existing.field != key.field);
        self.sort.push(key);
        self
    }

    /// `true` when the request restricts, projects and sorts nothing
    pub fn is_empty(&self) -> bool {
        self.exact_filters.is_empty()
            && self.matches.is_empty()
            && self.fields.is_empty()
            && self.sort.is_empty()
    }

    /// Check the request before compilation
    ///
    /// Compilers assume a validated request and never fail on their own.
    pub fn validate(&self) -> OrderResult<()> {
        for (field, values) in &self.exact_filters {
            check_field_name(field, "exact_filters")?;
            if values.is_empty() {
                return Err(OrderError::bad_request(format!(
                    "exact_filters.{} must list at least one value",
                    field
                )));
            }
            if let Some(bad) = values.iter().find(|v| !is_scalar(v) || v.is_null()) {
                return Err(OrderError::bad_request(format!(
                    "exact_filters.{} values must be strings, numbers or booleans, got {}",
                    field, bad
                )));
            }
        }

        for (field, value) in &self.matches {
            check_field_name(field, "match")?;
            if !is_scalar(value) || value.is_null() {
                return Err(OrderError::bad_request(format!(
                    "match.{} must be a string, number or boolean, got {}",
                    field, value
                )));
            }
        }

        for field in &self.fields {
            check_field_name(field, "fields")?;
        }

        for key in &self.sort {
            check_field_name(&key.field, "sort")?;
        }

        Ok(())
    }
}

fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Array(_) | Value::Object(_))
}

fn check_field_name(field: &str, section: &str) -> OrderResult<()> {
    // `id` is the only spelling of the identity; `_id` would alias it in the store
    if field == STORE_ID_FIELD || field.starts_with("_id.") {
        return Err(OrderError::bad_request(format!(
            "field '{}' in {} is reserved, use '{}'",
            field, section, ID_FIELD
        )));
    }
    if FIELD_NAME.is_match(field) {
        Ok(())
    } else {
        Err(OrderError::bad_request(format!(
            "invalid field name '{}' in {}",
            field, section
        )))
    }
}

fn de_or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    Many(Vec<Value>),
    One(Value),
}

fn de_exact_filters<'de, D>(deserializer: D) -> Result<IndexMap<String, Vec<Value>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: IndexMap<String, OneOrMany> = de_or_default(deserializer)?;

    Ok(raw
        .into_iter()
        .map(|(field, values)| {
            let values = match values {
                OneOrMany::Many(values) => values,
                OneOrMany::One(value) => vec![value],
            };
            let mut unique: Vec<Value> = Vec::with_capacity(values.len());
            for value in values {
                if !unique.contains(&value) {
                    unique.push(value);
                }
            }
            (field, unique)
        })
        .collect())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawSort {
    Keyed(IndexMap<String, Value>),
    Listed(Vec<SortKey>),
}

fn de_sort<'de, D>(deserializer: D) -> Result<Vec<SortKey>, D::Error>
where
    D: Deserializer<'de>,
{
    let keys = match Option::<RawSort>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(RawSort::Listed(keys)) => keys,
        Some(RawSort::Keyed(map)) => map
            .into_iter()
            .map(|(field, direction)| {
                SortDirection::from_value(&direction)
                    .map(|direction| SortKey { field, direction })
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(D::Error::custom)?,
    };

    let mut ordered: Vec<SortKey> = Vec::with_capacity(keys.len());
    for key in keys {
        if ordered.iter().any(|existing| existing.field == key.field) {
            return Err(D::Error::custom(format!(
                "sort field '{}' listed more than once",
                key.field
            )));
        }
        ordered.push(key);
    }
    Ok(ordered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_body_is_empty_request() {
        let req: CanonicalFilterRequest = serde_json::from_value(json!({})).unwrap();
        assert!(req.is_empty());
        req.validate().unwrap();

        let req: CanonicalFilterRequest = serde_json::from_value(json!({
            "exact_filters": null, "match": null, "fields": null, "sort": null
        }))
        .unwrap();
        assert!(req.is_empty());
    }

    #[test]
    fn test_sort_object_keeps_key_order() {
        // from_str keeps document key order regardless of serde_json features
        let req: CanonicalFilterRequest =
            serde_json::from_str(r#"{"sort": {"total": -1, "createdAt": "asc", "city": 1}}"#)
                .unwrap();
        assert_eq!(
            req.sort,
            vec![
                SortKey::desc("total"),
                SortKey::asc("createdAt"),
                SortKey::asc("city")
            ]
        );
    }

    #[test]
    fn test_sort_list_form() {
        let req: CanonicalFilterRequest = serde_json::from_value(json!({
            "sort": [{"field": "city", "direction": "desc"}, {"field": "total", "direction": 1}]
        }))
        .unwrap();
        assert_eq!(req.sort, vec![SortKey::desc("city"), SortKey::asc("total")]);
    }

    #[test]
    fn test_invalid_sort_direction_rejected() {
        let result = serde_json::from_value::<CanonicalFilterRequest>(json!({
            "sort": {"total": 0}
        }));
        assert!(result.is_err());

        let result = serde_json::from_value::<CanonicalFilterRequest>(json!({
            "sort": {"total": "sideways"}
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_duplicate_sort_field_rejected() {
        let result = serde_json::from_value::<CanonicalFilterRequest>(json!({
            "sort": [{"field": "total", "direction": "asc"}, {"field": "total", "direction": "desc"}]
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_exact_filter_scalar_becomes_singleton_and_dedupes() {
        let req: CanonicalFilterRequest = serde_json::from_value(json!({
            "exactFilters": {"city": "Izmir", "status": ["Shipped", "Shipped", "Delivered"]}
        }))
        .unwrap();
        assert_eq!(req.exact_filters["city"], vec![json!("Izmir")]);
        assert_eq!(
            req.exact_filters["status"],
            vec![json!("Shipped"), json!("Delivered")]
        );
    }

    #[test]
    fn test_empty_value_set_is_bad_request() {
        let req: CanonicalFilterRequest =
            serde_json::from_value(json!({"exact_filters": {"status": []}})).unwrap();
        let err = req.validate().unwrap_err();
        assert_eq!(err.error_code(), "BAD_REQUEST");
    }

    #[test]
    fn test_operator_field_names_rejected() {
        let req = CanonicalFilterRequest::new().exact("$where", ["1"]);
        assert!(req.validate().is_err());

        let req = CanonicalFilterRequest::new().project(["lineItems.name", ""]);
        assert!(req.validate().is_err());

        let req = CanonicalFilterRequest::new().project(["lineItems.name"]);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_primary_key_spelling_rejected() {
        let req = CanonicalFilterRequest::new()
            .exact("id", ["a"])
            .exact("_id", ["b"]);
        let err = req.validate().unwrap_err();
        assert_eq!(err.error_code(), "BAD_REQUEST");
        assert!(err.to_string().contains("use 'id'"));

        assert!(CanonicalFilterRequest::new().matching("_id", "a").validate().is_err());
        assert!(CanonicalFilterRequest::new().project(["_id"]).validate().is_err());
        assert!(
            CanonicalFilterRequest::new()
                .sort_by(SortKey::asc("_id"))
                .validate()
                .is_err()
        );
        assert!(CanonicalFilterRequest::new().exact("_idx", ["a"]).validate().is_ok());
    }

    #[test]
    fn test_non_scalar_values_rejected() {
        let req = CanonicalFilterRequest::new().matching("city", json!({"$ne": "x"}));
        assert!(req.validate().is_err());

        let req = CanonicalFilterRequest::new().exact("status", [json!(["nested"])]);
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_builder_sort_replaces_existing_field() {
        let req = CanonicalFilterRequest::new()
            .sort_by(SortKey::asc("total"))
            .sort_by(SortKey::desc("city"))
            .sort_by(SortKey::desc("total"));
        assert_eq!(req.sort, vec![SortKey::desc("city"), SortKey::desc("total")]);
    }
}
