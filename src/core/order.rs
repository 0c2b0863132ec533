//! The order record and its creation input

use crate::core::error::{OrderError, OrderResult};
use chrono::{DateTime, Utc};
use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// One line of an order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct LineItem {
    pub name: String,
    pub quantity: u32,
    #[serde(alias = "price")]
    #[validate(range(min = 0.0, message = "unit price must be non-negative"))]
    pub unit_price: f64,
}

/// The persisted and retrievable order
///
/// Every field defaults when absent so that projected records from either
/// backend decode into the same shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Order {
    pub id: String,
    pub user_id: String,
    pub status: String,
    pub city: String,
    pub address_detail: String,
    #[serde(alias = "product")]
    pub line_items: Vec<LineItem>,
    pub total: f64,
    #[serde(with = "timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(with = "timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Caller input for order creation
///
/// Unknown keys (including a caller-supplied `total`) are ignored.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct OrderCreateInput {
    pub user_id: String,
    pub status: String,
    pub city: String,
    pub address_detail: String,
    #[serde(alias = "product")]
    #[validate(nested)]
    pub line_items: Vec<LineItem>,
}

impl Order {
    /// Build a new order from validated input
    ///
    /// Assigns a fresh id, stamps `createdAt == updatedAt` and derives the total.
    pub fn from_input(input: OrderCreateInput, now: DateTime<Utc>) -> OrderResult<Self> {
        input.validate()?;
        let total = order_total(&input.line_items)?;

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            user_id: input.user_id,
            status: input.status,
            city: input.city,
            address_detail: input.address_detail,
            line_items: input.line_items,
            total,
            created_at: Some(now),
            updated_at: Some(now),
        })
    }
}

/// Sum of `quantity × unitPrice` over all line items
///
/// Arithmetic is done in `Decimal` and converted back to `f64` for storage.
pub fn order_total(items: &[LineItem]) -> OrderResult<f64> {
    let mut total = Decimal::ZERO;
    for item in items {
        if !item.unit_price.is_finite() || item.unit_price < 0.0 {
            return Err(OrderError::bad_request(format!(
                "unit price of '{}' must be a finite non-negative number, got {}",
                item.name, item.unit_price
            )));
        }
        let price = Decimal::from_f64(item.unit_price).ok_or_else(|| {
            OrderError::bad_request(format!("unit price {} is out of range", item.unit_price))
        })?;
        let line = price
            .checked_mul(Decimal::from(item.quantity))
            .and_then(|line| total.checked_add(line))
            .ok_or_else(|| OrderError::bad_request("order total overflows"))?;
        total = line;
    }

    total
        .normalize()
        .to_f64()
        .ok_or_else(|| OrderError::Internal(format!("total {} does not fit in f64", total)))
}

/// Serde adapter for optional timestamps
///
/// Absent and zero timestamps (Unix epoch, `0001-01-01T00:00:00Z`) serialize
/// as an empty string. Plain RFC 3339 strings and MongoDB extended JSON
/// (`{"$date": ...}`) are both accepted on input.
pub mod timestamp {
    use chrono::{DateTime, Datelike, SecondsFormat, TimeZone, Utc};
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Extended {
            #[serde(rename = "$date")]
            date: ExtendedDate,
        },
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ExtendedDate {
        Text(String),
        Millis {
            #[serde(rename = "$numberLong")]
            millis: String,
        },
    }

    /// `true` for placeholders that must never reach a caller
    pub fn is_zero(ts: &DateTime<Utc>) -> bool {
        (ts.timestamp() == 0 && ts.timestamp_subsec_nanos() == 0) || ts.year() <= 1
    }

    /// Render a timestamp the way it appears on the wire
    pub fn render(value: Option<DateTime<Utc>>) -> String {
        match value.filter(|ts| !is_zero(ts)) {
            Some(ts) => ts.to_rfc3339_opts(SecondsFormat::Millis, true),
            None => String::new(),
        }
    }

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&render(*value))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let parsed = match Option::<Raw>::deserialize(deserializer)? {
            None => None,
            Some(Raw::Text(text)) | Some(Raw::Extended {
                date: ExtendedDate::Text(text),
            }) => parse_text(&text).map_err(D::Error::custom)?,
            Some(Raw::Extended {
                date: ExtendedDate::Millis { millis },
            }) => {
                let millis: i64 = millis.parse().map_err(D::Error::custom)?;
                Utc.timestamp_millis_opt(millis).single()
            }
        };

        Ok(parsed.filter(|ts| !is_zero(ts)))
    }

    fn parse_text(text: &str) -> Result<Option<DateTime<Utc>>, chrono::ParseError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }
        DateTime::parse_from_rfc3339(text).map(|ts| Some(ts.with_timezone(&Utc)))
    }
}
