//! Intermediate filter plan
//!
//! A validated [`CanonicalFilterRequest`] is lowered once into a flat list of
//! typed clauses plus projection and sort. The store and index encoders only
//! ever see this plan, so request-shape quirks are handled in one place.

use crate::core::filter::{CanonicalFilterRequest, SortKey};
use serde_json::Value;

/// A single conjunctive constraint
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    /// Field must equal one of the listed literals
    EqualsOneOf { field: String, values: Vec<Value> },
    /// Field must match the value; each backend decides how loosely
    Matches { field: String, value: Value },
}

impl Clause {
    pub fn field(&self) -> &str {
        match self {
            Clause::EqualsOneOf { field, .. } | Clause::Matches { field, .. } => field,
        }
    }
}

/// Backend-neutral compiled form of a filter request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterPlan {
    /// Exact clauses first (request order), then match clauses
    pub clauses: Vec<Clause>,
    /// Fields to keep; empty keeps the whole record
    pub projection: Vec<String>,
    /// Ordered sort keys; empty keeps backend order
    pub sort: Vec<SortKey>,
}

impl FilterPlan {
    pub fn from_request(req: &CanonicalFilterRequest) -> Self {
        let exact = req
            .exact_filters
            .iter()
            .map(|(field, values)| Clause::EqualsOneOf {
                field: field.clone(),
                values: values.clone(),
            });

        let matches = req.matches.iter().map(|(field, value)| Clause::Matches {
            field: field.clone(),
            value: value.clone(),
        });

        Self {
            clauses: exact.chain(matches).collect(),
            projection: covering_paths(&req.fields),
            sort: req.sort.clone(),
        }
    }

    pub fn exact_clauses(&self) -> impl Iterator<Item = (&str, &[Value])> {
        self.clauses.iter().filter_map(|clause| match clause {
            Clause::EqualsOneOf { field, values } => Some((field.as_str(), values.as_slice())),
            Clause::Matches { .. } => None,
        })
    }

    pub fn match_clauses(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.clauses.iter().filter_map(|clause| match clause {
            Clause::Matches { field, value } => Some((field.as_str(), value)),
            Clause::EqualsOneOf { .. } => None,
        })
    }

    /// `true` when the plan selects every record
    pub fn matches_everything(&self) -> bool {
        self.clauses.is_empty()
    }
}

/// Drop paths already included through a parent path
///
/// `["lineItems", "lineItems.name"]` keeps only `lineItems`; the store refuses
/// a projection that names both.
fn covering_paths(fields: &[String]) -> Vec<String> {
    let covered = |field: &str| {
        fields.iter().any(|parent| {
            field
                .strip_prefix(parent.as_str())
                .is_some_and(|rest| rest.starts_with('.'))
        })
    };

    let mut paths: Vec<String> = Vec::with_capacity(fields.len());
    for field in fields {
        if !covered(field) && !paths.contains(field) {
            paths.push(field.clone());
        }
    }
    paths
}
