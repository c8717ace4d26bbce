//! Shared storage helper functions.
//!
//! Filter classification and timestamp helpers used across backend
//! implementations.

use serde_json::{Map, Value as JsonValue};

/// How a query filter should be interpreted.
///
/// Both adapters apply the same policy: an empty object matches everything,
/// a non-object filter is malformed caller input and matches nothing.
#[derive(Debug)]
pub enum FilterPolicy<'a> {
    /// Malformed (non-object) filter: fail closed, return no rows.
    MatchNone,
    /// Empty object: unconditional match.
    MatchAll,
    /// Conjunction of top-level field equality checks.
    Fields(&'a Map<String, JsonValue>),
}

/// Classify a query filter.
pub fn classify_filter(filter: &JsonValue) -> FilterPolicy<'_> {
    match filter {
        JsonValue::Object(fields) if fields.is_empty() => FilterPolicy::MatchAll,
        JsonValue::Object(fields) => FilterPolicy::Fields(fields),
        _ => FilterPolicy::MatchNone,
    }
}

/// Current time as an RFC3339 string, the storage layer's timestamp format.
pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Wrap a JSON document as a bindable sea-query value.
///
/// Keeps documents as bound parameters; they are never interpolated into
/// SQL text.
pub fn json_value(v: &JsonValue) -> sea_query::Value {
    sea_query::Value::Json(Some(Box::new(v.clone())))
}
