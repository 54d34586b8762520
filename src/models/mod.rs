//! Record conventions of the document.
//!
//! Records are stored and returned as raw JSON. The helpers here read the
//! few fields the service cares about without imposing a schema, so a record
//! with an odd or partial shape is still listed, filtered and updated.

pub mod bin;
pub mod picker;
pub mod pickup;
pub mod points;
pub mod user;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serializer;
use serde_json::Value;

/// Collection names as they appear at the top level of the document.
pub mod collections {
    pub const PICKERS: &str = "pickers";
    pub const PICKER_ROUTES: &str = "pickerRoutes";
    pub const USERS: &str = "users";
    pub const BINS: &str = "bins";
    pub const PICKUPS: &str = "pickups";
    pub const POINTS_HISTORY: &str = "pointsHistory";
    pub const META: &str = "meta";
}

/// ISO-8601 in UTC with millisecond precision, e.g. `2024-05-01T09:30:00.000Z`.
pub fn iso_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parses an id taken from a request path. Anything that is not an integer
/// matches no record.
pub fn parse_id(raw: &str) -> Option<i64> {
    raw.trim().parse().ok()
}

/// Reads a stored id, which may be a number or a numeric string.
pub fn record_id(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => parse_id(s),
        _ => None,
    }
}

/// Whether `record[field]` refers to `id`.
pub fn refers_to(record: &Value, field: &str, id: i64) -> bool {
    record_id(record.get(field)) == Some(id)
}

/// Whole numbers are written as JSON integers, anything else as a float.
pub fn json_number(value: f64) -> Value {
    if is_whole(value) {
        Value::from(value as i64)
    } else {
        Value::from(value)
    }
}

pub fn serialize_number<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if is_whole(*value) {
        serializer.serialize_i64(*value as i64)
    } else {
        serializer.serialize_f64(*value)
    }
}

fn is_whole(value: f64) -> bool {
    value.fract() == 0.0 && value.abs() < i64::MAX as f64
}
