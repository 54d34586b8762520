use serde_json::Value;

/// Case-insensitive match on a bin's `type`. A bin without a textual type
/// matches no filter.
pub fn has_kind(bin: &Value, kind: &str) -> bool {
    bin.get("type")
        .and_then(Value::as_str)
        .is_some_and(|stored| stored.to_lowercase() == kind.to_lowercase())
}
