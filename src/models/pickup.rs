use serde_json::{Map, Value};

use crate::models::{json_number, record_id};

pub const STATUS_PENDING: &str = "pending";
pub const STATUS_DONE: &str = "done";

pub fn is_done(pickup: &Map<String, Value>) -> bool {
    pickup.get("status").and_then(Value::as_str) == Some(STATUS_DONE)
}

/// The owning user's id, when the pickup names one.
pub fn owner_id(pickup: &Map<String, Value>) -> Option<i64> {
    record_id(pickup.get("userId"))
}

/// Marks the pickup collected with the verified weight. Runs regardless of
/// the previous status; every other field is kept.
pub fn complete(pickup: &mut Map<String, Value>, weight_kg: f64) {
    pickup.insert("status".to_string(), Value::from(STATUS_DONE));
    pickup.insert("picker_weight_kg".to_string(), json_number(weight_kg));
    pickup.insert("user_weight_kg".to_string(), json_number(weight_kg));
    pickup.insert("weight_verified".to_string(), Value::Bool(true));
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn completing_keeps_unrelated_fields() {
        let mut pickup = json!({ "id": 1, "userId": "7", "status": STATUS_PENDING, "address": "x" })
            .as_object()
            .cloned()
            .unwrap();
        assert!(!is_done(&pickup));
        assert_eq!(owner_id(&pickup), Some(7));

        complete(&mut pickup, 4.2);

        assert!(is_done(&pickup));
        assert_eq!(pickup["picker_weight_kg"], json!(4.2));
        assert_eq!(pickup["user_weight_kg"], json!(4.2));
        assert_eq!(pickup["weight_verified"], json!(true));
        assert_eq!(pickup["address"], "x");
    }
}
