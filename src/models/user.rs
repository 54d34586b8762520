use serde_json::{Map, Value};

use crate::models::record_id;

pub const TOTAL_POINTS: &str = "totalPoints";

/// Current balance. Anything other than a number counts as zero.
pub fn total_points(user: &Map<String, Value>) -> f64 {
    user.get(TOTAL_POINTS).and_then(Value::as_f64).unwrap_or(0.0)
}

/// Ownership lives on the user, as a `bins` array of bin ids.
pub fn owns_bin(user: &Value, bin: &Value) -> bool {
    let Some(bin_id) = record_id(bin.get("id")) else {
        return false;
    };

    user.get("bins")
        .and_then(Value::as_array)
        .is_some_and(|bins| bins.iter().any(|owned| record_id(Some(owned)) == Some(bin_id)))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn missing_or_malformed_balance_counts_as_zero() {
        for user in [
            json!({ "id": 1 }),
            json!({ "id": 1, "totalPoints": null }),
            json!({ "id": 1, "totalPoints": "lots" }),
        ] {
            assert_eq!(total_points(user.as_object().unwrap()), 0.0);
        }
        assert_eq!(total_points(json!({ "totalPoints": 12 }).as_object().unwrap()), 12.0);
    }

    #[test]
    fn bin_ownership_accepts_string_ids() {
        let user = json!({ "id": 7, "bins": [1, "3"] });
        assert!(owns_bin(&user, &json!({ "id": 1 })));
        assert!(owns_bin(&user, &json!({ "id": 3 })));
        assert!(!owns_bin(&user, &json!({ "id": 2 })));
        assert!(!owns_bin(&json!({ "id": 8 }), &json!({ "id": 1 })));
    }
}
