use serde::Serialize;

pub const SOURCE_PICKUP_COMPLETED: &str = "pickup_completed";

/// History row appended when points are awarded.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PointsHistoryEntry {
    pub id: i64,
    pub user_id: i64,
    pub source: String,
    #[serde(serialize_with = "crate::models::serialize_number")]
    pub points: f64,
    pub date: String,
}
