use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const LOCATIONS: &str = "locations";
pub const PICKER_LOCATION: &str = "pickerLocation";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    /// Reads `lat`/`lng` off any record. `None` unless both are numbers.
    pub fn of(record: &Value) -> Option<Self> {
        Self::from_fields(record.as_object()?)
    }

    pub fn from_fields(record: &Map<String, Value>) -> Option<Self> {
        Some(Self {
            lat: record.get("lat")?.as_f64()?,
            lng: record.get("lng")?.as_f64()?,
        })
    }
}

/// One entry appended to a picker's `locations` history.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LocationRecord {
    pub lat: f64,
    pub lng: f64,
    pub timestamp: String,
}

impl LocationRecord {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate {
            lat: self.lat,
            lng: self.lng,
        }
    }
}

/// Latest snapshot written while a picker follows its fixed route.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PickerLocation {
    pub lat: f64,
    pub lng: f64,
    pub label: String,
    pub last_updated: String,
}

/// Pushed to live subscribers every time a picker moves.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LocationEvent {
    pub picker_id: String,
    pub lat: f64,
    pub lng: f64,
    pub updated_at: String,
}
