use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::Value;
use tracing::debug;

use crate::error::{AppError, StoreError};
use crate::geo::{jitter, ORIGIN};
use crate::models::collections;
use crate::models::picker::{Coordinate, LocationRecord, LOCATIONS};
use crate::models::{iso_timestamp, json_number, parse_id};
use crate::simulation::{LocationReport, LocationStrategy, PickerPosition, Step, StrategyKind};
use crate::store::Document;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkMode {
    /// Append every step to `locations`.
    History,
    /// Overwrite the picker's `lat`/`lng`.
    Position,
}

/// Drifts pickers around by a small random offset on every poll, starting
/// from [`ORIGIN`] when a picker has no position yet.
pub struct RandomWalk {
    mode: WalkMode,
    rng: Mutex<StdRng>,
}

impl RandomWalk {
    pub fn new(mode: WalkMode) -> Self {
        Self::with_rng(mode, StdRng::from_os_rng())
    }

    pub fn with_rng(mode: WalkMode, rng: StdRng) -> Self {
        Self {
            mode,
            rng: Mutex::new(rng),
        }
    }
}

impl LocationStrategy for RandomWalk {
    fn kind(&self) -> StrategyKind {
        match self.mode {
            WalkMode::History => StrategyKind::History,
            WalkMode::Position => StrategyKind::RandomWalk,
        }
    }

    fn advance(
        &self,
        doc: &mut Document,
        picker_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Step, AppError> {
        let not_found = || AppError::NotFound("Picker not found".to_string());
        let id = parse_id(picker_id).ok_or_else(not_found)?;
        let picker = doc
            .records_mut(collections::PICKERS)
            .find_mut(id)
            .ok_or_else(not_found)?;

        let mut rng = self
            .rng
            .lock()
            .map_err(|_| AppError::Internal("location rng lock poisoned".to_string()))?;
        let timestamp = iso_timestamp(now);

        // Stored coordinates that are missing or not numeric restart at ORIGIN.
        let report = match self.mode {
            WalkMode::History => {
                let from = picker
                    .get(LOCATIONS)
                    .and_then(Value::as_array)
                    .and_then(|locations| locations.last())
                    .and_then(Coordinate::of)
                    .unwrap_or(ORIGIN);
                let next = jitter(from, &mut *rng);
                let record = LocationRecord {
                    lat: next.lat,
                    lng: next.lng,
                    timestamp,
                };

                let stored = serde_json::to_value(&record).map_err(StoreError::from)?;
                match picker.get_mut(LOCATIONS) {
                    Some(Value::Array(locations)) => locations.push(stored),
                    _ => {
                        picker.insert(LOCATIONS.to_string(), Value::Array(vec![stored]));
                    }
                }
                LocationReport::History(record)
            }
            WalkMode::Position => {
                let from = Coordinate::from_fields(picker).unwrap_or(ORIGIN);
                let next = jitter(from, &mut *rng);
                picker.insert("lat".to_string(), json_number(next.lat));
                picker.insert("lng".to_string(), json_number(next.lng));
                picker.insert("updatedAt".to_string(), Value::from(timestamp.clone()));
                LocationReport::Position(PickerPosition {
                    id,
                    picker_id: id,
                    lat: next.lat,
                    lng: next.lng,
                    updated_at: timestamp,
                })
            }
        };

        let point = report.coordinate();
        debug!(picker_id = id, lat = point.lat, lng = point.lng, "picker drifted");

        Ok(Step::settled(report))
    }
}
