use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{AppError, StoreError};
use crate::models::collections;
use crate::models::picker::{Coordinate, PickerLocation, PICKER_LOCATION};
use crate::models::{iso_timestamp, parse_id};
use crate::simulation::{CursorMove, LocationReport, LocationStrategy, RouteFix, Step, StrategyKind};
use crate::store::Document;

/// Key under `meta` holding the persisted cursor of every picker.
pub const ROUTE_STEPS_KEY: &str = "routeSteps";

enum CursorStore {
    /// Lost on restart.
    Memory(DashMap<String, usize>),
    /// Lives in `meta.routeSteps`, keyed by picker id.
    Document,
}

/// Walks each picker through the waypoints listed for it in `pickerRoutes`,
/// one waypoint per poll, wrapping around at the end.
pub struct RouteCursor {
    cursors: CursorStore,
}

impl RouteCursor {
    pub fn in_memory() -> Self {
        Self {
            cursors: CursorStore::Memory(DashMap::new()),
        }
    }

    pub fn persisted() -> Self {
        Self {
            cursors: CursorStore::Document,
        }
    }

    /// The waypoint index the next poll will report, before wrapping.
    pub fn step(&self, doc: &Document, picker_id: &str) -> usize {
        match &self.cursors {
            CursorStore::Memory(steps) => steps.get(picker_id).map(|step| *step).unwrap_or(0),
            CursorStore::Document => stored_steps(doc)
                .and_then(|steps| steps.get(picker_id))
                .and_then(Value::as_u64)
                .map(|step| step as usize)
                .unwrap_or(0),
        }
    }

    fn has_cursor(&self, doc: &Document, picker_id: &str) -> bool {
        match &self.cursors {
            CursorStore::Memory(steps) => steps.contains_key(picker_id),
            CursorStore::Document => {
                stored_steps(doc).is_some_and(|steps| steps.contains_key(picker_id))
            }
        }
    }

    /// Writes a persisted cursor straight into the draft document. A
    /// volatile cursor is handed back for [`LocationStrategy::commit`].
    fn stage_step(&self, doc: &mut Document, picker_id: &str, step: usize) -> Option<CursorMove> {
        match &self.cursors {
            CursorStore::Memory(_) => Some(CursorMove {
                picker_id: picker_id.to_string(),
                step,
            }),
            CursorStore::Document => {
                let meta = doc.object_mut(collections::META);
                let steps = meta
                    .entry(ROUTE_STEPS_KEY)
                    .or_insert_with(|| Value::Object(Default::default()));
                if !steps.is_object() {
                    *steps = Value::Object(Default::default());
                }
                if let Value::Object(steps) = steps {
                    steps.insert(picker_id.to_string(), Value::from(step));
                }
                None
            }
        }
    }
}

fn stored_steps(doc: &Document) -> Option<&serde_json::Map<String, Value>> {
    doc.object(collections::META)?
        .get(ROUTE_STEPS_KEY)?
        .as_object()
}

/// Waypoints for `picker_id`, or `None` when the picker has no usable route.
pub fn load_route(doc: &Document, picker_id: &str) -> Option<Vec<Coordinate>> {
    let raw = doc.object(collections::PICKER_ROUTES)?.get(picker_id)?;
    match serde_json::from_value::<Vec<Coordinate>>(raw.clone()) {
        Ok(route) if !route.is_empty() => Some(route),
        Ok(_) => None,
        Err(err) => {
            tracing::warn!(picker_id, error = %err, "ignoring malformed picker route");
            None
        }
    }
}

impl LocationStrategy for RouteCursor {
    fn kind(&self) -> StrategyKind {
        match self.cursors {
            CursorStore::Memory(_) => StrategyKind::Route,
            CursorStore::Document => StrategyKind::RoutePersisted,
        }
    }

    fn advance(
        &self,
        doc: &mut Document,
        picker_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Step, AppError> {
        let route = load_route(doc, picker_id).ok_or_else(|| {
            AppError::RouteNotFound("Route not found for this picker".to_string())
        })?;

        // The route may have been edited since the cursor was stored.
        let step = self.step(doc, picker_id) % route.len();
        let point = route[step];
        let pending = self.stage_step(doc, picker_id, (step + 1) % route.len());

        info!(
            picker_id,
            step,
            route_len = route.len(),
            lat = point.lat,
            lng = point.lng,
            "picker advanced along route"
        );

        let updated_at = iso_timestamp(now);

        let picker = match parse_id(picker_id) {
            Some(id) => doc.records_mut(collections::PICKERS).find_mut(id),
            None => None,
        };
        if let Some(picker) = picker {
            let snapshot = PickerLocation {
                lat: point.lat,
                lng: point.lng,
                label: format!("Moving to user - Step {}/{}", step + 1, route.len()),
                last_updated: updated_at.clone(),
            };
            picker.insert(
                PICKER_LOCATION.to_string(),
                serde_json::to_value(snapshot).map_err(StoreError::from)?,
            );
        }

        Ok(Step {
            report: LocationReport::Route(RouteFix {
                picker_id: picker_id.to_string(),
                lat: point.lat,
                lng: point.lng,
                updated_at,
            }),
            pending,
        })
    }

    fn supports_reset(&self) -> bool {
        true
    }

    fn reset(&self, doc: &mut Document, picker_id: &str) -> Result<Option<CursorMove>, AppError> {
        if load_route(doc, picker_id).is_none() && !self.has_cursor(doc, picker_id) {
            debug!(picker_id, "nothing to reset; picker has no route");
            return Ok(None);
        }

        let pending = self.stage_step(doc, picker_id, 0);
        info!(picker_id, "picker route reset");
        Ok(pending)
    }

    fn commit(&self, pending: &CursorMove) {
        if let CursorStore::Memory(steps) = &self.cursors {
            steps.insert(pending.picker_id.clone(), pending.step);
        }
    }
}
