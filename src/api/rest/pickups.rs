use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::post;
use axum::Json;
use axum::Router;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{info, warn};

use crate::api::rest::pickers::MessageResponse;
use crate::error::{AppError, StoreError};
use crate::models::points::{PointsHistoryEntry, SOURCE_PICKUP_COMPLETED};
use crate::models::user::{total_points, TOTAL_POINTS};
use crate::models::{collections, iso_timestamp, json_number, parse_id, pickup};
use crate::state::AppState;
use crate::store::{Document, IdGenerator};

pub const DEFAULT_POINTS: f64 = 10.0;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/pickups/:pickup_id/confirm", post(confirm))
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ConfirmPickupRequest {
    pub weight_kg: Option<f64>,
    pub points: Option<f64>,
}

impl ConfirmPickupRequest {
    /// Reads each field on its own. A field that is missing or not a number
    /// counts as not supplied without affecting the other.
    pub fn from_body(body: &Value) -> Self {
        Self {
            weight_kg: body.get("weightKg").and_then(Value::as_f64),
            points: body.get("points").and_then(Value::as_f64),
        }
    }

    pub fn weight_kg(&self) -> f64 {
        self.weight_kg.unwrap_or(0.0)
    }

    /// Zero counts as "not supplied".
    pub fn points(&self) -> f64 {
        self.points
            .filter(|points| *points != 0.0)
            .unwrap_or(DEFAULT_POINTS)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Confirmation {
    Awarded {
        user_id: i64,
        points: f64,
        total_points: f64,
        entry_id: i64,
    },
    NoUser,
}

/// Marks the pickup done and, when its owner exists, credits the points and
/// logs them to the owner's history.
///
/// Confirming an already completed pickup credits the points again.
pub fn confirm_pickup(
    doc: &mut Document,
    ids: &IdGenerator,
    pickup_id: i64,
    request: &ConfirmPickupRequest,
    now: DateTime<Utc>,
) -> Result<Confirmation, AppError> {
    let record = doc
        .records_mut(collections::PICKUPS)
        .find_mut(pickup_id)
        .ok_or_else(|| AppError::NotFound("Pickup not found".to_string()))?;
    if pickup::is_done(record) {
        warn!(pickup_id, "pickup already confirmed; awarding points again");
    }
    pickup::complete(record, request.weight_kg());

    let Some(user_id) = pickup::owner_id(record) else {
        return Ok(Confirmation::NoUser);
    };
    let Some(user) = doc.records_mut(collections::USERS).find_mut(user_id) else {
        return Ok(Confirmation::NoUser);
    };

    let points = request.points();
    let total_points = total_points(user) + points;
    user.insert(TOTAL_POINTS.to_string(), json_number(total_points));

    let taken = doc.max_numeric_id(collections::POINTS_HISTORY).unwrap_or(0);
    let entry = PointsHistoryEntry {
        id: ids.next_above(taken),
        user_id,
        source: SOURCE_PICKUP_COMPLETED.to_string(),
        points,
        date: iso_timestamp(now),
    };
    doc.records_mut(collections::POINTS_HISTORY)
        .push(serde_json::to_value(&entry).map_err(StoreError::from)?);

    Ok(Confirmation::Awarded {
        user_id,
        points,
        total_points,
        entry_id: entry.id,
    })
}

async fn confirm(
    State(state): State<Arc<AppState>>,
    Path(pickup_id): Path<String>,
    payload: Option<Json<Value>>,
) -> Result<Json<MessageResponse>, AppError> {
    let request = payload
        .map(|Json(body)| ConfirmPickupRequest::from_body(&body))
        .unwrap_or_default();
    let pickup_id =
        parse_id(&pickup_id).ok_or_else(|| AppError::NotFound("Pickup not found".to_string()))?;

    let confirmation = state
        .write(|doc, ids| confirm_pickup(doc, ids, pickup_id, &request, Utc::now()))
        .await?;

    match confirmation {
        Confirmation::Awarded {
            user_id,
            points,
            total_points,
            ..
        } => {
            state
                .metrics
                .pickups_confirmed_total
                .with_label_values(&["awarded"])
                .inc();
            state.metrics.points_awarded_total.inc_by(points.max(0.0));
            info!(pickup_id, user_id, points, total_points, "pickup confirmed");
        }
        Confirmation::NoUser => {
            state
                .metrics
                .pickups_confirmed_total
                .with_label_values(&["no_user"])
                .inc();
            info!(pickup_id, "pickup confirmed without a matching user");
        }
    }

    Ok(Json(MessageResponse {
        message: "Pickup confirmed and points updated".to_string(),
    }))
}
