use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;

use crate::error::AppError;
use crate::models::picker::{LocationEvent, LOCATIONS};
use crate::models::{collections, parse_id};
use crate::simulation::{CursorMove, LocationReport, Step};
use crate::state::AppState;

pub fn router(with_reset: bool) -> Router<Arc<AppState>> {
    let router = Router::new()
        .route("/pickers/:picker_id/location", get(poll_location))
        .route("/pickers/:picker_id/location/latest", get(latest_location))
        .route("/pickers/:picker_id/locations", get(location_history));

    if with_reset {
        router.route("/pickers/:picker_id/resetRoute", post(reset_route))
    } else {
        router
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

async fn poll_location(
    State(state): State<Arc<AppState>>,
    Path(picker_id): Path<String>,
) -> Result<Json<LocationReport>, AppError> {
    let result = state
        .write_and_then(
            |doc, _| state.locations.advance(doc, &picker_id, Utc::now()),
            |step: &Step| {
                if let Some(pending) = &step.pending {
                    state.locations.commit(pending);
                }
            },
        )
        .await;

    let outcome = match &result {
        Ok(_) => "success",
        Err(AppError::NotFound(_) | AppError::RouteNotFound(_)) => "not_found",
        Err(_) => "error",
    };
    state
        .metrics
        .location_polls_total
        .with_label_values(&[state.locations.kind().as_str(), outcome])
        .inc();

    let Step { report, .. } = result?;

    let point = report.coordinate();
    let updated_at = match &report {
        LocationReport::Route(fix) => fix.updated_at.clone(),
        LocationReport::History(record) => record.timestamp.clone(),
        LocationReport::Position(position) => position.updated_at.clone(),
    };

    // No subscribers is fine.
    let _ = state.location_events_tx.send(LocationEvent {
        picker_id,
        lat: point.lat,
        lng: point.lng,
        updated_at,
    });

    Ok(Json(report))
}

async fn reset_route(
    State(state): State<Arc<AppState>>,
    Path(picker_id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    state
        .write_and_then(
            |doc, _| state.locations.reset(doc, &picker_id),
            |pending: &Option<CursorMove>| {
                if let Some(pending) = pending {
                    state.locations.commit(pending);
                }
            },
        )
        .await?;

    Ok(Json(MessageResponse {
        message: format!("Route reset for picker {picker_id}"),
    }))
}

async fn find_picker(state: &AppState, raw_id: &str) -> Result<Value, AppError> {
    let picker = match parse_id(raw_id) {
        Some(id) => {
            state
                .store
                .read(|doc| doc.records(collections::PICKERS).find(id).cloned())
                .await
        }
        None => None,
    };

    picker.ok_or_else(|| AppError::NotFound("Picker not found".to_string()))
}

/// The picker's `locations` exactly as stored; absent or null reads as `[]`.
async fn location_history(
    State(state): State<Arc<AppState>>,
    Path(picker_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let picker = find_picker(&state, &picker_id).await?;

    let locations = match picker.get(LOCATIONS) {
        None | Some(Value::Null) => Value::Array(Vec::new()),
        Some(locations) => locations.clone(),
    };
    Ok(Json(locations))
}

async fn latest_location(
    State(state): State<Arc<AppState>>,
    Path(picker_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let picker = find_picker(&state, &picker_id).await?;

    picker
        .get(LOCATIONS)
        .and_then(Value::as_array)
        .and_then(|locations| locations.last())
        .cloned()
        .map(Json)
        .ok_or_else(|| AppError::NotFound("No location data found".to_string()))
}
