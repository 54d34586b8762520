use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::get;
use axum::Json;
use axum::Router;
use serde_json::Value;

use crate::models::user::owns_bin;
use crate::models::{collections, parse_id, refers_to};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users/:user_id/pickups", get(user_pickups))
        .route("/users/:user_id/bins", get(user_bins))
        .route("/users/:user_id/pointsHistory", get(user_points_history))
}

/// Records of `collection` whose `userId` names the user, as stored.
async fn owned_by(state: &AppState, collection: &str, user_id: &str) -> Vec<Value> {
    let Some(user_id) = parse_id(user_id) else {
        return Vec::new();
    };

    state
        .store
        .read(|doc| {
            doc.records(collection)
                .filter(|record| refers_to(record, "userId", user_id))
        })
        .await
}

async fn user_pickups(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Json<Vec<Value>> {
    Json(owned_by(&state, collections::PICKUPS, &user_id).await)
}

/// Ownership lives on the user (`user.bins`), not on the bin.
async fn user_bins(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Json<Vec<Value>> {
    let Some(user_id) = parse_id(&user_id) else {
        return Json(Vec::new());
    };

    let bins = state
        .store
        .read(|doc| match doc.records(collections::USERS).find(user_id) {
            Some(user) => doc
                .records(collections::BINS)
                .filter(|bin| owns_bin(user, bin)),
            None => Vec::new(),
        })
        .await;

    Json(bins)
}

async fn user_points_history(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Json<Vec<Value>> {
    Json(owned_by(&state, collections::POINTS_HISTORY, &user_id).await)
}
