pub mod bins;
pub mod crud;
pub mod jsonp;
pub mod pickers;
pub mod pickups;
pub mod users;
pub mod ws;

use std::sync::Arc;

use axum::extract::State;
use axum::http::header::CACHE_CONTROL;
use axum::http::{HeaderValue, StatusCode};
use axum::middleware;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Json;
use axum::Router;
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::models::collections;
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(pickers::router(state.locations.supports_reset()))
        .merge(users::router())
        .merge(bins::router())
        .merge(pickups::router())
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/ws", get(ws::ws_handler))
        .fallback(crud::dispatch)
        .with_state(state)
        .layer(middleware::from_fn(jsonp::jsonp))
        .layer(SetResponseHeaderLayer::if_not_present(
            CACHE_CONTROL,
            HeaderValue::from_static("no-cache"),
        ))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    strategy: &'static str,
    pickers: usize,
    users: usize,
    bins: usize,
    pickups: usize,
    points_history: usize,
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let strategy = state.locations.kind().as_str();

    let response = state
        .store
        .read(|doc| HealthResponse {
            status: "ok",
            strategy,
            pickers: doc.records(collections::PICKERS).len(),
            users: doc.records(collections::USERS).len(),
            bins: doc.records(collections::BINS).len(),
            pickups: doc.records(collections::PICKUPS).len(),
            points_history: doc.records(collections::POINTS_HISTORY).len(),
        })
        .await;

    Json(response)
}

async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err).into_response(),
    }
}
