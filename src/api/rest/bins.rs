use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::get;
use axum::Json;
use axum::Router;
use serde::Deserialize;
use serde_json::Value;

use crate::api::rest::crud;
use crate::models::bin::has_kind;
use crate::models::collections;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    // Only GET is special-cased; writes fall through to the generic router.
    Router::new().route("/bins", get(list_bins).fallback(crud::dispatch))
}

#[derive(Debug, Default, Deserialize)]
pub struct BinQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// Bins as stored, optionally narrowed to one `type`.
async fn list_bins(
    State(state): State<Arc<AppState>>,
    Query(query): Query<BinQuery>,
) -> Json<Vec<Value>> {
    let kind = query.kind.filter(|kind| !kind.is_empty());

    let bins = state
        .store
        .read(|doc| {
            let bins = doc.records(collections::BINS);
            match &kind {
                Some(kind) => bins.filter(|bin| has_kind(bin, kind)),
                None => bins.all(),
            }
        })
        .await;

    Json(bins)
}
