use std::path::PathBuf;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid document json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("document root must be a json object")]
    NotAnObject,
}

#[derive(Debug, Error)]
pub enum AppError {
    /// 404 reported under a `message` key.
    #[error("not found: {0}")]
    NotFound(String),

    /// 404 reported under an `error` key, as the location poll does.
    #[error("route not found: {0}")]
    RouteNotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "message": msg })),
            AppError::RouteNotFound(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            AppError::Store(err) => {
                tracing::error!(error = %err, "document store failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": err.to_string() }),
                )
            }
            AppError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": msg }))
            }
        };

        (status, Json(body)).into_response()
    }
}
