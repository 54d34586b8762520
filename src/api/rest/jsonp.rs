use axum::body::Body;
use axum::extract::{Query, Request};
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tracing::warn;

#[derive(Deserialize)]
struct JsonpParams {
    callback: Option<String>,
}

/// Wraps JSON responses in a script call when the request names a
/// `callback`.
pub async fn jsonp(request: Request, next: Next) -> Response {
    let callback = Query::<JsonpParams>::try_from_uri(request.uri())
        .ok()
        .and_then(|Query(params)| params.callback)
        .map(|name| sanitize_callback(&name))
        .filter(|name| !name.is_empty());

    let response = next.run(request).await;

    let Some(callback) = callback else {
        return response;
    };
    if !is_json(&response) {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(error = %err, "failed to buffer response for jsonp");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    parts.headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/javascript; charset=utf-8"),
    );
    parts.headers.remove(CONTENT_LENGTH);

    Response::from_parts(parts, Body::from(wrap(&callback, &bytes)))
}

fn is_json(response: &Response) -> bool {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/json"))
}

/// Keeps only characters valid in a dotted JS identifier path.
fn sanitize_callback(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '.' | '[' | ']'))
        .collect()
}

fn wrap(callback: &str, json: &[u8]) -> String {
    // U+2028/U+2029 are valid in JSON strings but end a line in JS.
    let payload = String::from_utf8_lossy(json)
        .replace('\u{2028}', "\\u2028")
        .replace('\u{2029}', "\\u2029");

    format!("/**/ typeof {callback} === 'function' && {callback}({payload});")
}
