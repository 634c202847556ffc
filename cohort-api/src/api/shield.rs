//! Response payload shield
//!
//! When enabled, every successful `application/json` response under /api is
//! rewrapped as `{"shield": "<token>"}` using the payload codec. Non-JSON
//! responses, error statuses, and anything that fails to re-serialize pass
//! through untouched; the shield degrades, it never breaks a request.

use axum::body::{to_bytes, Body};
use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;
use cohort_common::codec;
use serde_json::Value;
use tracing::debug;

use crate::AppState;

pub async fn shield(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let response = next.run(request).await;

    if !state.config.shield || !response.status().is_success() {
        return response;
    }
    let is_json = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains("application/json"))
        .unwrap_or(false);
    if !is_json {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!("shield: failed to buffer response body: {e}");
            return Response::from_parts(parts, Body::empty());
        }
    };

    let wrapped = serde_json::from_slice::<Value>(&bytes)
        .ok()
        .and_then(|value| codec::obfuscate_payload(&value));

    match wrapped {
        Some(token) => {
            parts.headers.remove(header::CONTENT_LENGTH);
            let body = serde_json::json!({ "shield": token }).to_string();
            Response::from_parts(parts, Body::from(body))
        }
        // Fall back to the original body untouched
        None => Response::from_parts(parts, Body::from(bytes)),
    }
}
