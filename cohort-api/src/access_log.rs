//! Request access logging
//!
//! Structured access log via `tracing` (target `access`): real client IP
//! (proxy-header aware), resolved username, method, path, user agent. Also
//! feeds the heartbeat presence fallback and bumps the per-day access
//! counter for authenticated callers, both best effort, never blocking
//! the request on failure.

use axum::extract::{ConnectInfo, Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use cohort_common::auth;
use std::net::SocketAddr;
use tracing::info;

use crate::db::queries;
use crate::AppState;

/// Resolve the real client address: proxy headers first, then the socket
/// peer address, then "unknown".
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    if let Some(ip) = headers.get("cf-connecting-ip").and_then(|v| v.to_str().ok()) {
        let ip = ip.trim();
        if !ip.is_empty() {
            return ip.to_string();
        }
    }
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        // Multiple hops: the first entry is the originating client
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }
    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

pub async fn access_log(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0);
    let real_ip = client_ip(request.headers(), peer);

    state.heartbeat.touch(&real_ip);

    let username = match bearer_token(request.headers()) {
        Some(token) => match auth::verify_token(token, &state.config.secret) {
            Some(subject) => {
                if let Ok(Some(account)) =
                    queries::account_by_username(&state.db, &subject).await
                {
                    let today = chrono::Utc::now().date_naive().to_string();
                    let _ = queries::bump_access(&state.db, account.id, &today).await;
                }
                subject
            }
            None => "invalid-token".to_string(),
        },
        None => "anonymous".to_string(),
    };

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let user_agent = request
        .headers()
        .get(axum::http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    info!(target: "access", "{real_ip} | {username} | {method} {path} | {user_agent}");

    next.run(request).await
}
