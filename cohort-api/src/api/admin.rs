//! Admin and statistics endpoints

use axum::extract::{Path, State};
use axum::Json;
use chrono::{Duration, Utc};
use serde_json::{json, Value};

use crate::db::queries;
use crate::AppState;

use super::auth::{CurrentAccount, MaybeAccount};
use super::ApiError;

/// GET /api/stats/online-users. Open to anonymous callers.
///
/// Uses the live presence registry when any socket is connected; otherwise
/// falls back to the heartbeat registry's trailing-window address count.
pub async fn online_users(
    State(state): State<AppState>,
    MaybeAccount(_account): MaybeAccount,
) -> Json<Value> {
    let count = if state.presence.connection_count() > 0 {
        state.presence.count()
    } else {
        state.heartbeat.count()
    };
    Json(json!({"count": count}))
}

/// GET /api/admin/users. Admin only. Includes each account's per-day
/// access counters for the trailing 30 days.
pub async fn list_users(
    State(state): State<AppState>,
    CurrentAccount(account): CurrentAccount,
) -> Result<Json<Value>, ApiError> {
    if account.role != 1 {
        return Err(ApiError::Forbidden("Not authorized"));
    }

    let since = (Utc::now().date_naive() - Duration::days(30)).to_string();
    let accounts = queries::list_accounts(&state.db).await?;

    let mut users = Vec::with_capacity(accounts.len());
    for user in &accounts {
        let history = queries::access_history(&state.db, user.id, &since).await?;
        users.push(json!({
            "id": user.id,
            "username": user.username,
            "role": user.role,
            "access_history": history,
            "reset_limit_at": user.reset_limit_at,
        }));
    }
    Ok(Json(Value::Array(users)))
}

/// POST /api/admin/user/{account_id}/reset-limit. Admin only. Stamps the
/// account and notifies every live connection the user holds.
pub async fn reset_limit(
    State(state): State<AppState>,
    CurrentAccount(account): CurrentAccount,
    Path(account_id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    if account.role != 1 {
        return Err(ApiError::Forbidden("Not authorized"));
    }

    let target = queries::account_by_id(&state.db, account_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    let now = Utc::now().to_rfc3339();
    queries::set_reset_limit(&state.db, target.id, &now).await?;

    state.presence.unicast(
        &target.username,
        &json!({
            "type": "reset_limit",
            "timestamp": now,
        }),
    );

    Ok(Json(json!({
        "message": format!("Limit reset for user {}", target.username)
    })))
}
