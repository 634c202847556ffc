//! Login, registration and the bearer-auth extractors

use axum::async_trait;
use axum::extract::{FromRequestParts, State};
use axum::http::request::Parts;
use axum::Json;
use cohort_common::auth;
use cohort_common::models::Account;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::db::queries;
use crate::AppState;

use super::ApiError;

/// Extractor for endpoints that require a valid bearer token. Rejects with
/// 401 when the token is missing, invalid, expired, or names an unknown
/// account.
pub struct CurrentAccount(pub Account);

/// Extractor for endpoints that accept anonymous callers. Any auth failure
/// degrades to `None` instead of rejecting.
pub struct MaybeAccount(pub Option<Account>);

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

async fn lookup_account(parts: &Parts, state: &AppState) -> Option<Account> {
    let token = bearer_token(parts)?;
    let username = auth::verify_token(token, &state.config.secret)?;
    queries::account_by_username(&state.db, &username)
        .await
        .ok()
        .flatten()
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentAccount {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        lookup_account(parts, state)
            .await
            .map(CurrentAccount)
            .ok_or(ApiError::Unauthorized("Could not validate credentials"))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for MaybeAccount {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(MaybeAccount(lookup_account(parts, state).await))
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub role: i64,
}

/// POST /api/login
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let account = queries::account_by_username(&state.db, &request.username).await?;
    let account = account
        .filter(|a| auth::verify_password(&request.password, &a.password_hash))
        .ok_or(ApiError::Unauthorized("Incorrect username or password"))?;

    let access_token = auth::issue_token(&account.username, &state.config.secret)?;
    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
        role: account.role,
    }))
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

/// POST /api/register. New accounts always start restricted (role 0).
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<Value>, ApiError> {
    if queries::account_by_username(&state.db, &request.username)
        .await?
        .is_some()
    {
        return Err(ApiError::BadRequest("Username already exists".to_string()));
    }

    let password_hash = auth::hash_password(&request.password);
    queries::create_account(&state.db, &request.username, &password_hash, 0).await?;
    Ok(Json(json!({"message": "User created successfully"})))
}

/// GET /api/me. Compact profile with short field names:
/// u=username, r=role, rl=reset_limit_at, ca=created_at.
pub async fn me(CurrentAccount(account): CurrentAccount) -> Json<Value> {
    Json(json!({
        "u": account.username,
        "r": account.role,
        "rl": account.reset_limit_at,
        "ca": account.created_at,
    }))
}
