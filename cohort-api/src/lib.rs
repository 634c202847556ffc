//! cohort-api: grade-records query backend
//!
//! HTTP/WebSocket service over a SQLite database of imported academic
//! records. Serves reconciled per-student grade views with role-based
//! redaction, tracks online users in real time, and optionally wraps
//! response payloads in an obfuscation codec.

pub mod access_log;
pub mod api;
pub mod config;
pub mod db;
pub mod presence;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use presence::{HeartbeatRegistry, PresenceRegistry};

/// Shared application state, cheap to clone into every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Arc<Config>,
    pub presence: Arc<PresenceRegistry>,
    pub heartbeat: Arc<HeartbeatRegistry>,
}

impl AppState {
    pub fn new(db: SqlitePool, config: Config) -> Self {
        Self {
            db,
            config: Arc::new(config),
            presence: Arc::new(PresenceRegistry::new()),
            heartbeat: Arc::new(HeartbeatRegistry::new()),
        }
    }
}

/// Build the full service router.
///
/// The payload shield wraps only the /api subtree; /health stays readable
/// for probes and the WebSocket upgrade is not an HTTP JSON response.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/login", post(api::auth::login))
        .route("/register", post(api::auth::register))
        .route("/me", get(api::auth::me))
        .route("/classes", get(api::students::get_classes))
        .route("/class/:class_code/students", get(api::students::students_by_class))
        .route("/student/:student_id", get(api::students::student_detail))
        .route("/search", get(api::students::search))
        .route("/stats/student-count", get(api::students::student_count))
        .route("/stats/online-users", get(api::admin::online_users))
        .route("/admin/users", get(api::admin::list_users))
        .route("/admin/user/:account_id/reset-limit", post(api::admin::reset_limit))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::shield::shield,
        ));

    Router::new()
        .route("/health", get(api::health::health))
        .route("/ws/online-count", get(api::ws::online_count))
        .nest("/api", api_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            access_log::access_log,
        ))
        .layer(cors_layer(&state.config))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    if config.allowed_origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
