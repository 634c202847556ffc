use std::net::SocketAddr;

use cohort_api::config::Config;
use cohort_api::{build_router, db, AppState};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("cohort-api version {}", env!("CARGO_PKG_VERSION"));

    let config = Config::load();
    let bind_addr = config.bind_addr.clone();

    let pool = db::init_database(&config.db_path).await?;
    db::seed_admin(&pool, &config.admin_password).await?;

    let state = AppState::new(pool, config);
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Listening on {bind_addr}");
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
