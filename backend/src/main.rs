use std::sync::Arc;

use axum::http::header::{self, HeaderName};
use axum::http::Method;
use axum::routing::get;
use axum::Router;
use shared::constants::STAFF_SECRET_HEADER;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::AppConfig;
use crate::games::backend_wheel_game::create_router as create_wheel_game_router;
use crate::handlers::create_staff_router;
use crate::jobs::{spawn_background_jobs, LogSender};
use crate::services::{PgStore, StaffStore, StoreSettings};
use crate::spin::{SpinCoordinator, SpinSettings};

mod auth;
mod clock;
mod config;
mod error;
mod games;
mod handlers;
mod jobs;
mod logging;
mod models;
mod services;
mod spin;

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<SpinCoordinator>,
    pub staff: Arc<dyn StaffStore>,
    pub config: Arc<AppConfig>,
}

pub async fn health_check() -> &'static str {
    "OK"
}

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(state.config.cors_origins.clone())
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static(STAFF_SECRET_HEADER),
        ]);

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/wheel", create_wheel_game_router())
        .nest("/admin", create_staff_router(state.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutting down");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let config = Arc::new(AppConfig::from_env()?);
    logging::setup(config.timezone)?;

    info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .acquire_timeout(config.storage_timeout)
        .connect(&config.database_url)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database ready");

    let store = Arc::new(PgStore::new(pool, StoreSettings::from(config.as_ref())));
    let coordinator = Arc::new(SpinCoordinator::new(
        store.clone(),
        SpinSettings::from(config.as_ref()),
    ));
    let _jobs = spawn_background_jobs(&config, store.clone(), Arc::new(LogSender));

    let state = AppState {
        coordinator,
        staff: store,
        config: config.clone(),
    };

    let listener = TcpListener::bind(config.bind_addr).await?;
    info!("🚀 Lucky wheel listening on {} ({})", config.bind_addr, config.timezone);
    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

#[cfg(test)]
pub(crate) fn test_state() -> (Arc<services::memory_store::MemoryStore>, AppState) {
    let config = Arc::new(AppConfig::for_tests());
    let store = Arc::new(services::memory_store::MemoryStore::new(StoreSettings::from(
        config.as_ref(),
    )));
    let coordinator = SpinCoordinator::new(store.clone(), SpinSettings::from(config.as_ref()));
    let state = AppState {
        coordinator: Arc::new(coordinator),
        staff: store.clone(),
        config,
    };
    (store, state)
}
