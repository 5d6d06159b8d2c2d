use std::sync::{Arc, Mutex};

use axum::routing::{delete, get, patch, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use slotbook::clock::SystemClock;
use slotbook::config::AppConfig;
use slotbook::db;
use slotbook::handlers;
use slotbook::scheduling::SlotLocks;
use slotbook::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let conn = db::init_db(&config.database_url)?;

    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config: config.clone(),
        clock: Box::new(SystemClock),
        slots: SlotLocks::new(),
    });

    let app = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/api/services", get(handlers::services::list_services))
        .route("/api/services", post(handlers::services::create_service))
        .route("/api/services/:id", get(handlers::services::get_service))
        .route("/api/services/:id", put(handlers::services::update_service))
        .route(
            "/api/services/:id",
            delete(handlers::services::delete_service),
        )
        .route("/api/bookings", post(handlers::bookings::create_booking))
        .route("/api/bookings", get(handlers::bookings::list_bookings))
        .route("/api/bookings/:id", get(handlers::bookings::get_booking))
        .route(
            "/api/bookings/:id/status",
            patch(handlers::bookings::update_status),
        )
        .route(
            "/api/bookings/:id",
            delete(handlers::bookings::cancel_booking),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
