//! Rutas HTTP
//!
//! `create_router` monta todas las rutas sobre el estado compartido junto
//! con las capas comunes (trazas, CORS, compresión, timeout y límites).

pub mod booking_routes;
pub mod partner_routes;

use axum::{
    error_handling::HandleErrorLayer, extract::DefaultBodyLimit, extract::State,
    routing::get, Json, Router,
};
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::{compression::CompressionLayer, trace::TraceLayer};

use crate::middleware::{cors_layer, handle_middleware_error};
use crate::state::AppState;

/// Tamaño máximo aceptado para un body JSON
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Peticiones simultáneas antes de encolar
pub const MAX_CONCURRENT_REQUESTS: usize = 1024;

pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);
    let request_timeout = state.config.request_timeout;

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/partners", partner_routes::create_partner_router())
        .nest("/api/bookings", booking_routes::create_booking_router())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_middleware_error))
                .concurrency_limit(MAX_CONCURRENT_REQUESTS)
                .timeout(request_timeout),
        )
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "environment": state.config.environment,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
