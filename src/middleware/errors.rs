//! Errores producidos por las capas de `tower`
//!
//! `TimeoutLayer` y `ConcurrencyLimitLayer` devuelven `BoxError`; axum
//! necesita convertirlos en una respuesta antes de llegar al cliente.

use axum::{http::StatusCode, response::IntoResponse, BoxError, Json};
use serde_json::json;
use tower::timeout::error::Elapsed;

pub async fn handle_middleware_error(err: BoxError) -> impl IntoResponse {
    if err.is::<Elapsed>() {
        tracing::warn!("request timed out");
        return (
            StatusCode::REQUEST_TIMEOUT,
            Json(json!({
                "error": "Request Timeout",
                "message": "The request took too long to complete",
                "code": "TIMEOUT",
            })),
        );
    }

    tracing::error!(error = %err, "unhandled middleware error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": "Internal Server Error",
            "message": "An internal server error occurred",
            "code": "INTERNAL_ERROR",
        })),
    )
}
