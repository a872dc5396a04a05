use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};

use crate::dto::{
    BookingDetail, BookingListQuery, BookingRequest, BookingResponse, CancelBookingRequest,
    CancelBookingResponse, PaginatedResponse, StatusHistoryResponse,
};
use crate::models::Location;
use crate::state::AppState;
use crate::utils::errors::{bad_request_error, AppError, AppResult};

pub fn create_booking_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_booking).get(list_bookings))
        .route("/:booking_id", get(get_booking))
        .route("/:booking_id/cancel", post(cancel_booking))
        .route("/:booking_id/destination", put(update_destination))
        .route("/:booking_id/history", get(booking_history))
}

async fn create_booking(
    State(state): State<AppState>,
    Json(request): Json<BookingRequest>,
) -> Result<(StatusCode, Json<BookingResponse>), AppError> {
    let response = state.booking_service().create_booking(request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

async fn list_bookings(
    State(state): State<AppState>,
    Query(query): Query<BookingListQuery>,
) -> Result<Json<PaginatedResponse<BookingDetail>>, AppError> {
    let response = state.booking_service().list_bookings(query).await?;
    Ok(Json(response))
}

async fn get_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<String>,
) -> Result<Json<BookingDetail>, AppError> {
    let response = state.booking_service().get_booking_detail(&booking_id).await?;
    Ok(Json(response))
}

async fn cancel_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<String>,
    body: Bytes,
) -> Result<Json<CancelBookingResponse>, AppError> {
    let request = parse_cancel_body(&body)?;
    let response = state
        .booking_service()
        .cancel_booking(&booking_id, request)
        .await?;
    Ok(Json(response))
}

/// Body opcional: vacío o `null` cancela sin motivo; cualquier otro body
/// debe ser un `CancelBookingRequest` válido
fn parse_cancel_body(body: &[u8]) -> AppResult<CancelBookingRequest> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(CancelBookingRequest::default());
    }

    serde_json::from_slice::<Option<CancelBookingRequest>>(body)
        .map(Option::unwrap_or_default)
        .map_err(|e| bad_request_error(format!("Invalid request body: {}", e)))
}

async fn update_destination(
    State(state): State<AppState>,
    Path(booking_id): Path<String>,
    Json(new_dropoff): Json<Location>,
) -> Result<Json<BookingDetail>, AppError> {
    let response = state
        .booking_service()
        .update_destination(&booking_id, new_dropoff)
        .await?;
    Ok(Json(response))
}

async fn booking_history(
    State(state): State<AppState>,
    Path(booking_id): Path<String>,
) -> Result<Json<Vec<StatusHistoryResponse>>, AppError> {
    let response = state.booking_service().status_history(&booking_id).await?;
    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_or_null_body_means_no_reason() {
        assert!(parse_cancel_body(b"").unwrap().reason.is_none());
        assert!(parse_cancel_body(b"  \n").unwrap().reason.is_none());
        assert!(parse_cancel_body(b"null").unwrap().reason.is_none());
        assert!(parse_cancel_body(b"{}").unwrap().reason.is_none());
    }

    #[test]
    fn test_reason_is_read() {
        let request = parse_cancel_body(br#"{"reason": "Changed plans"}"#).unwrap();
        assert_eq!(request.reason.as_deref(), Some("Changed plans"));
    }

    #[test]
    fn test_malformed_body_is_rejected() {
        let bodies: [&[u8]; 3] = [br#"{"reason": 123}"#, b"{not json", b"[1, 2]"];
        for body in bodies {
            let err = parse_cancel_body(body).unwrap_err();
            assert!(matches!(err, AppError::BadRequest(_)), "{err}");
        }
    }
}
