use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};

use crate::controllers::{PartnerController, VehicleController};
use crate::dto::{
    CreatePartnerRequest, CreateVehicleRequest, MessageResponse, PaginatedResponse,
    PartnerListQuery, PartnerResponse, UpdatePartnerRequest, UpdateVehicleRequest,
    VehicleListQuery, VehicleResponse,
};
use crate::state::AppState;
use crate::utils::errors::AppError;

pub fn create_partner_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_partners).post(create_partner))
        .route(
            "/:partner_id",
            get(get_partner).put(update_partner).delete(delete_partner),
        )
        .route("/:partner_id/vehicles", get(list_vehicles).post(add_vehicle))
        .route(
            "/:partner_id/vehicles/:vehicle_id",
            put(update_vehicle).delete(delete_vehicle),
        )
}

async fn list_partners(
    State(state): State<AppState>,
    Query(query): Query<PartnerListQuery>,
) -> Result<Json<PaginatedResponse<PartnerResponse>>, AppError> {
    let controller = PartnerController::new(&state);
    let response = controller.list(query).await?;
    Ok(Json(response))
}

async fn create_partner(
    State(state): State<AppState>,
    Json(request): Json<CreatePartnerRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), AppError> {
    let controller = PartnerController::new(&state);
    let response = controller.create(request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

async fn get_partner(
    State(state): State<AppState>,
    Path(partner_id): Path<String>,
) -> Result<Json<PartnerResponse>, AppError> {
    let controller = PartnerController::new(&state);
    let response = controller.get(&partner_id).await?;
    Ok(Json(response))
}

async fn update_partner(
    State(state): State<AppState>,
    Path(partner_id): Path<String>,
    Json(request): Json<UpdatePartnerRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let controller = PartnerController::new(&state);
    let response = controller.update(&partner_id, request).await?;
    Ok(Json(response))
}

async fn delete_partner(
    State(state): State<AppState>,
    Path(partner_id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    let controller = PartnerController::new(&state);
    let response = controller.delete(&partner_id).await?;
    Ok(Json(response))
}

async fn list_vehicles(
    State(state): State<AppState>,
    Path(partner_id): Path<String>,
    Query(query): Query<VehicleListQuery>,
) -> Result<Json<Vec<VehicleResponse>>, AppError> {
    let controller = VehicleController::new(&state);
    let response = controller.list(&partner_id, query).await?;
    Ok(Json(response))
}

async fn add_vehicle(
    State(state): State<AppState>,
    Path(partner_id): Path<String>,
    Json(request): Json<CreateVehicleRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), AppError> {
    let controller = VehicleController::new(&state);
    let response = controller.create(&partner_id, request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

async fn update_vehicle(
    State(state): State<AppState>,
    Path((partner_id, vehicle_id)): Path<(String, String)>,
    Json(request): Json<UpdateVehicleRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let controller = VehicleController::new(&state);
    let response = controller.update(&partner_id, &vehicle_id, request).await?;
    Ok(Json(response))
}

async fn delete_vehicle(
    State(state): State<AppState>,
    Path((partner_id, vehicle_id)): Path<(String, String)>,
) -> Result<Json<MessageResponse>, AppError> {
    let controller = VehicleController::new(&state);
    let response = controller.delete(&partner_id, &vehicle_id).await?;
    Ok(Json(response))
}
