use std::sync::Arc;

use tracing::info;
use validator::Validate;

use crate::dto::{
    CreateVehicleRequest, MessageResponse, UpdateVehicleRequest, VehicleListQuery,
    VehicleResponse,
};
use crate::models::{Vehicle, VehiclePatch, VehicleStatus};
use crate::repositories::{PartnerRepository, VehicleRepository};
use crate::state::AppState;
use crate::utils::errors::{bad_request_error, conflict_error, not_found_error, AppError, AppResult};
use crate::utils::validation::parse_status_filter;

pub struct VehicleController {
    partners: Arc<dyn PartnerRepository>,
    vehicles: Arc<dyn VehicleRepository>,
}

impl VehicleController {
    pub fn new(state: &AppState) -> Self {
        Self {
            partners: state.partners.clone(),
            vehicles: state.vehicles.clone(),
        }
    }

    async fn ensure_partner(&self, partner_id: &str) -> AppResult<()> {
        if !self.partners.exists(partner_id).await? {
            return Err(not_found_error("Cab partner", partner_id));
        }
        Ok(())
    }

    /// Vehículo del partner o 404 si no existe o pertenece a otro
    async fn owned_vehicle(&self, partner_id: &str, vehicle_id: &str) -> AppResult<Vehicle> {
        self.vehicles
            .find_for_partner(partner_id, vehicle_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "Vehicle with ID {} not found or does not belong to partner {}",
                    vehicle_id, partner_id
                ))
            })
    }

    pub async fn create(
        &self,
        partner_id: &str,
        request: CreateVehicleRequest,
    ) -> AppResult<MessageResponse> {
        request.validate()?;
        self.ensure_partner(partner_id).await?;

        if self
            .vehicles
            .registration_in_use(&request.registration, None)
            .await?
        {
            return Err(conflict_error(format!(
                "Vehicle with registration '{}' already exists.",
                request.registration
            )));
        }

        let vehicle = Vehicle::new(
            partner_id.to_string(),
            request.vehicle_type,
            request.registration,
            request.make,
            request.model,
            request.color,
        );
        self.vehicles.create(&vehicle).await?;

        info!(partner_id, vehicle_id = %vehicle.vehicle_id, "vehicle added");
        Ok(MessageResponse::new(
            partner_id,
            format!(
                "Vehicle '{}' with registration '{}' added successfully",
                vehicle.vehicle_id, vehicle.registration
            ),
        ))
    }

    pub async fn update(
        &self,
        partner_id: &str,
        vehicle_id: &str,
        request: UpdateVehicleRequest,
    ) -> AppResult<MessageResponse> {
        request.validate()?;
        let existing = self.owned_vehicle(partner_id, vehicle_id).await?;

        if let Some(registration) = request
            .registration
            .as_deref()
            .filter(|r| *r != existing.registration)
        {
            if self
                .vehicles
                .registration_in_use(registration, Some(vehicle_id))
                .await?
            {
                return Err(conflict_error(format!(
                    "Update failed: Vehicle with registration '{}' already exists.",
                    registration
                )));
            }
        }

        let status = request
            .status
            .as_deref()
            .map(|s| {
                s.parse::<VehicleStatus>().map_err(|_| {
                    bad_request_error(format!(
                        "Vehicle status must be one of: {}",
                        VehicleStatus::ALLOWED.join(", ")
                    ))
                })
            })
            .transpose()?;

        let patch = VehiclePatch {
            vehicle_type: request.vehicle_type,
            registration: request.registration,
            status,
            make: request.make,
            model: request.model,
            color: request.color,
        };

        if patch.is_empty() {
            return Ok(MessageResponse::new(
                partner_id,
                "No update data provided; vehicle remains unchanged.",
            ));
        }

        self.vehicles.update(vehicle_id, &patch).await?;

        info!(partner_id, vehicle_id, "vehicle updated");
        Ok(MessageResponse::new(
            partner_id,
            format!("Vehicle {} updated successfully", vehicle_id),
        ))
    }

    pub async fn delete(&self, partner_id: &str, vehicle_id: &str) -> AppResult<MessageResponse> {
        self.owned_vehicle(partner_id, vehicle_id).await?;

        if !self.vehicles.delete(vehicle_id).await? {
            return Err(not_found_error("Vehicle", vehicle_id));
        }

        info!(partner_id, vehicle_id, "vehicle deleted");
        Ok(MessageResponse::new(
            partner_id,
            format!("Vehicle {} deleted successfully", vehicle_id),
        ))
    }

    pub async fn list(
        &self,
        partner_id: &str,
        query: VehicleListQuery,
    ) -> AppResult<Vec<VehicleResponse>> {
        self.ensure_partner(partner_id).await?;
        let status =
            parse_status_filter::<VehicleStatus>(query.status.as_deref(), &VehicleStatus::ALLOWED)?;

        let vehicles = self.vehicles.list_by_partner(partner_id, status).await?;
        Ok(vehicles.into_iter().map(VehicleResponse::from).collect())
    }
}
