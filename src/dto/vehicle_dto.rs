use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::{Vehicle, VehicleStatus};
use crate::utils::validation::validate_not_blank;

// Request para añadir un vehículo a la flota de un partner
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateVehicleRequest {
    #[serde(rename = "type")]
    #[validate(custom = "validate_not_blank")]
    pub vehicle_type: String,
    #[validate(custom = "validate_not_blank", length(max = 32))]
    pub registration: String,
    pub make: Option<String>,
    pub model: Option<String>,
    pub color: Option<String>,
}

// Request para actualizar un vehículo (parcial)
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateVehicleRequest {
    #[serde(rename = "type")]
    #[validate(custom = "validate_not_blank")]
    pub vehicle_type: Option<String>,
    #[validate(custom = "validate_not_blank", length(max = 32))]
    pub registration: Option<String>,
    /// Se valida contra `VehicleStatus` en el controller
    pub status: Option<String>,
    pub make: Option<String>,
    pub model: Option<String>,
    pub color: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VehicleListQuery {
    pub status: Option<String>,
}

// Response de vehículo
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleResponse {
    pub vehicle_id: String,
    #[serde(rename = "type")]
    pub vehicle_type: String,
    pub registration: String,
    pub status: VehicleStatus,
    pub make: Option<String>,
    pub model: Option<String>,
    pub color: Option<String>,
}

impl From<Vehicle> for VehicleResponse {
    fn from(vehicle: Vehicle) -> Self {
        Self {
            vehicle_id: vehicle.vehicle_id,
            vehicle_type: vehicle.vehicle_type,
            registration: vehicle.registration,
            status: vehicle.status,
            make: vehicle.make,
            model: vehicle.model,
            color: vehicle.color,
        }
    }
}
