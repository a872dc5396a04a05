use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::common_dto::{default_limit, default_page};
use super::vehicle_dto::VehicleResponse;
use crate::models::{Partner, PartnerStatus, Vehicle};
use crate::utils::validation::validate_not_blank;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ContactInfo {
    #[validate(custom = "validate_not_blank", length(max = 32))]
    pub phone: String,
    #[validate(email)]
    pub email: String,
}

// Request para registrar un partner
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreatePartnerRequest {
    #[validate(custom = "validate_not_blank", length(max = 255))]
    pub name: String,
    #[validate]
    pub contact: ContactInfo,
    pub address: Option<String>,
}

// Contacto parcial: cada campo se actualiza por separado
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ContactPatch {
    #[validate(custom = "validate_not_blank", length(max = 32))]
    pub phone: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
}

// Request para actualizar un partner (parcial)
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdatePartnerRequest {
    #[validate(custom = "validate_not_blank", length(max = 255))]
    pub name: Option<String>,
    #[validate]
    pub contact: Option<ContactPatch>,
    pub address: Option<String>,
    /// `active` | `inactive`, se valida en el controller
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PartnerListQuery {
    #[serde(default = "default_page")]
    #[validate(range(min = 1))]
    pub page: i64,
    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 100))]
    pub limit: i64,
    pub status: Option<String>,
    /// Subcadena buscada en la dirección
    pub location: Option<String>,
}

// Response de partner con su flota
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerResponse {
    pub partner_id: String,
    pub name: String,
    pub contact: ContactInfo,
    pub address: Option<String>,
    pub vehicles: Vec<VehicleResponse>,
    pub status: PartnerStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PartnerResponse {
    pub fn new(partner: Partner, vehicles: Vec<Vehicle>) -> Self {
        Self {
            partner_id: partner.partner_id,
            name: partner.name,
            contact: ContactInfo {
                phone: partner.phone,
                email: partner.email,
            },
            address: partner.address,
            vehicles: vehicles.into_iter().map(VehicleResponse::from).collect(),
            status: partner.status,
            created_at: partner.created_at,
            updated_at: partner.updated_at,
        }
    }
}
