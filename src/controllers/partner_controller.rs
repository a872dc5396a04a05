use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;
use validator::Validate;

use crate::dto::{
    CreatePartnerRequest, MessageResponse, PaginatedResponse, Pagination, PartnerListQuery,
    PartnerResponse, UpdatePartnerRequest,
};
use crate::models::{Partner, PartnerFilter, PartnerPatch, PartnerStatus, Vehicle};
use crate::repositories::{PartnerRepository, VehicleRepository};
use crate::state::AppState;
use crate::utils::errors::{bad_request_error, conflict_error, not_found_error, AppResult};
use crate::utils::validation::{page_offset, parse_status_filter};

const PARTNER_STATUSES: [&str; 2] = ["active", "inactive"];

pub struct PartnerController {
    partners: Arc<dyn PartnerRepository>,
    vehicles: Arc<dyn VehicleRepository>,
}

impl PartnerController {
    pub fn new(state: &AppState) -> Self {
        Self {
            partners: state.partners.clone(),
            vehicles: state.vehicles.clone(),
        }
    }

    pub async fn list(&self, query: PartnerListQuery) -> AppResult<PaginatedResponse<PartnerResponse>> {
        query.validate()?;
        let status = parse_status_filter::<PartnerStatus>(query.status.as_deref(), &PARTNER_STATUSES)?;

        let filter = PartnerFilter {
            status,
            location: query.location.filter(|l| !l.is_empty()),
            limit: query.limit,
            offset: page_offset(query.page, query.limit),
        };
        let (partners, total) = self.partners.list(&filter).await?;

        // Flotas de toda la página en una sola consulta
        let ids: Vec<String> = partners.iter().map(|p| p.partner_id.clone()).collect();
        let mut fleets: HashMap<String, Vec<Vehicle>> = HashMap::new();
        for vehicle in self.vehicles.list_by_partners(&ids).await? {
            fleets.entry(vehicle.partner_id.clone()).or_default().push(vehicle);
        }

        let data = partners
            .into_iter()
            .map(|partner| {
                let vehicles = fleets.remove(&partner.partner_id).unwrap_or_default();
                PartnerResponse::new(partner, vehicles)
            })
            .collect();

        Ok(PaginatedResponse::new(
            data,
            Pagination::new(query.page, query.limit, total),
        ))
    }

    pub async fn create(&self, request: CreatePartnerRequest) -> AppResult<MessageResponse> {
        request.validate()?;

        let in_use = self
            .partners
            .contact_in_use(
                Some(&request.contact.email),
                Some(&request.contact.phone),
                None,
            )
            .await?;
        if in_use {
            return Err(conflict_error(
                "A partner with this email or phone number already exists.",
            ));
        }

        let partner = Partner::new(
            request.name,
            request.contact.phone,
            request.contact.email,
            request.address,
        );
        self.partners.create(&partner).await?;

        info!(partner_id = %partner.partner_id, "cab partner created");
        Ok(MessageResponse::new(
            partner.partner_id,
            "Cab partner created successfully",
        ))
    }

    pub async fn get(&self, partner_id: &str) -> AppResult<PartnerResponse> {
        let partner = self
            .partners
            .find_by_id(partner_id)
            .await?
            .ok_or_else(|| not_found_error("Cab partner", partner_id))?;
        let vehicles = self.vehicles.list_by_partner(partner_id, None).await?;

        Ok(PartnerResponse::new(partner, vehicles))
    }

    pub async fn update(
        &self,
        partner_id: &str,
        request: UpdatePartnerRequest,
    ) -> AppResult<MessageResponse> {
        request.validate()?;

        let existing = self
            .partners
            .find_by_id(partner_id)
            .await?
            .ok_or_else(|| not_found_error("Cab partner", partner_id))?;

        let contact = request.contact.unwrap_or_default();
        let changed_email = contact.email.as_deref().filter(|e| *e != existing.email);
        let changed_phone = contact.phone.as_deref().filter(|p| *p != existing.phone);

        if changed_email.is_some() || changed_phone.is_some() {
            let in_use = self
                .partners
                .contact_in_use(changed_email, changed_phone, Some(partner_id))
                .await?;
            if in_use {
                return Err(conflict_error(
                    "Update failed: The new email or phone number is already in use by another partner.",
                ));
            }
        }

        let status = request
            .status
            .as_deref()
            .map(|s| {
                s.parse::<PartnerStatus>()
                    .map_err(|_| bad_request_error("Status must be either 'active' or 'inactive'"))
            })
            .transpose()?;

        let patch = PartnerPatch {
            name: request.name,
            phone: contact.phone,
            email: contact.email,
            address: request.address,
            status,
        };

        if patch.is_empty() {
            return Ok(MessageResponse::new(
                partner_id,
                "No update data provided; partner remains unchanged.",
            ));
        }

        self.partners.update(partner_id, &patch).await?;

        info!(partner_id, "cab partner updated");
        Ok(MessageResponse::new(partner_id, "Cab partner updated successfully"))
    }

    /// Borra el partner y su flota
    pub async fn delete(&self, partner_id: &str) -> AppResult<MessageResponse> {
        if !self.partners.delete(partner_id).await? {
            return Err(not_found_error("Cab partner", partner_id));
        }

        info!(partner_id, "cab partner deleted");
        Ok(MessageResponse::new(partner_id, "Cab partner deleted successfully"))
    }
}
