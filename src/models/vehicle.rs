//! Modelo de Vehicle
//!
//! Este módulo contiene el struct Vehicle y sus variantes para CRUD operations.
//! Cada vehículo pertenece a exactamente un partner.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::StatusParseError;

/// Estado del vehículo
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleStatus {
    Available,
    OnRide,
    Offline,
}

impl VehicleStatus {
    pub const ALLOWED: [&'static str; 3] = ["available", "on_ride", "offline"];

    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleStatus::Available => "available",
            VehicleStatus::OnRide => "on_ride",
            VehicleStatus::Offline => "offline",
        }
    }
}

impl fmt::Display for VehicleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VehicleStatus {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(VehicleStatus::Available),
            "on_ride" => Ok(VehicleStatus::OnRide),
            "offline" => Ok(VehicleStatus::Offline),
            other => Err(StatusParseError::new("vehicle", other)),
        }
    }
}

impl TryFrom<String> for VehicleStatus {
    type Error = StatusParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Vehicle principal - mapea a la tabla vehicles
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct Vehicle {
    pub vehicle_id: String,
    pub partner_id: String,
    #[sqlx(rename = "type")]
    pub vehicle_type: String,
    pub make: Option<String>,
    pub model: Option<String>,
    pub color: Option<String>,
    pub registration: String,
    #[sqlx(try_from = "String")]
    pub status: VehicleStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Vehicle {
    pub fn new(
        partner_id: String,
        vehicle_type: String,
        registration: String,
        make: Option<String>,
        model: Option<String>,
        color: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            vehicle_id: super::generate_id("veh"),
            partner_id,
            vehicle_type,
            make,
            model,
            color,
            registration,
            status: VehicleStatus::Available,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Cambios parciales sobre un vehículo
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VehiclePatch {
    pub vehicle_type: Option<String>,
    pub registration: Option<String>,
    pub status: Option<VehicleStatus>,
    pub make: Option<String>,
    pub model: Option<String>,
    pub color: Option<String>,
}

impl VehiclePatch {
    pub fn is_empty(&self) -> bool {
        self.vehicle_type.is_none()
            && self.registration.is_none()
            && self.status.is_none()
            && self.make.is_none()
            && self.model.is_none()
            && self.color.is_none()
    }

    pub fn apply_to(&self, vehicle: &mut Vehicle) {
        if let Some(vehicle_type) = &self.vehicle_type {
            vehicle.vehicle_type = vehicle_type.clone();
        }
        if let Some(registration) = &self.registration {
            vehicle.registration = registration.clone();
        }
        if let Some(status) = self.status {
            vehicle.status = status;
        }
        if let Some(make) = &self.make {
            vehicle.make = Some(make.clone());
        }
        if let Some(model) = &self.model {
            vehicle.model = Some(model.clone());
        }
        if let Some(color) = &self.color {
            vehicle.color = Some(color.clone());
        }
    }
}
