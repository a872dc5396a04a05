//! Modelo de Booking
//!
//! Estado del ciclo de vida de una reserva, la fila de `bookings` y los
//! registros auxiliares (historial de estados, resúmenes de conductor y
//! vehículo asignados).

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use super::StatusParseError;

/// Estados de una reserva
///
/// `Searching → Confirmed → DriverArrived → Ongoing → Completed`, con
/// `Cancelled` alcanzable desde cualquier estado no terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Searching,
    Confirmed,
    DriverArrived,
    Ongoing,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 6] = [
        BookingStatus::Searching,
        BookingStatus::Confirmed,
        BookingStatus::DriverArrived,
        BookingStatus::Ongoing,
        BookingStatus::Completed,
        BookingStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Searching => "searching",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::DriverArrived => "driver_arrived",
            BookingStatus::Ongoing => "ongoing",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    /// Estados sumidero: no admiten más transiciones
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled)
    }

    /// Siguiente estado del camino feliz
    pub fn next(&self) -> Option<BookingStatus> {
        match self {
            BookingStatus::Searching => Some(BookingStatus::Confirmed),
            BookingStatus::Confirmed => Some(BookingStatus::DriverArrived),
            BookingStatus::DriverArrived => Some(BookingStatus::Ongoing),
            BookingStatus::Ongoing => Some(BookingStatus::Completed),
            BookingStatus::Completed | BookingStatus::Cancelled => None,
        }
    }

    /// Validación exhaustiva de transiciones
    pub fn can_transition_to(&self, target: BookingStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        target == BookingStatus::Cancelled || self.next() == Some(target)
    }

    /// Hay conductor comprometido: cancelar cobra penalización
    #[inline]
    pub fn charges_cancellation_fee(&self) -> bool {
        matches!(self, BookingStatus::Confirmed | BookingStatus::DriverArrived)
    }

    #[inline]
    pub fn allows_destination_change(&self) -> bool {
        matches!(
            self,
            BookingStatus::Confirmed | BookingStatus::DriverArrived | BookingStatus::Ongoing
        )
    }

    /// El ETA solo tiene sentido mientras el conductor se acerca
    #[inline]
    pub fn shows_eta(&self) -> bool {
        matches!(self, BookingStatus::Confirmed | BookingStatus::DriverArrived)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BookingStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| StatusParseError::new("booking", s))
    }
}

impl TryFrom<String> for BookingStatus {
    type Error = StatusParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Ubicación (recogida o destino)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Location {
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
    #[validate(length(max = 500))]
    pub address: Option<String>,
}

/// Booking principal - mapea a la tabla bookings
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct Booking {
    pub booking_id: String,
    pub user_id: String,
    #[sqlx(try_from = "String")]
    pub status: BookingStatus,
    pub pickup_latitude: Option<f64>,
    pub pickup_longitude: Option<f64>,
    pub pickup_address: Option<String>,
    pub dropoff_latitude: Option<f64>,
    pub dropoff_longitude: Option<f64>,
    pub dropoff_address: Option<String>,
    pub vehicle_type: String,
    pub payment_method_id: String,
    pub estimated_fare_amount: Option<f64>,
    pub estimated_fare_currency: Option<String>,
    pub estimated_distance: Option<f64>,
    pub estimated_duration: Option<i32>,
    pub driver_id: Option<String>,
    pub vehicle_id: Option<String>,
    pub actual_fare_amount: Option<f64>,
    pub actual_fare_currency: Option<String>,
    pub cancellation_reason: Option<String>,
    pub cancellation_fee_amount: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// ETA por defecto cuando la reserva no guarda duración estimada
pub const FALLBACK_ETA_MINUTES: i32 = 5;

impl Booking {
    /// Minutos hasta la llegada del conductor; solo mientras se acerca.
    /// Usa la duración estimada del viaje como aproximación.
    pub fn eta_minutes(&self) -> Option<i32> {
        if !self.status.shows_eta() {
            return None;
        }
        Some(self.estimated_duration.unwrap_or(FALLBACK_ETA_MINUTES))
    }

    /// Coordenadas de recogida, si están completas
    pub fn pickup_coordinates(&self) -> Option<(f64, f64)> {
        Some((self.pickup_latitude?, self.pickup_longitude?))
    }

    pub fn pickup_location(&self) -> Location {
        Location {
            latitude: self.pickup_latitude.unwrap_or_default(),
            longitude: self.pickup_longitude.unwrap_or_default(),
            address: self.pickup_address.clone(),
        }
    }

    pub fn dropoff_location(&self) -> Location {
        Location {
            latitude: self.dropoff_latitude.unwrap_or_default(),
            longitude: self.dropoff_longitude.unwrap_or_default(),
            address: self.dropoff_address.clone(),
        }
    }
}

/// Entrada del historial de estados (solo inserción)
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct StatusHistoryEntry {
    pub booking_id: String,
    #[sqlx(try_from = "String")]
    pub status: BookingStatus,
    pub changed_at: DateTime<Utc>,
}

/// Datos del conductor asignado
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct DriverSummary {
    pub driver_id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub average_rating: Option<f64>,
}

impl DriverSummary {
    pub fn full_name(&self) -> String {
        format!(
            "{} {}",
            self.first_name.as_deref().unwrap_or_default(),
            self.last_name.as_deref().unwrap_or_default()
        )
        .trim()
        .to_string()
    }
}

/// Datos del vehículo asignado
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct VehicleSummary {
    pub vehicle_id: String,
    pub make: Option<String>,
    pub model: Option<String>,
    pub color: Option<String>,
    pub registration: String,
}

/// Filtros para el listado de reservas de un usuario
#[derive(Debug, Clone, Default)]
pub struct BookingFilter {
    pub user_id: String,
    pub status: Option<BookingStatus>,
    pub limit: i64,
    pub offset: i64,
}
