use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::common_dto::{default_limit, default_page};
use crate::models::{
    Booking, BookingStatus, DriverSummary, FareCalculation, Location, StatusHistoryEntry,
    VehicleSummary,
};
use crate::utils::validation::validate_not_blank;

// Request para crear una reserva
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    #[validate(custom = "validate_not_blank")]
    pub user_id: String,
    #[validate]
    pub pickup_location: Location,
    #[validate]
    pub dropoff_location: Location,
    #[validate(custom = "validate_not_blank", length(max = 50))]
    pub vehicle_type: String,
    #[validate(custom = "validate_not_blank")]
    pub payment_method_id: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct CancelBookingRequest {
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BookingListQuery {
    #[validate(custom = "validate_not_blank")]
    pub user_id: String,
    pub status: Option<String>,
    #[serde(default = "default_page")]
    #[validate(range(min = 1))]
    pub page: i64,
    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 100))]
    pub limit: i64,
}

/// Desglose de tarifa; los componentes ausentes no se serializan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FareBreakdown {
    pub base_fare: f64,
    pub distance_charge: f64,
    pub time_charge: f64,
    pub surge_multiplier: f64,
    pub tax: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub other_charges: Option<f64>,
}

impl From<&FareCalculation> for FareBreakdown {
    fn from(fare: &FareCalculation) -> Self {
        Self {
            base_fare: fare.base_fare,
            distance_charge: fare.distance_charge,
            time_charge: fare.time_charge,
            surge_multiplier: fare.surge_multiplier,
            tax: fare.tax_amount,
            other_charges: fare.other_charges,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FareInfo {
    pub currency: String,
    pub amount: f64,
    pub breakdown: Option<FareBreakdown>,
}

impl FareInfo {
    pub fn new(currency: impl Into<String>, amount: f64) -> Self {
        Self {
            currency: currency.into(),
            amount,
            breakdown: None,
        }
    }

    pub fn from_calculation(fare: &FareCalculation) -> Self {
        Self {
            currency: fare.currency.clone(),
            amount: fare.total_amount,
            breakdown: Some(FareBreakdown::from(fare)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverInfo {
    pub driver_id: String,
    pub name: String,
    pub phone: String,
    pub rating: f64,
}

impl From<DriverSummary> for DriverInfo {
    fn from(driver: DriverSummary) -> Self {
        Self {
            name: driver.full_name(),
            driver_id: driver.driver_id,
            phone: driver.phone.unwrap_or_default(),
            rating: driver.average_rating.unwrap_or(0.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleInfo {
    pub vehicle_id: String,
    pub make: Option<String>,
    pub model: Option<String>,
    pub color: Option<String>,
    pub registration: String,
}

impl From<VehicleSummary> for VehicleInfo {
    fn from(vehicle: VehicleSummary) -> Self {
        Self {
            vehicle_id: vehicle.vehicle_id,
            make: vehicle.make,
            model: vehicle.model,
            color: vehicle.color,
            registration: vehicle.registration,
        }
    }
}

// Response de creación de reserva
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingResponse {
    pub booking_id: String,
    pub status: BookingStatus,
    pub estimated_fare: Option<FareInfo>,
    pub message: Option<String>,
}

// Detalle completo de una reserva
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingDetail {
    pub booking_id: String,
    pub user_id: String,
    pub status: BookingStatus,
    pub pickup_location: Location,
    pub dropoff_location: Location,
    pub vehicle_type: String,
    pub estimated_fare: Option<FareInfo>,
    pub actual_fare: Option<FareInfo>,
    pub driver_info: Option<DriverInfo>,
    pub vehicle_info: Option<VehicleInfo>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Minutos, solo en `confirmed` y `driver_arrived`
    pub eta: Option<i32>,
}

impl BookingDetail {
    pub fn new(
        booking: Booking,
        fare: Option<FareCalculation>,
        driver: Option<DriverSummary>,
        vehicle: Option<VehicleSummary>,
    ) -> Self {
        let estimated_fare = booking.estimated_fare_amount.map(|amount| FareInfo {
            currency: booking
                .estimated_fare_currency
                .clone()
                .unwrap_or_else(|| "INR".to_string()),
            amount,
            breakdown: fare.as_ref().map(FareBreakdown::from),
        });
        let actual_fare = booking.actual_fare_amount.map(|amount| {
            FareInfo::new(
                booking
                    .actual_fare_currency
                    .clone()
                    .unwrap_or_else(|| "INR".to_string()),
                amount,
            )
        });

        Self {
            pickup_location: booking.pickup_location(),
            dropoff_location: booking.dropoff_location(),
            eta: booking.eta_minutes(),
            estimated_fare,
            actual_fare,
            driver_info: driver.map(DriverInfo::from),
            vehicle_info: vehicle.map(VehicleInfo::from),
            booking_id: booking.booking_id,
            user_id: booking.user_id,
            status: booking.status,
            vehicle_type: booking.vehicle_type,
            created_at: booking.created_at,
            updated_at: booking.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelBookingResponse {
    pub booking_id: String,
    pub status: BookingStatus,
    pub message: String,
    pub cancellation_fee: Option<FareInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusHistoryResponse {
    pub status: BookingStatus,
    pub changed_at: DateTime<Utc>,
}

impl From<StatusHistoryEntry> for StatusHistoryResponse {
    fn from(entry: StatusHistoryEntry) -> Self {
        Self {
            status: entry.status,
            changed_at: entry.changed_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fare() -> FareCalculation {
        FareCalculation {
            base_fare: 50.0,
            distance_charge: 62.22,
            time_charge: 18.0,
            surge_multiplier: 1.0,
            tax_amount: 6.51,
            other_charges: None,
            total_amount: 136.73,
            currency: "INR".to_string(),
        }
    }

    #[test]
    fn test_breakdown_omits_missing_components() {
        let json = serde_json::to_value(FareInfo::from_calculation(&fare())).unwrap();
        let breakdown = json["breakdown"].as_object().unwrap();

        assert_eq!(json["amount"], 136.73);
        assert_eq!(breakdown["baseFare"], 50.0);
        assert_eq!(breakdown["tax"], 6.51);
        assert!(!breakdown.contains_key("otherCharges"));
    }

    #[test]
    fn test_driver_info_defaults() {
        let info = DriverInfo::from(DriverSummary {
            driver_id: "drv_1".to_string(),
            first_name: Some("Asha".to_string()),
            last_name: Some("Rao".to_string()),
            phone: None,
            average_rating: None,
        });
        assert_eq!(info.name, "Asha Rao");
        assert_eq!(info.phone, "");
        assert_eq!(info.rating, 0.0);
    }

    #[test]
    fn test_booking_request_rejects_out_of_range_latitude() {
        let request: BookingRequest = serde_json::from_value(serde_json::json!({
            "userId": "user_1",
            "pickupLocation": {"latitude": 95.0, "longitude": 77.59},
            "dropoffLocation": {"latitude": 12.93, "longitude": 77.62},
            "vehicleType": "sedan",
            "paymentMethodId": "pm_1"
        }))
        .unwrap();
        assert!(request.validate().is_err());
    }
}
