//! Modelo de FareCalculation
//!
//! Relación 1:1 con bookings. Se sobrescribe (no se añade) cuando cambia
//! el destino.

use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct FareCalculation {
    pub base_fare: f64,
    pub distance_charge: f64,
    pub time_charge: f64,
    pub surge_multiplier: f64,
    pub tax_amount: f64,
    pub other_charges: Option<f64>,
    pub total_amount: f64,
    pub currency: String,
}
