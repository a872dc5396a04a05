//! Estimador de tarifas
//!
//! Distancia great-circle (haversine) entre dos puntos y desglose de la
//! tarifa estimada a partir de una tarifa fija. Funciones puras, sin I/O.

use rust_decimal::prelude::*;
use thiserror::Error;

use crate::models::fare::FareCalculation;

/// Radio medio de la Tierra en km
pub const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Debug, Error, PartialEq)]
pub enum FareError {
    #[error("Invalid location: latitude {latitude}, longitude {longitude}")]
    InvalidLocation { latitude: f64, longitude: f64 },
}

/// Punto geográfico validado (grados decimales)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    latitude: f64,
    longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, FareError> {
        let valid = latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude);

        if !valid {
            return Err(FareError::InvalidLocation { latitude, longitude });
        }

        Ok(Self { latitude, longitude })
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }
}

/// Parámetros tarifarios
#[derive(Debug, Clone, PartialEq)]
pub struct Tariff {
    pub base_fare: f64,
    pub per_km: f64,
    pub per_minute: f64,
    pub minutes_per_km: f64,
    pub surge_multiplier: f64,
    pub tax_rate: f64,
    pub currency: &'static str,
}

/// Tarifa estándar. No hay modelo de surge dinámico: el multiplicador es 1.0.
pub const STANDARD_TARIFF: Tariff = Tariff {
    base_fare: 50.0,
    per_km: 12.0,
    per_minute: 1.5,
    minutes_per_km: 2.5,
    surge_multiplier: 1.0,
    tax_rate: 0.05,
    currency: "INR",
};

impl Default for Tariff {
    fn default() -> Self {
        STANDARD_TARIFF
    }
}

/// Resultado de una estimación: distancia, duración y desglose
#[derive(Debug, Clone, PartialEq)]
pub struct FareEstimate {
    /// Distancia en km redondeada a 2 decimales
    pub distance_km: f64,
    pub duration_minutes: i32,
    pub fare: FareCalculation,
}

/// Redondeo a 2 decimales (mitad lejos de cero)
pub fn round2(value: f64) -> f64 {
    Decimal::from_f64(value)
        .map(|d| d.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|d| d.to_f64())
        .unwrap_or(value)
}

/// Distancia haversine en km
pub fn haversine_km(from: &GeoPoint, to: &GeoPoint) -> f64 {
    let dlat = (to.latitude - from.latitude).to_radians();
    let dlon = (to.longitude - from.longitude).to_radians();

    let a = (dlat / 2.0).sin().powi(2)
        + from.latitude.to_radians().cos()
            * to.latitude.to_radians().cos()
            * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

impl Tariff {
    /// Estimar tarifa entre dos puntos
    pub fn estimate(&self, pickup: &GeoPoint, dropoff: &GeoPoint) -> FareEstimate {
        let distance_km = haversine_km(pickup, dropoff);
        let duration_minutes = (distance_km * self.minutes_per_km).floor() as i32;

        let distance_charge = distance_km * self.per_km;
        let time_charge = f64::from(duration_minutes) * self.per_minute;

        let subtotal = self.base_fare + distance_charge + time_charge;
        let pre_tax = subtotal * self.surge_multiplier;
        let tax_amount = pre_tax * self.tax_rate;
        let total = pre_tax + tax_amount;

        FareEstimate {
            distance_km: round2(distance_km),
            duration_minutes,
            fare: FareCalculation {
                base_fare: round2(self.base_fare),
                distance_charge: round2(distance_charge),
                time_charge: round2(time_charge),
                surge_multiplier: self.surge_multiplier,
                tax_amount: round2(tax_amount),
                other_charges: None,
                total_amount: round2(total),
                currency: self.currency.to_string(),
            },
        }
    }
}

/// Estimación con la tarifa estándar, validando coordenadas crudas
pub fn estimate_fare(
    pickup: (f64, f64),
    dropoff: (f64, f64),
) -> Result<FareEstimate, FareError> {
    let pickup = GeoPoint::new(pickup.0, pickup.1)?;
    let dropoff = GeoPoint::new(dropoff.0, dropoff.1)?;
    Ok(STANDARD_TARIFF.estimate(&pickup, &dropoff))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(lat: f64, lon: f64) -> GeoPoint {
        GeoPoint::new(lat, lon).unwrap()
    }

    #[test]
    fn test_distance_is_symmetric() {
        let pairs = [
            (point(12.9716, 77.5946), point(12.9352, 77.6245)),
            (point(-33.8688, 151.2093), point(51.5074, -0.1278)),
            (point(89.9, -179.9), point(-89.9, 179.9)),
        ];

        for (a, b) in pairs {
            assert_eq!(haversine_km(&a, &b), haversine_km(&b, &a));
        }
    }

    #[test]
    fn test_distance_to_self_is_zero() {
        let a = point(12.9716, 77.5946);
        assert_eq!(haversine_km(&a, &a), 0.0);

        let estimate = STANDARD_TARIFF.estimate(&a, &a);
        assert_eq!(estimate.duration_minutes, 0);
        assert_eq!(estimate.fare.total_amount, 52.5);
    }

    #[test]
    fn test_one_degree_of_longitude_on_equator() {
        let d = haversine_km(&point(0.0, 0.0), &point(0.0, 1.0));
        assert!((d - 111.19).abs() < 0.01, "distance was {}", d);
    }

    #[test]
    fn test_bangalore_short_ride() {
        let estimate = estimate_fare((12.9716, 77.5946), (12.9352, 77.6245)).unwrap();

        assert_eq!(estimate.distance_km, 5.18);
        assert_eq!(estimate.duration_minutes, 12);
        assert_eq!(estimate.fare.base_fare, 50.0);
        assert_eq!(estimate.fare.distance_charge, 62.22);
        assert_eq!(estimate.fare.time_charge, 18.0);
        assert_eq!(estimate.fare.surge_multiplier, 1.0);
        assert_eq!(estimate.fare.tax_amount, 6.51);
        assert_eq!(estimate.fare.total_amount, 136.73);
        assert_eq!(estimate.fare.currency, "INR");
    }

    #[test]
    fn test_total_matches_subtotal_plus_tax() {
        let rides = [
            ((12.9716, 77.5946), (12.9352, 77.6245)),
            ((12.9716, 77.5946), (13.0827, 80.2707)),
            ((19.0760, 72.8777), (18.5204, 73.8567)),
            ((28.6139, 77.2090), (28.7041, 77.1025)),
        ];

        for (pickup, dropoff) in rides {
            let estimate = estimate_fare(pickup, dropoff).unwrap();
            let fare = &estimate.fare;
            let subtotal = round2(fare.base_fare + fare.distance_charge + fare.time_charge);
            let expected = round2(subtotal * 1.05);
            assert!(
                (fare.total_amount - expected).abs() <= 0.02,
                "total {} expected {}",
                fare.total_amount,
                expected
            );
        }
    }

    #[test]
    fn test_duration_is_floored() {
        // 1 grado de longitud en el ecuador: 111.19 km * 2.5 = 277.98 min
        let estimate = estimate_fare((0.0, 0.0), (0.0, 1.0)).unwrap();
        assert_eq!(estimate.duration_minutes, 277);
        assert_eq!(estimate.fare.time_charge, 415.5);
    }

    #[test]
    fn test_invalid_locations_rejected() {
        assert!(GeoPoint::new(90.0, 180.0).is_ok());
        assert!(GeoPoint::new(-90.0, -180.0).is_ok());

        assert!(matches!(GeoPoint::new(90.1, 0.0), Err(FareError::InvalidLocation { .. })));
        assert!(GeoPoint::new(0.0, -180.5).is_err());
        assert!(GeoPoint::new(f64::NAN, 0.0).is_err());
        assert!(GeoPoint::new(0.0, f64::INFINITY).is_err());
        assert!(estimate_fare((0.0, 0.0), (123.0, 0.0)).is_err());
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(62.21582213828732), 62.22);
        assert_eq!(round2(6.510791106914366), 6.51);
        assert_eq!(round2(2.675_4), 2.68);
        assert_eq!(round2(0.0), 0.0);
    }
}
