//! Services module
//!
//! Este módulo contiene la lógica de negocio de la aplicación: el ciclo
//! de vida de las reservas, la estimación de tarifas y el punto de
//! extensión para asignar conductores.

pub mod booking_service;
pub mod driver_matcher;
pub mod fare_estimator;

pub use booking_service::BookingService;
pub use driver_matcher::{DriverMatcher, LoggingDriverMatcher};
pub use fare_estimator::{estimate_fare, FareError, GeoPoint, Tariff, STANDARD_TARIFF};
