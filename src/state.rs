//! Shared application state
//!
//! Este módulo define el estado compartido de la aplicación que se pasa
//! a través del router de Axum.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::environment::EnvironmentConfig;
use crate::repositories::{
    BookingRepository, MemoryStore, PartnerRepository, PgBookingRepository, PgPartnerRepository,
    PgVehicleRepository, VehicleRepository,
};
use crate::services::{BookingService, DriverMatcher, LoggingDriverMatcher};

#[derive(Clone)]
pub struct AppState {
    pub config: EnvironmentConfig,
    pub partners: Arc<dyn PartnerRepository>,
    pub vehicles: Arc<dyn VehicleRepository>,
    pub bookings: Arc<dyn BookingRepository>,
    pub driver_matcher: Arc<dyn DriverMatcher>,
}

impl AppState {
    /// Estado respaldado por PostgreSQL
    pub fn with_postgres(pool: PgPool, config: EnvironmentConfig) -> Self {
        Self {
            config,
            partners: Arc::new(PgPartnerRepository::new(pool.clone())),
            vehicles: Arc::new(PgVehicleRepository::new(pool.clone())),
            bookings: Arc::new(PgBookingRepository::new(pool)),
            driver_matcher: Arc::new(LoggingDriverMatcher),
        }
    }

    /// Estado respaldado por el almacén en memoria
    pub fn with_memory(store: MemoryStore, config: EnvironmentConfig) -> Self {
        Self {
            config,
            partners: Arc::new(store.clone()),
            vehicles: Arc::new(store.clone()),
            bookings: Arc::new(store),
            driver_matcher: Arc::new(LoggingDriverMatcher),
        }
    }

    pub fn booking_service(&self) -> BookingService {
        BookingService::new(self.bookings.clone(), self.driver_matcher.clone())
    }
}
