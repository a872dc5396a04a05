//! Capa de persistencia
//!
//! Traits de acceso a datos y sus dos implementaciones: PostgreSQL
//! (`sqlx`) y un almacén en memoria con las mismas garantías
//! (unicidad, borrado en cascada, commit todo-o-nada).

pub mod booking_repository;
pub mod memory_repository;
pub mod partner_repository;
pub mod vehicle_repository;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{
    Booking, BookingFilter, BookingStatus, DriverSummary, FareCalculation, Partner,
    PartnerFilter, PartnerPatch, StatusHistoryEntry, Vehicle, VehiclePatch, VehicleStatus,
    VehicleSummary,
};
use crate::utils::errors::AppResult;

pub use booking_repository::PgBookingRepository;
pub use memory_repository::MemoryStore;
pub use partner_repository::PgPartnerRepository;
pub use vehicle_repository::PgVehicleRepository;

/// Repository trait para partners
#[async_trait]
pub trait PartnerRepository: Send + Sync {
    /// Página de partners según filtros, más el total sin paginar
    async fn list(&self, filter: &PartnerFilter) -> AppResult<(Vec<Partner>, i64)>;

    async fn find_by_id(&self, partner_id: &str) -> AppResult<Option<Partner>>;

    async fn exists(&self, partner_id: &str) -> AppResult<bool>;

    /// ¿Otro partner usa ya este email o teléfono?
    async fn contact_in_use(
        &self,
        email: Option<&str>,
        phone: Option<&str>,
        excluding: Option<&str>,
    ) -> AppResult<bool>;

    async fn create(&self, partner: &Partner) -> AppResult<()>;

    async fn update(&self, partner_id: &str, patch: &PartnerPatch) -> AppResult<()>;

    /// Borra el partner y, en cascada, sus vehículos. `false` si no existía.
    async fn delete(&self, partner_id: &str) -> AppResult<bool>;
}

/// Repository trait para vehículos
#[async_trait]
pub trait VehicleRepository: Send + Sync {
    async fn list_by_partner(
        &self,
        partner_id: &str,
        status: Option<VehicleStatus>,
    ) -> AppResult<Vec<Vehicle>>;

    /// Vehículos de varios partners en una sola consulta
    async fn list_by_partners(&self, partner_ids: &[String]) -> AppResult<Vec<Vehicle>>;

    /// Vehículo solo si pertenece al partner indicado
    async fn find_for_partner(&self, partner_id: &str, vehicle_id: &str)
        -> AppResult<Option<Vehicle>>;

    async fn find_by_id(&self, vehicle_id: &str) -> AppResult<Option<Vehicle>>;

    async fn registration_in_use(&self, registration: &str, excluding: Option<&str>)
        -> AppResult<bool>;

    async fn create(&self, vehicle: &Vehicle) -> AppResult<()>;

    async fn update(&self, vehicle_id: &str, patch: &VehiclePatch) -> AppResult<()>;

    async fn delete(&self, vehicle_id: &str) -> AppResult<bool>;
}

/// Repository trait para reservas: cada operación del ciclo de vida abre
/// su propia transacción.
#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn begin(&self) -> AppResult<Box<dyn BookingTransaction>>;
}

/// Unidad de trabajo sobre bookings, fare_calculations y
/// booking_status_history.
///
/// Soltar la transacción sin llamar a `commit` la revierte.
#[async_trait]
pub trait BookingTransaction: Send {
    async fn user_exists(&mut self, user_id: &str) -> AppResult<bool>;

    async fn payment_method_belongs_to(
        &mut self,
        payment_method_id: &str,
        user_id: &str,
    ) -> AppResult<bool>;

    async fn insert_booking(&mut self, booking: &Booking) -> AppResult<()>;

    async fn insert_fare(&mut self, booking_id: &str, fare: &FareCalculation) -> AppResult<()>;

    /// Sobrescribe la fila 1:1 de fare_calculations
    async fn overwrite_fare(&mut self, booking_id: &str, fare: &FareCalculation) -> AppResult<()>;

    async fn append_status(
        &mut self,
        booking_id: &str,
        status: BookingStatus,
        at: DateTime<Utc>,
    ) -> AppResult<()>;

    async fn find_booking(&mut self, booking_id: &str) -> AppResult<Option<Booking>>;

    /// Como `find_booking`, bloqueando la fila hasta el fin de la transacción
    async fn lock_booking(&mut self, booking_id: &str) -> AppResult<Option<Booking>>;

    async fn find_fare(&mut self, booking_id: &str) -> AppResult<Option<FareCalculation>>;

    async fn find_driver(&mut self, driver_id: &str) -> AppResult<Option<DriverSummary>>;

    async fn find_vehicle_summary(&mut self, vehicle_id: &str)
        -> AppResult<Option<VehicleSummary>>;

    /// Persiste estado, motivo y penalización de una cancelación
    async fn save_cancellation(&mut self, booking: &Booking) -> AppResult<()>;

    /// Persiste destino y estimaciones recalculadas
    async fn save_destination(&mut self, booking: &Booking) -> AppResult<()>;

    /// `on_ride → available`; `false` si el conductor no estaba en viaje
    async fn release_driver(&mut self, driver_id: &str) -> AppResult<bool>;

    /// `on_ride → available`; `false` si el vehículo no estaba en viaje
    async fn release_vehicle(&mut self, vehicle_id: &str) -> AppResult<bool>;

    async fn list_bookings(&mut self, filter: &BookingFilter) -> AppResult<(Vec<Booking>, i64)>;

    async fn status_history(&mut self, booking_id: &str) -> AppResult<Vec<StatusHistoryEntry>>;

    async fn commit(self: Box<Self>) -> AppResult<()>;
}
