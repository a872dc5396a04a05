//! Punto de extensión para la asignación de conductores
//!
//! La búsqueda de conductores se dispara después de confirmar la creación
//! de una reserva. No hay algoritmo de despacho: la implementación
//! incluida solo deja constancia en los logs y la reserva permanece en
//! `searching`.

use async_trait::async_trait;
use tracing::info;

use crate::models::Booking;

#[async_trait]
pub trait DriverMatcher: Send + Sync {
    /// Se invoca una vez por reserva recién creada, fuera de la transacción
    async fn request_driver(&self, booking: &Booking);
}

/// Matcher por defecto: registra la petición y no asigna nada
#[derive(Debug, Clone, Default)]
pub struct LoggingDriverMatcher;

#[async_trait]
impl DriverMatcher for LoggingDriverMatcher {
    async fn request_driver(&self, booking: &Booking) {
        info!(
            booking_id = %booking.booking_id,
            vehicle_type = %booking.vehicle_type,
            "searching for nearby drivers"
        );
    }
}
