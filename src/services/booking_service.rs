//! Ciclo de vida de las reservas
//!
//! Cada operación abre su propia transacción, la confirma solo si todos
//! los pasos terminan bien y la abandona (rollback) en cualquier `?`.
//! Cancelación y cambio de destino bloquean la fila de la reserva, así
//! que dos escrituras concurrentes sobre la misma reserva se serializan.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use validator::Validate;

use super::driver_matcher::DriverMatcher;
use super::fare_estimator::{GeoPoint, Tariff, STANDARD_TARIFF};
use crate::dto::{
    BookingDetail, BookingListQuery, BookingRequest, BookingResponse, CancelBookingRequest,
    CancelBookingResponse, FareInfo, PaginatedResponse, Pagination, StatusHistoryResponse,
};
use crate::models::{generate_id, Booking, BookingFilter, BookingStatus, Location};
use crate::repositories::{BookingRepository, BookingTransaction};
use crate::utils::errors::{bad_request_error, not_found_error, AppError, AppResult};
use crate::utils::validation::{page_offset, parse_status_filter};

/// Penalización fija al cancelar con conductor comprometido
pub const CANCELLATION_FEE: f64 = 50.0;

pub const SEARCHING_MESSAGE: &str = "Searching for nearby drivers...";

pub struct BookingService {
    repository: Arc<dyn BookingRepository>,
    matcher: Arc<dyn DriverMatcher>,
    tariff: Tariff,
}

impl BookingService {
    pub fn new(repository: Arc<dyn BookingRepository>, matcher: Arc<dyn DriverMatcher>) -> Self {
        Self {
            repository,
            matcher,
            tariff: STANDARD_TARIFF,
        }
    }

    /// Crear una reserva en `searching` con su tarifa y su primera
    /// entrada de historial
    pub async fn create_booking(&self, request: BookingRequest) -> AppResult<BookingResponse> {
        request.validate()?;
        let pickup = GeoPoint::new(
            request.pickup_location.latitude,
            request.pickup_location.longitude,
        )?;
        let dropoff = GeoPoint::new(
            request.dropoff_location.latitude,
            request.dropoff_location.longitude,
        )?;

        let mut tx = self.repository.begin().await?;

        if !tx.user_exists(&request.user_id).await? {
            return Err(not_found_error("User", &request.user_id));
        }
        if !tx
            .payment_method_belongs_to(&request.payment_method_id, &request.user_id)
            .await?
        {
            return Err(AppError::NotFound(format!(
                "Payment method with ID {} not found or does not belong to user {}",
                request.payment_method_id, request.user_id
            )));
        }

        let estimate = self.tariff.estimate(&pickup, &dropoff);
        let now = Utc::now();
        let booking = Booking {
            booking_id: generate_id("booking"),
            user_id: request.user_id,
            status: BookingStatus::Searching,
            pickup_latitude: Some(pickup.latitude()),
            pickup_longitude: Some(pickup.longitude()),
            pickup_address: request.pickup_location.address,
            dropoff_latitude: Some(dropoff.latitude()),
            dropoff_longitude: Some(dropoff.longitude()),
            dropoff_address: request.dropoff_location.address,
            vehicle_type: request.vehicle_type,
            payment_method_id: request.payment_method_id,
            estimated_fare_amount: Some(estimate.fare.total_amount),
            estimated_fare_currency: Some(estimate.fare.currency.clone()),
            estimated_distance: Some(estimate.distance_km),
            estimated_duration: Some(estimate.duration_minutes),
            driver_id: None,
            vehicle_id: None,
            actual_fare_amount: None,
            actual_fare_currency: None,
            cancellation_reason: None,
            cancellation_fee_amount: None,
            created_at: now,
            updated_at: now,
        };

        tx.insert_booking(&booking).await?;
        tx.append_status(&booking.booking_id, BookingStatus::Searching, now)
            .await?;
        tx.insert_fare(&booking.booking_id, &estimate.fare).await?;
        tx.commit().await?;

        info!(
            booking_id = %booking.booking_id,
            user_id = %booking.user_id,
            total = estimate.fare.total_amount,
            "booking created"
        );

        self.matcher.request_driver(&booking).await;

        Ok(BookingResponse {
            booking_id: booking.booking_id,
            status: booking.status,
            estimated_fare: Some(FareInfo::from_calculation(&estimate.fare)),
            message: Some(SEARCHING_MESSAGE.to_string()),
        })
    }

    pub async fn get_booking_detail(&self, booking_id: &str) -> AppResult<BookingDetail> {
        let mut tx = self.repository.begin().await?;
        let booking = tx
            .find_booking(booking_id)
            .await?
            .ok_or_else(|| not_found_error("Booking", booking_id))?;

        load_detail(tx.as_mut(), booking).await
    }

    /// Cancelar una reserva no terminal, liberando conductor y vehículo
    pub async fn cancel_booking(
        &self,
        booking_id: &str,
        request: CancelBookingRequest,
    ) -> AppResult<CancelBookingResponse> {
        request.validate()?;

        let mut tx = self.repository.begin().await?;
        let mut booking = tx
            .lock_booking(booking_id)
            .await?
            .ok_or_else(|| not_found_error("Booking", booking_id))?;

        let previous = booking.status;
        if !previous.can_transition_to(BookingStatus::Cancelled) {
            warn!(booking_id, status = %previous, "cancel rejected");
            return Err(AppError::InvalidState(format!(
                "Cannot cancel a booking with status: {}",
                previous
            )));
        }

        let mut message = "Booking cancelled successfully.".to_string();
        let cancellation_fee = previous.charges_cancellation_fee().then(|| {
            let currency = booking
                .estimated_fare_currency
                .clone()
                .unwrap_or_else(|| self.tariff.currency.to_string());
            FareInfo::new(currency, CANCELLATION_FEE)
        });
        if let Some(fee) = &cancellation_fee {
            message.push_str(&format!(
                " A cancellation fee of {:.2} {} may apply.",
                fee.amount, fee.currency
            ));
            booking.cancellation_fee_amount = Some(fee.amount);
        }

        let now = Utc::now();
        booking.status = BookingStatus::Cancelled;
        booking.cancellation_reason = request.reason;
        booking.updated_at = now;

        tx.save_cancellation(&booking).await?;
        tx.append_status(booking_id, BookingStatus::Cancelled, now)
            .await?;

        if let Some(driver_id) = &booking.driver_id {
            let released = tx.release_driver(driver_id).await?;
            debug!(booking_id, driver_id = %driver_id, released, "driver release");
        }
        if let Some(vehicle_id) = &booking.vehicle_id {
            let released = tx.release_vehicle(vehicle_id).await?;
            debug!(booking_id, vehicle_id = %vehicle_id, released, "vehicle release");
        }

        tx.commit().await?;

        info!(
            booking_id,
            from = %previous,
            fee = cancellation_fee.is_some(),
            "booking cancelled"
        );

        Ok(CancelBookingResponse {
            booking_id: booking.booking_id,
            status: BookingStatus::Cancelled,
            message,
            cancellation_fee,
        })
    }

    /// Cambiar el destino de un viaje en curso y recalcular la tarifa
    /// desde la recogida original
    pub async fn update_destination(
        &self,
        booking_id: &str,
        new_dropoff: Location,
    ) -> AppResult<BookingDetail> {
        new_dropoff.validate()?;
        let dropoff = GeoPoint::new(new_dropoff.latitude, new_dropoff.longitude)?;

        let mut tx = self.repository.begin().await?;
        let mut booking = tx
            .lock_booking(booking_id)
            .await?
            .ok_or_else(|| not_found_error("Booking", booking_id))?;

        if !booking.status.allows_destination_change() {
            return Err(AppError::InvalidState(format!(
                "Destination can only be updated when status is one of: {}",
                destination_change_statuses()
            )));
        }

        let (latitude, longitude) = booking
            .pickup_coordinates()
            .ok_or_else(|| bad_request_error("Booking is missing pickup location coordinates."))?;
        let pickup = GeoPoint::new(latitude, longitude)?;
        let estimate = self.tariff.estimate(&pickup, &dropoff);

        booking.dropoff_latitude = Some(dropoff.latitude());
        booking.dropoff_longitude = Some(dropoff.longitude());
        booking.dropoff_address = new_dropoff.address;
        booking.estimated_fare_amount = Some(estimate.fare.total_amount);
        booking.estimated_distance = Some(estimate.distance_km);
        booking.estimated_duration = Some(estimate.duration_minutes);
        booking.updated_at = Utc::now();

        tx.save_destination(&booking).await?;
        tx.overwrite_fare(booking_id, &estimate.fare).await?;

        let detail = load_detail(tx.as_mut(), booking).await?;
        tx.commit().await?;

        info!(
            booking_id,
            distance_km = estimate.distance_km,
            total = estimate.fare.total_amount,
            "destination updated"
        );

        Ok(detail)
    }

    /// Reservas de un usuario, más recientes primero
    pub async fn list_bookings(
        &self,
        query: BookingListQuery,
    ) -> AppResult<PaginatedResponse<BookingDetail>> {
        query.validate()?;
        let allowed: Vec<&str> = BookingStatus::ALL.iter().map(|s| s.as_str()).collect();
        let status = parse_status_filter::<BookingStatus>(query.status.as_deref(), &allowed)?;

        let filter = BookingFilter {
            user_id: query.user_id,
            status,
            limit: query.limit,
            offset: page_offset(query.page, query.limit),
        };

        let mut tx = self.repository.begin().await?;
        let (bookings, total) = tx.list_bookings(&filter).await?;

        let mut data = Vec::with_capacity(bookings.len());
        for booking in bookings {
            data.push(load_detail(tx.as_mut(), booking).await?);
        }

        Ok(PaginatedResponse::new(
            data,
            Pagination::new(query.page, query.limit, total),
        ))
    }

    /// Historial de transiciones en orden cronológico
    pub async fn status_history(&self, booking_id: &str) -> AppResult<Vec<StatusHistoryResponse>> {
        let mut tx = self.repository.begin().await?;
        if tx.find_booking(booking_id).await?.is_none() {
            return Err(not_found_error("Booking", booking_id));
        }

        let entries = tx.status_history(booking_id).await?;
        Ok(entries.into_iter().map(StatusHistoryResponse::from).collect())
    }
}

fn destination_change_statuses() -> String {
    BookingStatus::ALL
        .iter()
        .filter(|s| s.allows_destination_change())
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Completar una reserva con su tarifa y, si los hay, conductor y vehículo
async fn load_detail(
    tx: &mut dyn BookingTransaction,
    booking: Booking,
) -> AppResult<BookingDetail> {
    let fare = tx.find_fare(&booking.booking_id).await?;

    let driver = match &booking.driver_id {
        Some(driver_id) => tx.find_driver(driver_id).await?,
        None => None,
    };
    let vehicle = match &booking.vehicle_id {
        Some(vehicle_id) => tx.find_vehicle_summary(vehicle_id).await?,
        None => None,
    };

    Ok(BookingDetail::new(booking, fare, driver, vehicle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Partner, Vehicle};
    use crate::repositories::{MemoryStore, PartnerRepository, VehicleRepository};
    use crate::services::driver_matcher::LoggingDriverMatcher;

    async fn setup() -> (MemoryStore, BookingService) {
        let store = MemoryStore::new();
        store.insert_user("user_1").await;
        store.insert_payment_method("pm_1", "user_1").await;
        store.insert_payment_method("pm_2", "user_2").await;

        let service = BookingService::new(Arc::new(store.clone()), Arc::new(LoggingDriverMatcher));
        (store, service)
    }

    fn request(user_id: &str, payment_method_id: &str) -> BookingRequest {
        BookingRequest {
            user_id: user_id.to_string(),
            pickup_location: Location {
                latitude: 12.9716,
                longitude: 77.5946,
                address: Some("MG Road".to_string()),
            },
            dropoff_location: Location {
                latitude: 12.9352,
                longitude: 77.6245,
                address: Some("Koramangala".to_string()),
            },
            vehicle_type: "sedan".to_string(),
            payment_method_id: payment_method_id.to_string(),
        }
    }

    async fn confirmed_booking(store: &MemoryStore, service: &BookingService) -> String {
        let partner = Partner::new(
            "Metro Cabs".to_string(),
            "+91 9000000001".to_string(),
            "ops@metrocabs.in".to_string(),
            None,
        );
        PartnerRepository::create(store, &partner).await.unwrap();
        let vehicle = Vehicle::new(
            partner.partner_id.clone(),
            "sedan".to_string(),
            "KA05MX2211".to_string(),
            Some("Maruti".to_string()),
            Some("Dzire".to_string()),
            Some("white".to_string()),
        );
        VehicleRepository::create(store, &vehicle).await.unwrap();
        store
            .insert_driver(crate::models::DriverSummary {
                driver_id: "drv_1".to_string(),
                first_name: Some("Kiran".to_string()),
                last_name: Some("Kumar".to_string()),
                phone: Some("+91 9111111111".to_string()),
                average_rating: Some(4.8),
            })
            .await;

        let created = service.create_booking(request("user_1", "pm_1")).await.unwrap();
        store
            .assign_ride(&created.booking_id, "drv_1", &vehicle.vehicle_id)
            .await
            .unwrap();
        created.booking_id
    }

    #[tokio::test]
    async fn test_create_booking_persists_fare_and_history() {
        let (_store, service) = setup().await;

        let created = service.create_booking(request("user_1", "pm_1")).await.unwrap();
        assert_eq!(created.status, BookingStatus::Searching);
        assert_eq!(created.message.as_deref(), Some(SEARCHING_MESSAGE));
        assert_eq!(created.estimated_fare.as_ref().unwrap().amount, 136.73);

        let detail = service.get_booking_detail(&created.booking_id).await.unwrap();
        let fare = detail.estimated_fare.unwrap();
        assert_eq!(fare.amount, 136.73);
        assert_eq!(fare.breakdown.unwrap().distance_charge, 62.22);
        assert_eq!(detail.eta, None);

        let history = service.status_history(&created.booking_id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, BookingStatus::Searching);
    }

    #[tokio::test]
    async fn test_unknown_user_writes_nothing() {
        let (_store, service) = setup().await;

        let err = service.create_booking(request("ghost", "pm_1")).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let page = service
            .list_bookings(BookingListQuery {
                user_id: "ghost".to_string(),
                status: None,
                page: 1,
                limit: 10,
            })
            .await
            .unwrap();
        assert_eq!(page.pagination.total_items, 0);
    }

    #[tokio::test]
    async fn test_payment_method_must_belong_to_user() {
        let (_store, service) = setup().await;

        let err = service.create_booking(request("user_1", "pm_2")).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Not found: Payment method with ID pm_2 not found or does not belong to user user_1"
        );
    }

    #[tokio::test]
    async fn test_cancel_while_searching_has_no_fee() {
        let (_store, service) = setup().await;
        let created = service.create_booking(request("user_1", "pm_1")).await.unwrap();

        let response = service
            .cancel_booking(
                &created.booking_id,
                CancelBookingRequest {
                    reason: Some("changed plans".to_string()),
                },
            )
            .await
            .unwrap();

        assert_eq!(response.status, BookingStatus::Cancelled);
        assert!(response.cancellation_fee.is_none());
        assert_eq!(response.message, "Booking cancelled successfully.");
    }

    #[tokio::test]
    async fn test_cancel_confirmed_charges_fee_and_releases_ride() {
        let (store, service) = setup().await;
        let booking_id = confirmed_booking(&store, &service).await;
        assert_eq!(store.driver_status("drv_1").await.as_deref(), Some("on_ride"));

        let detail = service.get_booking_detail(&booking_id).await.unwrap();
        assert_eq!(detail.eta, Some(12));
        assert_eq!(detail.driver_info.as_ref().unwrap().name, "Kiran Kumar");
        let vehicle_id = detail.vehicle_info.as_ref().unwrap().vehicle_id.clone();

        let response = service
            .cancel_booking(&booking_id, CancelBookingRequest::default())
            .await
            .unwrap();

        let fee = response.cancellation_fee.unwrap();
        assert_eq!(fee.amount, CANCELLATION_FEE);
        assert_eq!(fee.currency, "INR");
        assert_eq!(
            response.message,
            "Booking cancelled successfully. A cancellation fee of 50.00 INR may apply."
        );

        assert_eq!(store.driver_status("drv_1").await.as_deref(), Some("available"));
        let vehicle = VehicleRepository::find_by_id(&store, &vehicle_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(vehicle.status, crate::models::VehicleStatus::Available);

        let history = service.status_history(&booking_id).await.unwrap();
        let statuses: Vec<BookingStatus> = history.iter().map(|h| h.status).collect();
        assert_eq!(
            statuses,
            vec![
                BookingStatus::Searching,
                BookingStatus::Confirmed,
                BookingStatus::Cancelled
            ]
        );
    }

    #[tokio::test]
    async fn test_terminal_booking_cannot_be_cancelled() {
        let (store, service) = setup().await;
        let created = service.create_booking(request("user_1", "pm_1")).await.unwrap();
        store
            .set_booking_status(&created.booking_id, BookingStatus::Completed)
            .await
            .unwrap();

        let err = service
            .cancel_booking(&created.booking_id, CancelBookingRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));

        let detail = service.get_booking_detail(&created.booking_id).await.unwrap();
        assert_eq!(detail.status, BookingStatus::Completed);
        assert_eq!(service.status_history(&created.booking_id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_destination_change_requires_active_ride() {
        let (store, service) = setup().await;
        let created = service.create_booking(request("user_1", "pm_1")).await.unwrap();
        let new_dropoff = Location {
            latitude: 13.0358,
            longitude: 77.5970,
            address: Some("Hebbal".to_string()),
        };

        let err = service
            .update_destination(&created.booking_id, new_dropoff.clone())
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid state: Destination can only be updated when status is one of: confirmed, driver_arrived, ongoing"
        );

        store
            .set_booking_status(&created.booking_id, BookingStatus::Ongoing)
            .await
            .unwrap();
        let history_before = service.status_history(&created.booking_id).await.unwrap();
        let detail = service
            .update_destination(&created.booking_id, new_dropoff)
            .await
            .unwrap();

        let expected = STANDARD_TARIFF.estimate(
            &GeoPoint::new(12.9716, 77.5946).unwrap(),
            &GeoPoint::new(13.0358, 77.5970).unwrap(),
        );
        assert_eq!(detail.dropoff_location.address.as_deref(), Some("Hebbal"));
        let fare = detail.estimated_fare.unwrap();
        assert_eq!(fare.amount, expected.fare.total_amount);
        assert_eq!(fare.breakdown.unwrap().time_charge, expected.fare.time_charge);

        // La fila de tarifa se sobrescribe y el historial no cambia
        let mut tx = store.begin().await.unwrap();
        let stored = tx.find_fare(&created.booking_id).await.unwrap().unwrap();
        assert_eq!(stored.total_amount, expected.fare.total_amount);
        assert_eq!(stored.distance_charge, expected.fare.distance_charge);
        drop(tx);
        let history_after = service.status_history(&created.booking_id).await.unwrap();
        assert_eq!(history_after.len(), history_before.len());
    }

    #[tokio::test]
    async fn test_destination_change_rejected_in_sink_states() {
        let (store, service) = setup().await;
        let new_dropoff = Location {
            latitude: 13.0358,
            longitude: 77.5970,
            address: Some("Hebbal".to_string()),
        };

        for status in [BookingStatus::Completed, BookingStatus::Cancelled] {
            let created = service.create_booking(request("user_1", "pm_1")).await.unwrap();
            store
                .set_booking_status(&created.booking_id, status)
                .await
                .unwrap();

            let err = service
                .update_destination(&created.booking_id, new_dropoff.clone())
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::InvalidState(_)), "{status}: {err}");

            let detail = service.get_booking_detail(&created.booking_id).await.unwrap();
            assert_eq!(detail.dropoff_location.address.as_deref(), Some("Koramangala"));
            assert_eq!(detail.estimated_fare.unwrap().amount, 136.73);
        }
    }

    #[tokio::test]
    async fn test_destination_change_needs_pickup_coordinates() {
        let (store, service) = setup().await;
        let created = service.create_booking(request("user_1", "pm_1")).await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let mut booking = tx.find_booking(&created.booking_id).await.unwrap().unwrap();
        booking.booking_id = "booking_no_pickup".to_string();
        booking.pickup_latitude = None;
        booking.pickup_longitude = None;
        booking.status = BookingStatus::Confirmed;
        tx.insert_booking(&booking).await.unwrap();
        tx.commit().await.unwrap();

        let err = service
            .update_destination(
                "booking_no_pickup",
                Location {
                    latitude: 13.0358,
                    longitude: 77.5970,
                    address: None,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Bad request: Booking is missing pickup location coordinates."
        );
    }

    #[tokio::test]
    async fn test_cancelled_booking_cannot_be_cancelled_again() {
        let (_store, service) = setup().await;
        let created = service.create_booking(request("user_1", "pm_1")).await.unwrap();
        service
            .cancel_booking(&created.booking_id, CancelBookingRequest::default())
            .await
            .unwrap();

        let err = service
            .cancel_booking(&created.booking_id, CancelBookingRequest::default())
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid state: Cannot cancel a booking with status: cancelled"
        );
        assert_eq!(service.status_history(&created.booking_id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_cancel_after_driver_arrived_charges_fee() {
        let (store, service) = setup().await;
        let booking_id = confirmed_booking(&store, &service).await;
        store
            .set_booking_status(&booking_id, BookingStatus::DriverArrived)
            .await
            .unwrap();

        let response = service
            .cancel_booking(&booking_id, CancelBookingRequest::default())
            .await
            .unwrap();

        let fee = response.cancellation_fee.unwrap();
        assert_eq!(fee.amount, CANCELLATION_FEE);
        assert_eq!(fee.currency, "INR");
        assert_eq!(store.driver_status("drv_1").await.as_deref(), Some("available"));
    }

    #[tokio::test]
    async fn test_unknown_booking_is_not_found() {
        let (_store, service) = setup().await;

        assert!(matches!(
            service.get_booking_detail("booking_missing").await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            service
                .cancel_booking("booking_missing", CancelBookingRequest::default())
                .await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            service.status_history("booking_missing").await,
            Err(AppError::NotFound(_))
        ));
    }
}
