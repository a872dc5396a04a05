//! Almacén en memoria
//!
//! Implementa los tres repositorios sobre un único `MemoryData` protegido
//! por un mutex asíncrono. Las transacciones de reservas toman el lock en
//! exclusiva y trabajan sobre una copia; `commit` la publica y soltarla
//! sin commit la descarta.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{BookingRepository, BookingTransaction, PartnerRepository, VehicleRepository};
use crate::models::{
    Booking, BookingFilter, BookingStatus, DriverSummary, FareCalculation, Partner,
    PartnerFilter, PartnerPatch, StatusHistoryEntry, Vehicle, VehiclePatch, VehicleStatus,
    VehicleSummary,
};
use crate::utils::errors::{conflict_error, missing_fare_error, not_found_error, AppResult};

const DRIVER_AVAILABLE: &str = "available";
const DRIVER_ON_RIDE: &str = "on_ride";

#[derive(Debug, Clone)]
struct StoredDriver {
    summary: DriverSummary,
    partner_id: Option<String>,
    status: String,
}

/// Tablas en memoria. Los `Vec` conservan el orden de inserción.
#[derive(Debug, Clone, Default)]
struct MemoryData {
    partners: Vec<Partner>,
    vehicles: Vec<Vehicle>,
    users: HashSet<String>,
    /// payment_method_id -> user_id
    payment_methods: HashMap<String, String>,
    drivers: HashMap<String, StoredDriver>,
    bookings: Vec<Booking>,
    fares: HashMap<String, FareCalculation>,
    history: Vec<StatusHistoryEntry>,
}

impl MemoryData {
    fn booking_mut(&mut self, booking_id: &str) -> Option<&mut Booking> {
        self.bookings.iter_mut().find(|b| b.booking_id == booking_id)
    }

    fn vehicle_mut(&mut self, vehicle_id: &str) -> Option<&mut Vehicle> {
        self.vehicles.iter_mut().find(|v| v.vehicle_id == vehicle_id)
    }

    fn push_history(&mut self, booking_id: &str, status: BookingStatus, at: DateTime<Utc>) {
        let last = self
            .history
            .iter()
            .filter(|h| h.booking_id == booking_id)
            .map(|h| h.changed_at)
            .max();
        let changed_at = last.map_or(at, |last| last.max(at));

        self.history.push(StatusHistoryEntry {
            booking_id: booking_id.to_string(),
            status,
            changed_at,
        });
    }
}

/// Backend `STORE_BACKEND=memory`: sin base de datos, mismo contrato
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    data: Arc<Mutex<MemoryData>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_user(&self, user_id: &str) {
        self.data.lock().await.users.insert(user_id.to_string());
    }

    pub async fn insert_payment_method(&self, payment_method_id: &str, user_id: &str) {
        self.data
            .lock()
            .await
            .payment_methods
            .insert(payment_method_id.to_string(), user_id.to_string());
    }

    pub async fn insert_driver(&self, driver: DriverSummary) {
        self.store_driver(driver, None).await;
    }

    /// Conductor vinculado a un partner: se borra junto con él
    pub async fn insert_partner_driver(&self, partner_id: &str, driver: DriverSummary) {
        self.store_driver(driver, Some(partner_id.to_string())).await;
    }

    async fn store_driver(&self, driver: DriverSummary, partner_id: Option<String>) {
        let mut data = self.data.lock().await;
        data.drivers.insert(
            driver.driver_id.clone(),
            StoredDriver {
                summary: driver,
                partner_id,
                status: DRIVER_AVAILABLE.to_string(),
            },
        );
    }

    pub async fn driver_status(&self, driver_id: &str) -> Option<String> {
        let data = self.data.lock().await;
        data.drivers.get(driver_id).map(|d| d.status.clone())
    }

    /// Asigna conductor y vehículo a una reserva en búsqueda: la reserva
    /// pasa a `confirmed` y ambos quedan `on_ride`.
    pub async fn assign_ride(
        &self,
        booking_id: &str,
        driver_id: &str,
        vehicle_id: &str,
    ) -> AppResult<()> {
        let mut data = self.data.lock().await;

        if !data.drivers.contains_key(driver_id) {
            return Err(not_found_error("Driver", driver_id));
        }
        let vehicle = data
            .vehicle_mut(vehicle_id)
            .ok_or_else(|| not_found_error("Vehicle", vehicle_id))?;
        vehicle.status = VehicleStatus::OnRide;

        let now = Utc::now();
        let booking = data
            .booking_mut(booking_id)
            .ok_or_else(|| not_found_error("Booking", booking_id))?;
        booking.driver_id = Some(driver_id.to_string());
        booking.vehicle_id = Some(vehicle_id.to_string());
        booking.status = BookingStatus::Confirmed;
        booking.updated_at = now;

        if let Some(driver) = data.drivers.get_mut(driver_id) {
            driver.status = DRIVER_ON_RIDE.to_string();
        }
        data.push_history(booking_id, BookingStatus::Confirmed, now);

        Ok(())
    }

    /// Mueve una reserva a `status` registrando la transición en el historial
    pub async fn set_booking_status(&self, booking_id: &str, status: BookingStatus) -> AppResult<()> {
        let mut data = self.data.lock().await;
        let now = Utc::now();

        let booking = data
            .booking_mut(booking_id)
            .ok_or_else(|| not_found_error("Booking", booking_id))?;
        booking.status = status;
        booking.updated_at = now;
        data.push_history(booking_id, status, now);

        Ok(())
    }
}

#[async_trait]
impl PartnerRepository for MemoryStore {
    async fn list(&self, filter: &PartnerFilter) -> AppResult<(Vec<Partner>, i64)> {
        let data = self.data.lock().await;
        let matching: Vec<&Partner> = data
            .partners
            .iter()
            .rev()
            .filter(|p| filter.matches(p))
            .collect();

        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(filter.offset.max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .cloned()
            .collect();

        Ok((page, total))
    }

    async fn find_by_id(&self, partner_id: &str) -> AppResult<Option<Partner>> {
        let data = self.data.lock().await;
        Ok(data.partners.iter().find(|p| p.partner_id == partner_id).cloned())
    }

    async fn exists(&self, partner_id: &str) -> AppResult<bool> {
        let data = self.data.lock().await;
        Ok(data.partners.iter().any(|p| p.partner_id == partner_id))
    }

    async fn contact_in_use(
        &self,
        email: Option<&str>,
        phone: Option<&str>,
        excluding: Option<&str>,
    ) -> AppResult<bool> {
        let data = self.data.lock().await;
        Ok(data.partners.iter().any(|p| {
            Some(p.partner_id.as_str()) != excluding
                && (email == Some(p.email.as_str()) || phone == Some(p.phone.as_str()))
        }))
    }

    async fn create(&self, partner: &Partner) -> AppResult<()> {
        let mut data = self.data.lock().await;
        let duplicate = data
            .partners
            .iter()
            .any(|p| p.email == partner.email || p.phone == partner.phone);
        if duplicate {
            return Err(conflict_error(
                "A partner with this email or phone number already exists.",
            ));
        }

        data.partners.push(partner.clone());
        Ok(())
    }

    async fn update(&self, partner_id: &str, patch: &PartnerPatch) -> AppResult<()> {
        let mut data = self.data.lock().await;
        let clash = data.partners.iter().any(|p| {
            p.partner_id != partner_id
                && (patch.email.as_deref() == Some(p.email.as_str())
                    || patch.phone.as_deref() == Some(p.phone.as_str()))
        });
        if clash {
            return Err(conflict_error(
                "Update failed: The new email or phone number is already in use by another partner.",
            ));
        }

        if let Some(partner) = data.partners.iter_mut().find(|p| p.partner_id == partner_id) {
            patch.apply_to(partner);
            partner.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn delete(&self, partner_id: &str) -> AppResult<bool> {
        let mut data = self.data.lock().await;
        let before = data.partners.len();
        data.partners.retain(|p| p.partner_id != partner_id);
        if data.partners.len() == before {
            return Ok(false);
        }

        // Cascada: flota y conductores desaparecen con su partner y las
        // reservas pierden la referencia (SET NULL)
        let removed_vehicles: HashSet<String> = data
            .vehicles
            .iter()
            .filter(|v| v.partner_id == partner_id)
            .map(|v| v.vehicle_id.clone())
            .collect();
        data.vehicles.retain(|v| v.partner_id != partner_id);

        let removed_drivers: HashSet<String> = data
            .drivers
            .iter()
            .filter(|(_, d)| d.partner_id.as_deref() == Some(partner_id))
            .map(|(id, _)| id.clone())
            .collect();
        data.drivers
            .retain(|_, d| d.partner_id.as_deref() != Some(partner_id));

        for booking in data.bookings.iter_mut() {
            if booking
                .vehicle_id
                .as_ref()
                .is_some_and(|id| removed_vehicles.contains(id))
            {
                booking.vehicle_id = None;
            }
            if booking
                .driver_id
                .as_ref()
                .is_some_and(|id| removed_drivers.contains(id))
            {
                booking.driver_id = None;
            }
        }
        Ok(true)
    }
}

#[async_trait]
impl VehicleRepository for MemoryStore {
    async fn list_by_partner(
        &self,
        partner_id: &str,
        status: Option<VehicleStatus>,
    ) -> AppResult<Vec<Vehicle>> {
        let data = self.data.lock().await;
        Ok(data
            .vehicles
            .iter()
            .rev()
            .filter(|v| v.partner_id == partner_id)
            .filter(|v| status.map_or(true, |s| v.status == s))
            .cloned()
            .collect())
    }

    async fn list_by_partners(&self, partner_ids: &[String]) -> AppResult<Vec<Vehicle>> {
        let data = self.data.lock().await;
        Ok(data
            .vehicles
            .iter()
            .rev()
            .filter(|v| partner_ids.contains(&v.partner_id))
            .cloned()
            .collect())
    }

    async fn find_for_partner(
        &self,
        partner_id: &str,
        vehicle_id: &str,
    ) -> AppResult<Option<Vehicle>> {
        let data = self.data.lock().await;
        Ok(data
            .vehicles
            .iter()
            .find(|v| v.vehicle_id == vehicle_id && v.partner_id == partner_id)
            .cloned())
    }

    async fn find_by_id(&self, vehicle_id: &str) -> AppResult<Option<Vehicle>> {
        let data = self.data.lock().await;
        Ok(data.vehicles.iter().find(|v| v.vehicle_id == vehicle_id).cloned())
    }

    async fn registration_in_use(
        &self,
        registration: &str,
        excluding: Option<&str>,
    ) -> AppResult<bool> {
        let data = self.data.lock().await;
        Ok(data.vehicles.iter().any(|v| {
            v.registration == registration && Some(v.vehicle_id.as_str()) != excluding
        }))
    }

    async fn create(&self, vehicle: &Vehicle) -> AppResult<()> {
        let mut data = self.data.lock().await;
        if !data.partners.iter().any(|p| p.partner_id == vehicle.partner_id) {
            return Err(not_found_error("Cab partner", &vehicle.partner_id));
        }
        if data.vehicles.iter().any(|v| v.registration == vehicle.registration) {
            return Err(conflict_error(format!(
                "Vehicle with registration '{}' already exists.",
                vehicle.registration
            )));
        }

        data.vehicles.push(vehicle.clone());
        Ok(())
    }

    async fn update(&self, vehicle_id: &str, patch: &VehiclePatch) -> AppResult<()> {
        let mut data = self.data.lock().await;
        if let Some(registration) = &patch.registration {
            let clash = data
                .vehicles
                .iter()
                .any(|v| v.vehicle_id != vehicle_id && &v.registration == registration);
            if clash {
                return Err(conflict_error(format!(
                    "Update failed: Vehicle with registration '{}' already exists.",
                    registration
                )));
            }
        }

        if let Some(vehicle) = data.vehicle_mut(vehicle_id) {
            patch.apply_to(vehicle);
            vehicle.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn delete(&self, vehicle_id: &str) -> AppResult<bool> {
        let mut data = self.data.lock().await;
        let before = data.vehicles.len();
        data.vehicles.retain(|v| v.vehicle_id != vehicle_id);

        for booking in data.bookings.iter_mut() {
            if booking.vehicle_id.as_deref() == Some(vehicle_id) {
                booking.vehicle_id = None;
            }
        }
        Ok(data.vehicles.len() != before)
    }
}

#[async_trait]
impl BookingRepository for MemoryStore {
    async fn begin(&self) -> AppResult<Box<dyn BookingTransaction>> {
        let guard = self.data.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(MemoryTransaction { guard, staged }))
    }
}

/// Transacción en memoria: bloquea el almacén completo mientras vive
pub struct MemoryTransaction {
    guard: OwnedMutexGuard<MemoryData>,
    staged: MemoryData,
}

#[async_trait]
impl BookingTransaction for MemoryTransaction {
    async fn user_exists(&mut self, user_id: &str) -> AppResult<bool> {
        Ok(self.staged.users.contains(user_id))
    }

    async fn payment_method_belongs_to(
        &mut self,
        payment_method_id: &str,
        user_id: &str,
    ) -> AppResult<bool> {
        Ok(self
            .staged
            .payment_methods
            .get(payment_method_id)
            .map_or(false, |owner| owner == user_id))
    }

    async fn insert_booking(&mut self, booking: &Booking) -> AppResult<()> {
        if self.staged.bookings.iter().any(|b| b.booking_id == booking.booking_id) {
            return Err(conflict_error(format!("Booking {} already exists", booking.booking_id)));
        }
        self.staged.bookings.push(booking.clone());
        Ok(())
    }

    async fn insert_fare(&mut self, booking_id: &str, fare: &FareCalculation) -> AppResult<()> {
        if self.staged.fares.contains_key(booking_id) {
            return Err(conflict_error(format!(
                "Fare for booking {} already exists",
                booking_id
            )));
        }
        self.staged.fares.insert(booking_id.to_string(), fare.clone());
        Ok(())
    }

    async fn overwrite_fare(&mut self, booking_id: &str, fare: &FareCalculation) -> AppResult<()> {
        let existing = self
            .staged
            .fares
            .get_mut(booking_id)
            .ok_or_else(|| missing_fare_error(booking_id))?;
        let other_charges = existing.other_charges;
        *existing = FareCalculation {
            other_charges,
            currency: existing.currency.clone(),
            ..fare.clone()
        };
        Ok(())
    }

    async fn append_status(
        &mut self,
        booking_id: &str,
        status: BookingStatus,
        at: DateTime<Utc>,
    ) -> AppResult<()> {
        self.staged.push_history(booking_id, status, at);
        Ok(())
    }

    async fn find_booking(&mut self, booking_id: &str) -> AppResult<Option<Booking>> {
        Ok(self
            .staged
            .bookings
            .iter()
            .find(|b| b.booking_id == booking_id)
            .cloned())
    }

    async fn lock_booking(&mut self, booking_id: &str) -> AppResult<Option<Booking>> {
        // El guard ya serializa todas las transacciones
        self.find_booking(booking_id).await
    }

    async fn find_fare(&mut self, booking_id: &str) -> AppResult<Option<FareCalculation>> {
        Ok(self.staged.fares.get(booking_id).cloned())
    }

    async fn find_driver(&mut self, driver_id: &str) -> AppResult<Option<DriverSummary>> {
        Ok(self.staged.drivers.get(driver_id).map(|d| d.summary.clone()))
    }

    async fn find_vehicle_summary(
        &mut self,
        vehicle_id: &str,
    ) -> AppResult<Option<VehicleSummary>> {
        Ok(self
            .staged
            .vehicles
            .iter()
            .find(|v| v.vehicle_id == vehicle_id)
            .map(|v| VehicleSummary {
                vehicle_id: v.vehicle_id.clone(),
                make: v.make.clone(),
                model: v.model.clone(),
                color: v.color.clone(),
                registration: v.registration.clone(),
            }))
    }

    async fn save_cancellation(&mut self, booking: &Booking) -> AppResult<()> {
        if let Some(stored) = self.staged.booking_mut(&booking.booking_id) {
            stored.status = booking.status;
            stored.cancellation_reason = booking.cancellation_reason.clone();
            stored.cancellation_fee_amount = booking.cancellation_fee_amount;
            stored.updated_at = booking.updated_at;
        }
        Ok(())
    }

    async fn save_destination(&mut self, booking: &Booking) -> AppResult<()> {
        if let Some(stored) = self.staged.booking_mut(&booking.booking_id) {
            stored.dropoff_latitude = booking.dropoff_latitude;
            stored.dropoff_longitude = booking.dropoff_longitude;
            stored.dropoff_address = booking.dropoff_address.clone();
            stored.estimated_fare_amount = booking.estimated_fare_amount;
            stored.estimated_distance = booking.estimated_distance;
            stored.estimated_duration = booking.estimated_duration;
            stored.updated_at = booking.updated_at;
        }
        Ok(())
    }

    async fn release_driver(&mut self, driver_id: &str) -> AppResult<bool> {
        match self.staged.drivers.get_mut(driver_id) {
            Some(driver) if driver.status == DRIVER_ON_RIDE => {
                driver.status = DRIVER_AVAILABLE.to_string();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release_vehicle(&mut self, vehicle_id: &str) -> AppResult<bool> {
        match self.staged.vehicle_mut(vehicle_id) {
            Some(vehicle) if vehicle.status == VehicleStatus::OnRide => {
                vehicle.status = VehicleStatus::Available;
                vehicle.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_bookings(&mut self, filter: &BookingFilter) -> AppResult<(Vec<Booking>, i64)> {
        let matching: Vec<&Booking> = self
            .staged
            .bookings
            .iter()
            .rev()
            .filter(|b| b.user_id == filter.user_id)
            .filter(|b| filter.status.map_or(true, |s| b.status == s))
            .collect();

        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(filter.offset.max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .cloned()
            .collect();

        Ok((page, total))
    }

    async fn status_history(&mut self, booking_id: &str) -> AppResult<Vec<StatusHistoryEntry>> {
        let mut entries: Vec<StatusHistoryEntry> = self
            .staged
            .history
            .iter()
            .filter(|h| h.booking_id == booking_id)
            .cloned()
            .collect();
        entries.sort_by_key(|h| h.changed_at);
        Ok(entries)
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let MemoryTransaction { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn partner(email: &str, phone: &str, address: &str) -> Partner {
        Partner::new(
            "Metro Cabs".to_string(),
            phone.to_string(),
            email.to_string(),
            Some(address.to_string()),
        )
    }

    #[tokio::test]
    async fn test_delete_partner_cascades_to_vehicles() {
        let store = MemoryStore::new();
        let p = partner("a@metro.in", "+91 1", "Indiranagar, Bengaluru");
        PartnerRepository::create(&store, &p).await.unwrap();

        let v = Vehicle::new(
            p.partner_id.clone(),
            "sedan".to_string(),
            "KA01AA0001".to_string(),
            None,
            None,
            None,
        );
        VehicleRepository::create(&store, &v).await.unwrap();

        assert!(PartnerRepository::delete(&store, &p.partner_id).await.unwrap());
        assert!(VehicleRepository::find_by_id(&store, &v.vehicle_id)
            .await
            .unwrap()
            .is_none());
        assert!(!PartnerRepository::delete(&store, &p.partner_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_unique_contact_and_registration() {
        let store = MemoryStore::new();
        let p = partner("a@metro.in", "+91 1", "Koramangala");
        PartnerRepository::create(&store, &p).await.unwrap();

        let dup = partner("a@metro.in", "+91 2", "Koramangala");
        assert!(PartnerRepository::create(&store, &dup).await.is_err());
        assert!(store
            .contact_in_use(None, Some("+91 1"), None)
            .await
            .unwrap());
        assert!(!store
            .contact_in_use(None, Some("+91 1"), Some(&p.partner_id))
            .await
            .unwrap());

        let v = Vehicle::new(
            p.partner_id.clone(),
            "suv".to_string(),
            "KA01AA0002".to_string(),
            None,
            None,
            None,
        );
        VehicleRepository::create(&store, &v).await.unwrap();
        assert!(store.registration_in_use("KA01AA0002", None).await.unwrap());
        assert!(!store
            .registration_in_use("KA01AA0002", Some(&v.vehicle_id))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_uncommitted_transaction_rolls_back() {
        let store = MemoryStore::new();
        store.insert_user("user_1").await;

        {
            let mut tx = store.begin().await.unwrap();
            tx.append_status("booking_x", BookingStatus::Searching, Utc::now())
                .await
                .unwrap();
            assert_eq!(tx.status_history("booking_x").await.unwrap().len(), 1);
        }

        let mut tx = store.begin().await.unwrap();
        assert!(tx.status_history("booking_x").await.unwrap().is_empty());
        assert!(tx.user_exists("user_1").await.unwrap());
    }

    #[tokio::test]
    async fn test_history_timestamps_never_go_backwards() {
        let store = MemoryStore::new();
        let later = Utc::now();
        let earlier = later - chrono::Duration::seconds(30);

        let mut tx = store.begin().await.unwrap();
        tx.append_status("booking_y", BookingStatus::Searching, later)
            .await
            .unwrap();
        tx.append_status("booking_y", BookingStatus::Cancelled, earlier)
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let history = tx.status_history("booking_y").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].status, BookingStatus::Cancelled);
        assert!(history[1].changed_at >= history[0].changed_at);
    }

    #[tokio::test]
    async fn test_overwrite_without_fare_row_fails() {
        let store = MemoryStore::new();
        let fare = FareCalculation {
            base_fare: 50.0,
            distance_charge: 62.22,
            time_charge: 18.0,
            surge_multiplier: 1.0,
            tax_amount: 6.51,
            other_charges: None,
            total_amount: 136.73,
            currency: "INR".to_string(),
        };

        let mut tx = store.begin().await.unwrap();
        let err = tx.overwrite_fare("booking_z", &fare).await.unwrap_err();
        assert!(matches!(err, crate::utils::AppError::Internal(_)));
        assert!(tx.find_fare("booking_z").await.unwrap().is_none());
    }
}
