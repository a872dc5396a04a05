use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use super::{BookingRepository, BookingTransaction};
use crate::models::{
    Booking, BookingFilter, BookingStatus, DriverSummary, FareCalculation, StatusHistoryEntry,
    VehicleSummary,
};
use crate::utils::errors::{db_error, missing_fare_error, AppResult};

pub struct PgBookingRepository {
    pool: PgPool,
}

impl PgBookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BookingRepository for PgBookingRepository {
    async fn begin(&self) -> AppResult<Box<dyn BookingTransaction>> {
        let tx = self.pool.begin().await.map_err(db_error("begin"))?;
        Ok(Box::new(PgBookingTransaction { tx }))
    }
}

/// Transacción PostgreSQL; sqlx hace rollback al soltarla sin commit
pub struct PgBookingTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl BookingTransaction for PgBookingTransaction {
    async fn user_exists(&mut self, user_id: &str) -> AppResult<bool> {
        let result: (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM users WHERE user_id = $1)")
                .bind(user_id)
                .fetch_one(&mut *self.tx)
                .await
                .map_err(db_error("user_exists"))?;

        Ok(result.0)
    }

    async fn payment_method_belongs_to(
        &mut self,
        payment_method_id: &str,
        user_id: &str,
    ) -> AppResult<bool> {
        let result: (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM payment_methods WHERE payment_method_id = $1 AND user_id = $2)",
        )
        .bind(payment_method_id)
        .bind(user_id)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(db_error("payment_method_belongs_to"))?;

        Ok(result.0)
    }

    async fn insert_booking(&mut self, booking: &Booking) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO bookings (
                booking_id, user_id, status,
                pickup_latitude, pickup_longitude, pickup_address,
                dropoff_latitude, dropoff_longitude, dropoff_address,
                vehicle_type, payment_method_id, estimated_fare_amount,
                estimated_fare_currency, estimated_distance, estimated_duration,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            "#,
        )
        .bind(&booking.booking_id)
        .bind(&booking.user_id)
        .bind(booking.status.as_str())
        .bind(booking.pickup_latitude)
        .bind(booking.pickup_longitude)
        .bind(&booking.pickup_address)
        .bind(booking.dropoff_latitude)
        .bind(booking.dropoff_longitude)
        .bind(&booking.dropoff_address)
        .bind(&booking.vehicle_type)
        .bind(&booking.payment_method_id)
        .bind(booking.estimated_fare_amount)
        .bind(&booking.estimated_fare_currency)
        .bind(booking.estimated_distance)
        .bind(booking.estimated_duration)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db_error("insert_booking"))?;

        Ok(())
    }

    async fn insert_fare(&mut self, booking_id: &str, fare: &FareCalculation) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO fare_calculations (
                booking_id, base_fare, distance_charge, time_charge,
                surge_multiplier, tax_amount, other_charges, total_amount, currency
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(booking_id)
        .bind(fare.base_fare)
        .bind(fare.distance_charge)
        .bind(fare.time_charge)
        .bind(fare.surge_multiplier)
        .bind(fare.tax_amount)
        .bind(fare.other_charges)
        .bind(fare.total_amount)
        .bind(&fare.currency)
        .execute(&mut *self.tx)
        .await
        .map_err(db_error("insert_fare"))?;

        Ok(())
    }

    async fn overwrite_fare(&mut self, booking_id: &str, fare: &FareCalculation) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE fare_calculations
            SET base_fare = $2, distance_charge = $3, time_charge = $4,
                surge_multiplier = $5, tax_amount = $6, total_amount = $7
            WHERE booking_id = $1
            "#,
        )
        .bind(booking_id)
        .bind(fare.base_fare)
        .bind(fare.distance_charge)
        .bind(fare.time_charge)
        .bind(fare.surge_multiplier)
        .bind(fare.tax_amount)
        .bind(fare.total_amount)
        .execute(&mut *self.tx)
        .await
        .map_err(db_error("overwrite_fare"))?;

        if result.rows_affected() == 0 {
            return Err(missing_fare_error(booking_id));
        }
        Ok(())
    }

    async fn append_status(
        &mut self,
        booking_id: &str,
        status: BookingStatus,
        at: DateTime<Utc>,
    ) -> AppResult<()> {
        // GREATEST mantiene el historial monótono aunque el reloj retroceda
        sqlx::query(
            r#"
            INSERT INTO booking_status_history (booking_id, status, changed_at)
            SELECT $1, $2, GREATEST($3, COALESCE(MAX(changed_at), $3))
            FROM booking_status_history
            WHERE booking_id = $1
            "#,
        )
        .bind(booking_id)
        .bind(status.as_str())
        .bind(at)
        .execute(&mut *self.tx)
        .await
        .map_err(db_error("append_status"))?;

        Ok(())
    }

    async fn find_booking(&mut self, booking_id: &str) -> AppResult<Option<Booking>> {
        let booking = sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE booking_id = $1")
            .bind(booking_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_error("find_booking"))?;

        Ok(booking)
    }

    async fn lock_booking(&mut self, booking_id: &str) -> AppResult<Option<Booking>> {
        let booking = sqlx::query_as::<_, Booking>(
            "SELECT * FROM bookings WHERE booking_id = $1 FOR UPDATE",
        )
        .bind(booking_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db_error("lock_booking"))?;

        Ok(booking)
    }

    async fn find_fare(&mut self, booking_id: &str) -> AppResult<Option<FareCalculation>> {
        let fare = sqlx::query_as::<_, FareCalculation>(
            r#"
            SELECT base_fare, distance_charge, time_charge, surge_multiplier,
                   tax_amount, other_charges, total_amount, currency
            FROM fare_calculations
            WHERE booking_id = $1
            "#,
        )
        .bind(booking_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db_error("find_fare"))?;

        Ok(fare)
    }

    async fn find_driver(&mut self, driver_id: &str) -> AppResult<Option<DriverSummary>> {
        let driver = sqlx::query_as::<_, DriverSummary>(
            r#"
            SELECT driver_id, first_name, last_name, phone, average_rating
            FROM drivers
            WHERE driver_id = $1
            "#,
        )
        .bind(driver_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db_error("find_driver"))?;

        Ok(driver)
    }

    async fn find_vehicle_summary(
        &mut self,
        vehicle_id: &str,
    ) -> AppResult<Option<VehicleSummary>> {
        let vehicle = sqlx::query_as::<_, VehicleSummary>(
            "SELECT vehicle_id, make, model, color, registration FROM vehicles WHERE vehicle_id = $1",
        )
        .bind(vehicle_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db_error("find_vehicle_summary"))?;

        Ok(vehicle)
    }

    async fn save_cancellation(&mut self, booking: &Booking) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE bookings
            SET status = $2, cancellation_reason = $3, cancellation_fee_amount = $4, updated_at = $5
            WHERE booking_id = $1
            "#,
        )
        .bind(&booking.booking_id)
        .bind(booking.status.as_str())
        .bind(&booking.cancellation_reason)
        .bind(booking.cancellation_fee_amount)
        .bind(booking.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db_error("save_cancellation"))?;

        Ok(())
    }

    async fn save_destination(&mut self, booking: &Booking) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE bookings
            SET dropoff_latitude = $2, dropoff_longitude = $3, dropoff_address = $4,
                estimated_fare_amount = $5, estimated_distance = $6, estimated_duration = $7,
                updated_at = $8
            WHERE booking_id = $1
            "#,
        )
        .bind(&booking.booking_id)
        .bind(booking.dropoff_latitude)
        .bind(booking.dropoff_longitude)
        .bind(&booking.dropoff_address)
        .bind(booking.estimated_fare_amount)
        .bind(booking.estimated_distance)
        .bind(booking.estimated_duration)
        .bind(booking.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db_error("save_destination"))?;

        Ok(())
    }

    async fn release_driver(&mut self, driver_id: &str) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE drivers SET status = 'available' WHERE driver_id = $1 AND status = 'on_ride'",
        )
        .bind(driver_id)
        .execute(&mut *self.tx)
        .await
        .map_err(db_error("release_driver"))?;

        Ok(result.rows_affected() > 0)
    }

    async fn release_vehicle(&mut self, vehicle_id: &str) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE vehicles SET status = 'available', updated_at = NOW()
            WHERE vehicle_id = $1 AND status = 'on_ride'
            "#,
        )
        .bind(vehicle_id)
        .execute(&mut *self.tx)
        .await
        .map_err(db_error("release_vehicle"))?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_bookings(&mut self, filter: &BookingFilter) -> AppResult<(Vec<Booking>, i64)> {
        let status = filter.status.map(|s| s.as_str());

        let total: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM bookings WHERE user_id = $1 AND ($2::TEXT IS NULL OR status = $2)",
        )
        .bind(&filter.user_id)
        .bind(status)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(db_error("count_bookings"))?;

        let bookings = sqlx::query_as::<_, Booking>(
            r#"
            SELECT * FROM bookings
            WHERE user_id = $1 AND ($2::TEXT IS NULL OR status = $2)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(&filter.user_id)
        .bind(status)
        .bind(filter.limit)
        .bind(filter.offset)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db_error("list_bookings"))?;

        Ok((bookings, total.0))
    }

    async fn status_history(&mut self, booking_id: &str) -> AppResult<Vec<StatusHistoryEntry>> {
        let entries = sqlx::query_as::<_, StatusHistoryEntry>(
            r#"
            SELECT booking_id, status, changed_at
            FROM booking_status_history
            WHERE booking_id = $1
            ORDER BY changed_at ASC, history_id ASC
            "#,
        )
        .bind(booking_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db_error("status_history"))?;

        Ok(entries)
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.tx.commit().await.map_err(db_error("commit"))
    }
}
