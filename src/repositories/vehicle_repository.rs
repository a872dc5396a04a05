use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;

use super::VehicleRepository;
use crate::models::{Vehicle, VehiclePatch, VehicleStatus};
use crate::utils::errors::{db_error, AppResult};

pub struct PgVehicleRepository {
    pool: PgPool,
}

impl PgVehicleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VehicleRepository for PgVehicleRepository {
    async fn list_by_partner(
        &self,
        partner_id: &str,
        status: Option<VehicleStatus>,
    ) -> AppResult<Vec<Vehicle>> {
        let vehicles = sqlx::query_as::<_, Vehicle>(
            r#"
            SELECT * FROM vehicles
            WHERE partner_id = $1 AND ($2::TEXT IS NULL OR status = $2)
            ORDER BY created_at DESC
            "#,
        )
        .bind(partner_id)
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list_vehicles"))?;

        Ok(vehicles)
    }

    async fn list_by_partners(&self, partner_ids: &[String]) -> AppResult<Vec<Vehicle>> {
        if partner_ids.is_empty() {
            return Ok(Vec::new());
        }

        let vehicles = sqlx::query_as::<_, Vehicle>(
            "SELECT * FROM vehicles WHERE partner_id = ANY($1) ORDER BY created_at DESC",
        )
        .bind(partner_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list_vehicles_for_partners"))?;

        Ok(vehicles)
    }

    async fn find_for_partner(
        &self,
        partner_id: &str,
        vehicle_id: &str,
    ) -> AppResult<Option<Vehicle>> {
        let vehicle = sqlx::query_as::<_, Vehicle>(
            "SELECT * FROM vehicles WHERE vehicle_id = $1 AND partner_id = $2",
        )
        .bind(vehicle_id)
        .bind(partner_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("find_vehicle_for_partner"))?;

        Ok(vehicle)
    }

    async fn find_by_id(&self, vehicle_id: &str) -> AppResult<Option<Vehicle>> {
        let vehicle = sqlx::query_as::<_, Vehicle>("SELECT * FROM vehicles WHERE vehicle_id = $1")
            .bind(vehicle_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("find_vehicle"))?;

        Ok(vehicle)
    }

    async fn registration_in_use(
        &self,
        registration: &str,
        excluding: Option<&str>,
    ) -> AppResult<bool> {
        let result: (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM vehicles
                WHERE registration = $1 AND ($2::TEXT IS NULL OR vehicle_id <> $2)
            )
            "#,
        )
        .bind(registration)
        .bind(excluding)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("registration_in_use"))?;

        Ok(result.0)
    }

    async fn create(&self, vehicle: &Vehicle) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO vehicles
                (vehicle_id, partner_id, type, make, model, color, registration, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(&vehicle.vehicle_id)
        .bind(&vehicle.partner_id)
        .bind(&vehicle.vehicle_type)
        .bind(&vehicle.make)
        .bind(&vehicle.model)
        .bind(&vehicle.color)
        .bind(&vehicle.registration)
        .bind(vehicle.status.as_str())
        .bind(vehicle.created_at)
        .bind(vehicle.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_error("create_vehicle"))?;

        Ok(())
    }

    async fn update(&self, vehicle_id: &str, patch: &VehiclePatch) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE vehicles
            SET type = COALESCE($2, type),
                registration = COALESCE($3, registration),
                status = COALESCE($4, status),
                make = COALESCE($5, make),
                model = COALESCE($6, model),
                color = COALESCE($7, color),
                updated_at = $8
            WHERE vehicle_id = $1
            "#,
        )
        .bind(vehicle_id)
        .bind(&patch.vehicle_type)
        .bind(&patch.registration)
        .bind(patch.status.map(|s| s.as_str()))
        .bind(&patch.make)
        .bind(&patch.model)
        .bind(&patch.color)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(db_error("update_vehicle"))?;

        Ok(())
    }

    async fn delete(&self, vehicle_id: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM vehicles WHERE vehicle_id = $1")
            .bind(vehicle_id)
            .execute(&self.pool)
            .await
            .map_err(db_error("delete_vehicle"))?;

        Ok(result.rows_affected() > 0)
    }
}
