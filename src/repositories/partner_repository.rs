use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;

use super::PartnerRepository;
use crate::models::{Partner, PartnerFilter, PartnerPatch};
use crate::utils::errors::{db_error, AppResult};

pub struct PgPartnerRepository {
    pool: PgPool,
}

impl PgPartnerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// `location` es una subcadena literal: `%`, `_` y `\` no actúan como comodines
fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[async_trait]
impl PartnerRepository for PgPartnerRepository {
    async fn list(&self, filter: &PartnerFilter) -> AppResult<(Vec<Partner>, i64)> {
        let status = filter.status.map(|s| s.as_str());
        let location = filter
            .location
            .as_ref()
            .map(|l| format!("%{}%", escape_like(l)));

        let total: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM partners
            WHERE ($1::TEXT IS NULL OR status = $1)
              AND ($2::TEXT IS NULL OR address LIKE $2 ESCAPE '\')
            "#,
        )
        .bind(status)
        .bind(&location)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("count_partners"))?;

        let partners = sqlx::query_as::<_, Partner>(
            r#"
            SELECT * FROM partners
            WHERE ($1::TEXT IS NULL OR status = $1)
              AND ($2::TEXT IS NULL OR address LIKE $2 ESCAPE '\')
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(status)
        .bind(&location)
        .bind(filter.limit)
        .bind(filter.offset)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list_partners"))?;

        Ok((partners, total.0))
    }

    async fn find_by_id(&self, partner_id: &str) -> AppResult<Option<Partner>> {
        let partner = sqlx::query_as::<_, Partner>("SELECT * FROM partners WHERE partner_id = $1")
            .bind(partner_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("find_partner"))?;

        Ok(partner)
    }

    async fn exists(&self, partner_id: &str) -> AppResult<bool> {
        let result: (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM partners WHERE partner_id = $1)")
                .bind(partner_id)
                .fetch_one(&self.pool)
                .await
                .map_err(db_error("partner_exists"))?;

        Ok(result.0)
    }

    async fn contact_in_use(
        &self,
        email: Option<&str>,
        phone: Option<&str>,
        excluding: Option<&str>,
    ) -> AppResult<bool> {
        if email.is_none() && phone.is_none() {
            return Ok(false);
        }

        let result: (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM partners
                WHERE ($3::TEXT IS NULL OR partner_id <> $3)
                  AND (email = $1 OR phone = $2)
            )
            "#,
        )
        .bind(email)
        .bind(phone)
        .bind(excluding)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("partner_contact_in_use"))?;

        Ok(result.0)
    }

    async fn create(&self, partner: &Partner) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO partners (partner_id, name, phone, email, address, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(&partner.partner_id)
        .bind(&partner.name)
        .bind(&partner.phone)
        .bind(&partner.email)
        .bind(&partner.address)
        .bind(partner.status.as_str())
        .bind(partner.created_at)
        .bind(partner.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_error("create_partner"))?;

        Ok(())
    }

    async fn update(&self, partner_id: &str, patch: &PartnerPatch) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE partners
            SET name = COALESCE($2, name),
                phone = COALESCE($3, phone),
                email = COALESCE($4, email),
                address = COALESCE($5, address),
                status = COALESCE($6, status),
                updated_at = $7
            WHERE partner_id = $1
            "#,
        )
        .bind(partner_id)
        .bind(&patch.name)
        .bind(&patch.phone)
        .bind(&patch.email)
        .bind(&patch.address)
        .bind(patch.status.map(|s| s.as_str()))
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(db_error("update_partner"))?;

        Ok(())
    }

    async fn delete(&self, partner_id: &str) -> AppResult<bool> {
        // ON DELETE CASCADE elimina los vehículos del partner
        let result = sqlx::query("DELETE FROM partners WHERE partner_id = $1")
            .bind(partner_id)
            .execute(&self.pool)
            .await
            .map_err(db_error("delete_partner"))?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like_keeps_wildcards_literal() {
        assert_eq!(escape_like("MG Road"), "MG Road");
        assert_eq!(escape_like("_"), "\\_");
        assert_eq!(escape_like("100%"), "100\\%");
        assert_eq!(escape_like("a\\b"), "a\\\\b");
    }
}
