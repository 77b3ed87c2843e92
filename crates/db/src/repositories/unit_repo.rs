//! Canonical `units` (bookable room types) writes.

use sqlx::{PgExecutor, PgPool};
use staysync_core::types::DbId;

use crate::models::inventory::{Unit, UnitWrite};

const COLUMNS: &str = "\
    id, property_id, name, max_occupancy, bedrooms, bathrooms, \
    bed_configuration, quantity, is_active, created_at, updated_at";

pub struct UnitRepo;

impl UnitRepo {
    pub async fn insert<'e, E>(
        executor: E,
        property_id: DbId,
        input: &UnitWrite,
    ) -> Result<DbId, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar::<_, DbId>(
            "INSERT INTO units \
                 (property_id, name, max_occupancy, bedrooms, bathrooms, bed_configuration, quantity) \
             VALUES ($1, $2, $3, $4, $5, COALESCE($6, '[]'::jsonb), $7) \
             RETURNING id",
        )
        .bind(property_id)
        .bind(&input.name)
        .bind(input.max_occupancy)
        .bind(input.bedrooms)
        .bind(input.bathrooms)
        .bind(input.bed_configuration.as_ref())
        .bind(input.quantity)
        .fetch_one(executor)
        .await
    }

    pub async fn update(pool: &PgPool, id: DbId, input: &UnitWrite) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE units SET \
                 name = $2, max_occupancy = $3, bedrooms = $4, bathrooms = $5, \
                 bed_configuration = COALESCE($6, bed_configuration), \
                 quantity = $7, is_active = TRUE \
             WHERE id = $1",
        )
        .bind(id)
        .bind(&input.name)
        .bind(input.max_occupancy)
        .bind(input.bedrooms)
        .bind(input.bathrooms)
        .bind(input.bed_configuration.as_ref())
        .bind(input.quantity)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn set_active(pool: &PgPool, id: DbId, active: bool) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE units SET is_active = $2 WHERE id = $1")
            .bind(id)
            .bind(active)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Unit>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM units WHERE id = $1");
        sqlx::query_as::<_, Unit>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}
