//! Canonical `properties` writes.

use sqlx::{PgExecutor, PgPool};
use staysync_core::types::DbId;

use crate::models::inventory::{Property, PropertyWrite};

const COLUMNS: &str = "\
    id, account_id, connection_id, name, description, address, city, \
    country_code, latitude, longitude, currency, timezone, is_active, \
    created_at, updated_at";

pub struct PropertyRepo;

impl PropertyRepo {
    pub async fn insert<'e, E>(
        executor: E,
        account_id: DbId,
        connection_id: DbId,
        input: &PropertyWrite,
    ) -> Result<DbId, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar::<_, DbId>(
            "INSERT INTO properties \
                 (account_id, connection_id, name, description, address, city, \
                  country_code, latitude, longitude, currency, timezone) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             RETURNING id",
        )
        .bind(account_id)
        .bind(connection_id)
        .bind(&input.name)
        .bind(input.description.as_deref())
        .bind(input.address.as_deref())
        .bind(input.city.as_deref())
        .bind(input.country_code.as_deref())
        .bind(input.latitude)
        .bind(input.longitude)
        .bind(input.currency.as_deref())
        .bind(input.timezone.as_deref())
        .fetch_one(executor)
        .await
    }

    /// Overwrite the synced fields and reactivate. Returns `false` if the row is gone.
    pub async fn update(pool: &PgPool, id: DbId, input: &PropertyWrite) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE properties SET \
                 name = $2, description = $3, address = $4, city = $5, \
                 country_code = $6, latitude = $7, longitude = $8, \
                 currency = $9, timezone = $10, is_active = TRUE \
             WHERE id = $1",
        )
        .bind(id)
        .bind(&input.name)
        .bind(input.description.as_deref())
        .bind(input.address.as_deref())
        .bind(input.city.as_deref())
        .bind(input.country_code.as_deref())
        .bind(input.latitude)
        .bind(input.longitude)
        .bind(input.currency.as_deref())
        .bind(input.timezone.as_deref())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn set_active(pool: &PgPool, id: DbId, active: bool) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE properties SET is_active = $2 WHERE id = $1")
            .bind(id)
            .bind(active)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Property>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM properties WHERE id = $1");
        sqlx::query_as::<_, Property>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}
