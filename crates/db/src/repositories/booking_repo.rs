//! Canonical `bookings` writes.

use sqlx::{PgExecutor, PgPool};
use staysync_core::types::DbId;

use crate::models::inventory::{Booking, BookingWrite};

const COLUMNS: &str = "\
    id, connection_id, unit_id, external_reference, status, arrival, departure, \
    guest_name, adults, children, total_price, currency, created_at, updated_at";

pub struct BookingRepo;

impl BookingRepo {
    pub async fn insert<'e, E>(
        executor: E,
        connection_id: DbId,
        input: &BookingWrite,
    ) -> Result<DbId, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar::<_, DbId>(
            "INSERT INTO bookings \
                 (connection_id, unit_id, external_reference, status, arrival, departure, \
                  guest_name, adults, children, total_price, currency) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             RETURNING id",
        )
        .bind(connection_id)
        .bind(input.unit_id)
        .bind(&input.external_reference)
        .bind(&input.status)
        .bind(input.arrival)
        .bind(input.departure)
        .bind(input.guest_name.as_deref())
        .bind(input.adults)
        .bind(input.children)
        .bind(input.total_price)
        .bind(input.currency.as_deref())
        .fetch_one(executor)
        .await
    }

    pub async fn update(pool: &PgPool, id: DbId, input: &BookingWrite) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE bookings SET \
                 unit_id = $2, external_reference = $3, status = $4, arrival = $5, \
                 departure = $6, guest_name = $7, adults = $8, children = $9, \
                 total_price = $10, currency = $11 \
             WHERE id = $1",
        )
        .bind(id)
        .bind(input.unit_id)
        .bind(&input.external_reference)
        .bind(&input.status)
        .bind(input.arrival)
        .bind(input.departure)
        .bind(input.guest_name.as_deref())
        .bind(input.adults)
        .bind(input.children)
        .bind(input.total_price)
        .bind(input.currency.as_deref())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Booking>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM bookings WHERE id = $1");
        sqlx::query_as::<_, Booking>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}
