//! Repository for `availability_days`.
//!
//! One row per `(unit_id, day)`, enforced by `uq_availability_days_unit_day`.
//! Availability writes are most-recent-wins on `source_at`; rate writes are
//! most-recent-wins on `rates_synced_at` and never touch availability fields.

use sqlx::PgPool;
use staysync_core::availability::AvailabilitySource;
use staysync_core::types::{DbId, Day};

use crate::models::inventory::{AvailabilityDay, AvailabilityWrite, RateWrite};

const COLUMNS: &str = "\
    id, unit_id, day, available, units_available, source, source_at, price, \
    min_stay, rates_synced_at, created_at, updated_at";

pub struct AvailabilityRepo;

impl AvailabilityRepo {
    /// Insert or overwrite one day's availability.
    ///
    /// Returns `false` when the existing row was written by an observation
    /// newer than `input.source_at` (the write is superseded).
    pub async fn upsert(
        pool: &PgPool,
        unit_id: DbId,
        input: &AvailabilityWrite,
    ) -> Result<bool, sqlx::Error> {
        let applied = sqlx::query_scalar::<_, DbId>(
            "INSERT INTO availability_days \
                 (unit_id, day, available, units_available, source, source_at) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT ON CONSTRAINT uq_availability_days_unit_day DO UPDATE SET \
                 available = EXCLUDED.available, \
                 units_available = COALESCE(EXCLUDED.units_available, availability_days.units_available), \
                 source = EXCLUDED.source, \
                 source_at = EXCLUDED.source_at \
             WHERE availability_days.source_at <= EXCLUDED.source_at \
             RETURNING id",
        )
        .bind(unit_id)
        .bind(input.day)
        .bind(input.available)
        .bind(input.units_available)
        .bind(input.source.as_str())
        .bind(input.source_at)
        .fetch_optional(pool)
        .await?;
        Ok(applied.is_some())
    }

    /// Re-assert a sync observation over a provisional (webhook) row.
    ///
    /// Only touches rows whose source is not `sync` and whose `source_at`
    /// predates the observation. Returns whether a row changed.
    pub async fn reconfirm(
        pool: &PgPool,
        unit_id: DbId,
        input: &AvailabilityWrite,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE availability_days SET \
                 available = $3, \
                 units_available = COALESCE($4, units_available), \
                 source = $5, \
                 source_at = $6 \
             WHERE unit_id = $1 AND day = $2 \
               AND source <> $5 \
               AND source_at <= $6",
        )
        .bind(unit_id)
        .bind(input.day)
        .bind(input.available)
        .bind(input.units_available)
        .bind(AvailabilitySource::Sync.as_str())
        .bind(input.source_at)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Write one night's price and minimum stay.
    pub async fn upsert_rate(
        pool: &PgPool,
        unit_id: DbId,
        input: &RateWrite,
    ) -> Result<bool, sqlx::Error> {
        let applied = sqlx::query_scalar::<_, DbId>(
            "INSERT INTO availability_days (unit_id, day, price, min_stay, rates_synced_at) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT ON CONSTRAINT uq_availability_days_unit_day DO UPDATE SET \
                 price = EXCLUDED.price, \
                 min_stay = EXCLUDED.min_stay, \
                 rates_synced_at = EXCLUDED.rates_synced_at \
             WHERE availability_days.rates_synced_at IS NULL \
                OR availability_days.rates_synced_at <= EXCLUDED.rates_synced_at \
             RETURNING id",
        )
        .bind(unit_id)
        .bind(input.day)
        .bind(input.price)
        .bind(input.min_stay)
        .bind(input.synced_at)
        .fetch_optional(pool)
        .await?;
        Ok(applied.is_some())
    }

    pub async fn find(
        pool: &PgPool,
        unit_id: DbId,
        day: Day,
    ) -> Result<Option<AvailabilityDay>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM availability_days WHERE unit_id = $1 AND day = $2"
        );
        sqlx::query_as::<_, AvailabilityDay>(&query)
            .bind(unit_id)
            .bind(day)
            .fetch_optional(pool)
            .await
    }

    /// Rows for a unit in `[start, end)`, ordered by day.
    pub async fn list_range(
        pool: &PgPool,
        unit_id: DbId,
        start: Day,
        end: Day,
    ) -> Result<Vec<AvailabilityDay>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM availability_days \
             WHERE unit_id = $1 AND day >= $2 AND day < $3 \
             ORDER BY day"
        );
        sqlx::query_as::<_, AvailabilityDay>(&query)
            .bind(unit_id)
            .bind(start)
            .bind(end)
            .fetch_all(pool)
            .await
    }
}
