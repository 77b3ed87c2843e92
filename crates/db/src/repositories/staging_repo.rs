//! Repository for the `staging_*` buffer tables.
//!
//! All five staging tables share one shape, so every method takes a
//! [`StagingKind`] selecting the table.

use sqlx::{PgExecutor, PgPool};
use staysync_core::types::DbId;

use crate::models::mapping::EXTERNAL_ROOM_TYPE;
use crate::models::staging::{StageInput, StagedRoom, StagedUpsert, StagingKind, StagingRecord};

const COLUMNS: &str = "\
    id, connection_id, external_id, parent_external_id, payload, sync_hash, \
    canonical_id, synced_at, removed_at, created_at, updated_at";

pub struct StagingRepo;

impl StagingRepo {
    /// Upsert a fetched record keyed by `(connection_id, external_id)`.
    ///
    /// Always refreshes the payload, hash and `synced_at`, and clears
    /// `removed_at`. Returns the hash and canonical link that were stored
    /// before the write so the caller can detect a no-op.
    pub async fn upsert(
        pool: &PgPool,
        kind: StagingKind,
        input: &StageInput<'_>,
    ) -> Result<StagedUpsert, sqlx::Error> {
        let table = kind.table();
        let query = format!(
            "WITH prev AS ( \
                 SELECT sync_hash, canonical_id FROM {table} \
                 WHERE connection_id = $1 AND external_id = $2 \
             ) \
             INSERT INTO {table} (connection_id, external_id, parent_external_id, payload, sync_hash) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (connection_id, external_id) DO UPDATE SET \
                 parent_external_id = EXCLUDED.parent_external_id, \
                 payload = EXCLUDED.payload, \
                 sync_hash = EXCLUDED.sync_hash, \
                 synced_at = NOW(), \
                 removed_at = NULL, \
                 updated_at = NOW() \
             RETURNING \
                 (SELECT sync_hash FROM prev) AS previous_hash, \
                 (SELECT canonical_id FROM prev) AS canonical_id"
        );
        sqlx::query_as::<_, StagedUpsert>(&query)
            .bind(input.connection_id)
            .bind(input.external_id)
            .bind(input.parent_external_id)
            .bind(input.payload)
            .bind(input.sync_hash)
            .fetch_one(pool)
            .await
    }

    /// Link a staged record to its canonical entity.
    pub async fn link<'e, E>(
        executor: E,
        kind: StagingKind,
        connection_id: DbId,
        external_id: &str,
        canonical_id: DbId,
    ) -> Result<(), sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "UPDATE {} SET canonical_id = $3, updated_at = NOW() \
             WHERE connection_id = $1 AND external_id = $2",
            kind.table()
        );
        sqlx::query(&query)
            .bind(connection_id)
            .bind(external_id)
            .bind(canonical_id)
            .execute(executor)
            .await?;
        Ok(())
    }

    /// Clear the stored hash so the next sync re-applies the record.
    ///
    /// Used when the canonical write fails after staging succeeded.
    pub async fn invalidate_hash(
        pool: &PgPool,
        kind: StagingKind,
        connection_id: DbId,
        external_id: &str,
    ) -> Result<(), sqlx::Error> {
        let query = format!(
            "UPDATE {} SET sync_hash = '', updated_at = NOW() \
             WHERE connection_id = $1 AND external_id = $2",
            kind.table()
        );
        sqlx::query(&query)
            .bind(connection_id)
            .bind(external_id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn find(
        pool: &PgPool,
        kind: StagingKind,
        connection_id: DbId,
        external_id: &str,
    ) -> Result<Option<StagingRecord>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM {} WHERE connection_id = $1 AND external_id = $2",
            kind.table()
        );
        sqlx::query_as::<_, StagingRecord>(&query)
            .bind(connection_id)
            .bind(external_id)
            .fetch_optional(pool)
            .await
    }

    /// Mark live rows not in `seen` as removed and return them.
    ///
    /// The hash is cleared so a record that comes back is re-applied (and its
    /// canonical entity reactivated) even when its content did not change.
    pub async fn retire_missing(
        pool: &PgPool,
        kind: StagingKind,
        connection_id: DbId,
        seen: &[String],
    ) -> Result<Vec<StagingRecord>, sqlx::Error> {
        let query = format!(
            "UPDATE {} SET removed_at = NOW(), sync_hash = '', updated_at = NOW() \
             WHERE connection_id = $1 \
               AND removed_at IS NULL \
               AND NOT (external_id = ANY($2)) \
             RETURNING {COLUMNS}",
            kind.table()
        );
        sqlx::query_as::<_, StagingRecord>(&query)
            .bind(connection_id)
            .bind(seen)
            .fetch_all(pool)
            .await
    }

    /// Live staged room types with their mapped canonical unit, if any.
    pub async fn list_staged_rooms(
        pool: &PgPool,
        connection_id: DbId,
    ) -> Result<Vec<StagedRoom>, sqlx::Error> {
        sqlx::query_as::<_, StagedRoom>(
            "SELECT s.parent_external_id AS property_external_id, \
                    s.external_id AS room_external_id, \
                    m.canonical_id AS unit_id, \
                    m.auto_sync \
             FROM staging_room_types s \
             LEFT JOIN mappings m \
               ON m.connection_id = s.connection_id \
              AND m.external_type = $2 \
              AND m.external_id = s.external_id \
             WHERE s.connection_id = $1 AND s.removed_at IS NULL \
             ORDER BY s.external_id",
        )
        .bind(connection_id)
        .bind(EXTERNAL_ROOM_TYPE)
        .fetch_all(pool)
        .await
    }
}
