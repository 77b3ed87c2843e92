//! Repository for the `mappings` table.

use sqlx::{PgExecutor, PgPool};
use staysync_core::types::DbId;

use crate::models::mapping::{CanonicalInsert, Mapping, NewMapping, UnmappedRecord};
use crate::repositories::{BookingRepo, PropertyRepo, StagingRepo, UnitRepo};

const COLUMNS: &str = "\
    id, connection_id, external_type, external_id, canonical_type, \
    canonical_id, auto_sync, created_at, updated_at";

pub struct MappingRepo;

impl MappingRepo {
    pub async fn find(
        pool: &PgPool,
        connection_id: DbId,
        external_type: &str,
        external_id: &str,
    ) -> Result<Option<Mapping>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM mappings \
             WHERE connection_id = $1 AND external_type = $2 AND external_id = $3"
        );
        sqlx::query_as::<_, Mapping>(&query)
            .bind(connection_id)
            .bind(external_type)
            .bind(external_id)
            .fetch_optional(pool)
            .await
    }

    /// Record a mapping. A concurrent insert for the same external key wins;
    /// the existing row is returned unchanged.
    pub async fn create<'e, E>(executor: E, input: &NewMapping) -> Result<Mapping, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "INSERT INTO mappings \
                 (connection_id, external_type, external_id, canonical_type, canonical_id) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (connection_id, external_type, external_id) \
                 DO UPDATE SET updated_at = mappings.updated_at \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Mapping>(&query)
            .bind(input.connection_id)
            .bind(&input.external_type)
            .bind(&input.external_id)
            .bind(&input.canonical_type)
            .bind(input.canonical_id)
            .fetch_one(executor)
            .await
    }

    /// Insert the canonical row for `record`, its mapping and the staging
    /// link in one transaction.
    ///
    /// When another run mapped the same external key first, the transaction
    /// is rolled back and the existing mapping is returned.
    pub async fn create_with_canonical(
        pool: &PgPool,
        record: &UnmappedRecord<'_>,
        insert: &CanonicalInsert<'_>,
    ) -> Result<Mapping, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let canonical_id = match *insert {
            CanonicalInsert::Property { account_id, input } => {
                PropertyRepo::insert(&mut *tx, account_id, record.connection_id, input).await?
            }
            CanonicalInsert::Unit { property_id, input } => {
                UnitRepo::insert(&mut *tx, property_id, input).await?
            }
            CanonicalInsert::Booking { input } => {
                BookingRepo::insert(&mut *tx, record.connection_id, input).await?
            }
        };
        let mapping = Self::create(
            &mut *tx,
            &NewMapping {
                connection_id: record.connection_id,
                external_type: record.external_type.to_string(),
                external_id: record.external_id.to_string(),
                canonical_type: insert.canonical_type().to_string(),
                canonical_id,
            },
        )
        .await?;
        if mapping.canonical_id != canonical_id {
            tx.rollback().await?;
            return Ok(mapping);
        }
        StagingRepo::link(
            &mut *tx,
            record.kind,
            record.connection_id,
            record.external_id,
            canonical_id,
        )
        .await?;
        tx.commit().await?;
        Ok(mapping)
    }

    /// Pin (`false`) or re-attach (`true`) a mapping.
    pub async fn set_auto_sync(
        pool: &PgPool,
        id: DbId,
        auto_sync: bool,
    ) -> Result<Option<Mapping>, sqlx::Error> {
        let query = format!(
            "UPDATE mappings SET auto_sync = $2 WHERE id = $1 RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Mapping>(&query)
            .bind(id)
            .bind(auto_sync)
            .fetch_optional(pool)
            .await
    }
}
