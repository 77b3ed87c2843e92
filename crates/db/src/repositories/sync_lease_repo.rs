//! Repository for the `sync_leases` table.
//!
//! One lease per `(connection_id, sync_kind)`: two runs of the same kind
//! never overlap for a connection, while different kinds proceed
//! independently.

use sqlx::PgPool;
use staysync_core::cadence::SyncKind;
use staysync_core::types::DbId;

pub struct SyncLeaseRepo;

impl SyncLeaseRepo {
    /// Take the lease for `kind` on a connection.
    ///
    /// Returns `false` when another run holds an unexpired lease. An expired
    /// lease (crashed worker) is taken over.
    pub async fn try_acquire(
        pool: &PgPool,
        connection_id: DbId,
        kind: SyncKind,
        lease_secs: i64,
    ) -> Result<bool, sqlx::Error> {
        let acquired = sqlx::query_scalar::<_, DbId>(
            "INSERT INTO sync_leases (connection_id, sync_kind, locked_until) \
             VALUES ($1, $2, NOW() + make_interval(secs => $3)) \
             ON CONFLICT (connection_id, sync_kind) DO UPDATE \
                 SET locked_until = EXCLUDED.locked_until \
                 WHERE sync_leases.locked_until < NOW() \
             RETURNING connection_id",
        )
        .bind(connection_id)
        .bind(kind.as_str())
        .bind(lease_secs as f64)
        .fetch_optional(pool)
        .await?;
        Ok(acquired.is_some())
    }

    pub async fn release(pool: &PgPool, connection_id: DbId, kind: SyncKind) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM sync_leases WHERE connection_id = $1 AND sync_kind = $2")
            .bind(connection_id)
            .bind(kind.as_str())
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Kinds currently leased for a connection.
    pub async fn held(pool: &PgPool, connection_id: DbId) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>(
            "SELECT sync_kind FROM sync_leases \
             WHERE connection_id = $1 AND locked_until >= NOW() \
             ORDER BY sync_kind",
        )
        .bind(connection_id)
        .fetch_all(pool)
        .await
    }
}
