//! Repository for the `connections` table.
//!
//! The engine never creates or deletes connections; it only reads them and
//! moves status, schedule timestamps and tokens.

use sqlx::PgPool;
use staysync_core::connection::ConnectionStatus;
use staysync_core::types::{DbId, Timestamp};

use crate::models::connection::{Connection, TokenUpdate};

const COLUMNS: &str = "\
    id, account_id, provider, display_name, credentials, access_token, \
    refresh_token, token_expires_at, status, sync_enabled, sync_interval_secs, \
    requests_per_minute, last_sync_at, next_sync_at, last_error, last_error_at, \
    created_at, updated_at";

/// Statuses the scheduler may pick up.
const SCHEDULABLE: &str = "status IN ('pending', 'active', 'error')";

pub struct ConnectionRepo;

impl ConnectionRepo {
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Connection>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM connections WHERE id = $1");
        sqlx::query_as::<_, Connection>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// All enabled connections in a schedulable status, oldest first.
    pub async fn list_schedulable(pool: &PgPool) -> Result<Vec<Connection>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM connections \
             WHERE sync_enabled AND {SCHEDULABLE} \
             ORDER BY id"
        );
        sqlx::query_as::<_, Connection>(&query).fetch_all(pool).await
    }

    /// Schedulable connections whose `next_sync_at` has passed (or was never set).
    pub async fn list_due(pool: &PgPool, now: Timestamp) -> Result<Vec<Connection>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM connections \
             WHERE sync_enabled AND {SCHEDULABLE} \
               AND (next_sync_at IS NULL OR next_sync_at <= $1) \
             ORDER BY next_sync_at NULLS FIRST, id"
        );
        sqlx::query_as::<_, Connection>(&query)
            .bind(now)
            .fetch_all(pool)
            .await
    }

    /// Record a successful run: new status, `last_sync_at`, cleared error.
    ///
    /// With `advance_schedule`, `next_sync_at` moves to `finished_at + sync_interval_secs`.
    pub async fn record_success(
        pool: &PgPool,
        id: DbId,
        status: ConnectionStatus,
        finished_at: Timestamp,
        advance_schedule: bool,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE connections SET \
                 status = $2, \
                 last_sync_at = $3, \
                 last_error = NULL, \
                 last_error_at = NULL, \
                 next_sync_at = CASE WHEN $4 \
                     THEN $3 + make_interval(secs => sync_interval_secs) \
                     ELSE next_sync_at END \
             WHERE id = $1",
        )
        .bind(id)
        .bind(status.as_str())
        .bind(finished_at)
        .bind(advance_schedule)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Record a failed run: new status plus `last_error` / `last_error_at`.
    pub async fn record_failure(
        pool: &PgPool,
        id: DbId,
        status: ConnectionStatus,
        error: &str,
        failed_at: Timestamp,
        advance_schedule: bool,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE connections SET \
                 status = $2, \
                 last_error = $3, \
                 last_error_at = $4, \
                 next_sync_at = CASE WHEN $5 \
                     THEN $4 + make_interval(secs => sync_interval_secs) \
                     ELSE next_sync_at END \
             WHERE id = $1",
        )
        .bind(id)
        .bind(status.as_str())
        .bind(error)
        .bind(failed_at)
        .bind(advance_schedule)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Store refreshed tokens. A `None` refresh token keeps the existing one.
    pub async fn update_tokens(
        pool: &PgPool,
        id: DbId,
        tokens: &TokenUpdate,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE connections SET \
                 access_token = $2, \
                 refresh_token = COALESCE($3, refresh_token), \
                 token_expires_at = $4 \
             WHERE id = $1",
        )
        .bind(id)
        .bind(&tokens.access_token)
        .bind(tokens.refresh_token.as_deref())
        .bind(tokens.expires_at)
        .execute(pool)
        .await?;
        Ok(())
    }
}
