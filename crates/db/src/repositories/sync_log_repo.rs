//! Repository for the append-only `sync_logs` table.
//!
//! There is deliberately no update or delete method.

use sqlx::PgPool;
use staysync_core::pagination::{clamp_limit, clamp_offset, DEFAULT_LIMIT, MAX_LIMIT};

use crate::models::sync_log::{NewSyncLogEntry, SyncLogEntry, SyncLogQuery};

const COLUMNS: &str = "\
    id, run_id, connection_id, direction, sync_kind, entity_type, action, status, \
    processed_count AS processed, created_count AS created, updated_count AS updated, \
    unchanged_count AS unchanged, skipped_count AS skipped, deleted_count AS deleted, \
    failed_count AS failed, error_kind, error_message, request_snapshot, \
    response_snapshot, started_at, finished_at, duration_ms, created_at";

pub struct SyncLogRepo;

impl SyncLogRepo {
    pub async fn append(pool: &PgPool, input: &NewSyncLogEntry) -> Result<SyncLogEntry, sqlx::Error> {
        let query = format!(
            "INSERT INTO sync_logs \
                 (run_id, connection_id, direction, sync_kind, entity_type, action, status, \
                  processed_count, created_count, updated_count, unchanged_count, \
                  skipped_count, deleted_count, failed_count, error_kind, error_message, \
                  request_snapshot, response_snapshot, started_at, finished_at, duration_ms) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, \
                     $16, $17, $18, $19, $20, $21) \
             RETURNING {COLUMNS}"
        );
        let counts = &input.counts;
        sqlx::query_as::<_, SyncLogEntry>(&query)
            .bind(input.run_id)
            .bind(input.connection_id)
            .bind(input.direction.as_str())
            .bind(input.sync_kind.as_deref())
            .bind(&input.entity_type)
            .bind(&input.action)
            .bind(input.status.as_str())
            .bind(counts.processed)
            .bind(counts.created)
            .bind(counts.updated)
            .bind(counts.unchanged)
            .bind(counts.skipped)
            .bind(counts.deleted)
            .bind(counts.failed)
            .bind(input.error_kind.as_deref())
            .bind(input.error_message.as_deref())
            .bind(input.request_snapshot.as_ref())
            .bind(input.response_snapshot.as_ref())
            .bind(input.started_at)
            .bind(input.finished_at)
            .bind(input.duration_ms())
            .fetch_one(pool)
            .await
    }

    /// Filtered read for dashboards, newest first.
    pub async fn query(pool: &PgPool, params: &SyncLogQuery) -> Result<Vec<SyncLogEntry>, sqlx::Error> {
        let limit = clamp_limit(params.limit, DEFAULT_LIMIT, MAX_LIMIT);
        let offset = clamp_offset(params.offset);
        let query = format!(
            "SELECT {COLUMNS} FROM sync_logs \
             WHERE ($1::BIGINT IS NULL OR connection_id = $1) \
               AND ($2::TEXT IS NULL OR status = $2) \
               AND ($3::TIMESTAMPTZ IS NULL OR created_at >= $3) \
               AND ($4::TIMESTAMPTZ IS NULL OR created_at < $4) \
             ORDER BY created_at DESC, id DESC \
             LIMIT $5 OFFSET $6"
        );
        sqlx::query_as::<_, SyncLogEntry>(&query)
            .bind(params.connection_id)
            .bind(params.status.as_deref())
            .bind(params.from)
            .bind(params.to)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }
}
