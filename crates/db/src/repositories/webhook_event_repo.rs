//! Repository for the `webhook_events` table.

use sqlx::PgPool;
use staysync_core::types::DbId;

use crate::models::webhook_event::{NewWebhookEvent, WebhookEvent, WebhookEventStatus};

const COLUMNS: &str = "\
    id, connection_id, provider, provider_event_id, event_type, payload, \
    status, error, retry_count, received_at, processed_at, updated_at";

pub struct WebhookEventRepo;

impl WebhookEventRepo {
    /// Record an inbound event unless `(connection_id, provider_event_id)`
    /// already exists. Returns `None` for a duplicate delivery.
    pub async fn insert_if_new(
        pool: &PgPool,
        input: &NewWebhookEvent,
    ) -> Result<Option<WebhookEvent>, sqlx::Error> {
        let query = format!(
            "INSERT INTO webhook_events \
                 (connection_id, provider, provider_event_id, event_type, payload) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT ON CONSTRAINT uq_webhook_events_provider_event DO NOTHING \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, WebhookEvent>(&query)
            .bind(input.connection_id)
            .bind(&input.provider)
            .bind(&input.provider_event_id)
            .bind(input.event_type.as_deref())
            .bind(&input.payload)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<WebhookEvent>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM webhook_events WHERE id = $1");
        sqlx::query_as::<_, WebhookEvent>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Move an event to a terminal status.
    pub async fn mark_finished(
        pool: &PgPool,
        id: DbId,
        status: WebhookEventStatus,
        error: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE webhook_events SET status = $2, error = $3, processed_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(status.as_str())
        .bind(error)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Bump `retry_count` before a replay and reset the event to `received`.
    pub async fn begin_retry(pool: &PgPool, id: DbId) -> Result<Option<WebhookEvent>, sqlx::Error> {
        let query = format!(
            "UPDATE webhook_events SET \
                 retry_count = retry_count + 1, status = 'received', error = NULL \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, WebhookEvent>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}
