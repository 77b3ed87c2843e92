//! Webhook fast path.
//!
//! A provider booking event becomes a narrow availability mutation on the
//! affected nights, tagged `webhook` (block) or `webhook_cancel` (release).
//! Deliveries are deduplicated on `(connection_id, provider_event_id)` by the
//! store, so redelivery and multiple API instances never double-apply.
//! The whole delivery, recording included, is bounded in time. Whatever
//! happens the caller gets an answer, and whenever the store is reachable the
//! delivery is recorded on the event row and in the Sync Log.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use staysync_channels::dto::WebhookNotice;
use staysync_channels::registry::Provider;
use staysync_channels::webhook::parse_webhook;
use staysync_core::cadence::DateRange;
use staysync_core::hashing::json_hash;
use staysync_core::reconcile::{RecordOutcome, SyncCounts};
use staysync_core::sync_error::{SyncError, SyncResult};
use staysync_core::types::{DbId, Timestamp};
use staysync_db::models::connection::Connection;
use staysync_db::models::inventory::AvailabilityWrite;
use staysync_db::models::mapping::EXTERNAL_ROOM_TYPE;
use staysync_db::models::sync_log::NewSyncLogEntry;
use staysync_db::models::webhook_event::{NewWebhookEvent, WebhookEvent, WebhookEventStatus};
use uuid::Uuid;

use crate::store::SyncStore;
use crate::sync_log::{SyncLogBuilder, ENTITY_WEBHOOK};

/// Default bound on processing one delivery.
pub const DEFAULT_WEBHOOK_TIMEOUT: Duration = Duration::from_secs(5);

/// What happened to one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookOutcome {
    Processed,
    /// Already recorded under the same provider event id.
    Duplicate,
    /// Recorded but not applied (unmapped room, detached mapping, tentative booking).
    Ignored,
    Failed,
}

impl WebhookOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Processed => "processed",
            Self::Duplicate => "duplicate",
            Self::Ignored => "ignored",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebhookReceipt {
    /// Stored event id; `None` for duplicates.
    pub event_id: Option<DbId>,
    pub outcome: WebhookOutcome,
}

/// Result of applying a parsed notice.
enum Applied {
    Written(SyncCounts),
    Ignored(String),
}

pub struct WebhookProcessor {
    store: Arc<dyn SyncStore>,
    timeout: Duration,
}

impl WebhookProcessor {
    pub fn new(store: Arc<dyn SyncStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Record and apply one delivery for `connection` within the timeout.
    ///
    /// Only a failure to record the event at all is returned as an error;
    /// processing failures and an exhausted time budget are reported through
    /// [`WebhookOutcome::Failed`].
    pub async fn ingest(
        &self,
        connection: &Connection,
        provider: Provider,
        payload: Value,
    ) -> SyncResult<WebhookReceipt> {
        match tokio::time::timeout(self.timeout, self.record_and_process(connection, provider, payload))
            .await
        {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    connection_id = connection.id,
                    provider = %provider,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Webhook delivery exceeded its time budget; next reconciliation sweep will correct",
                );
                Ok(WebhookReceipt {
                    event_id: None,
                    outcome: WebhookOutcome::Failed,
                })
            }
        }
    }

    /// Time allowed for applying a notice; the rest of the budget is left
    /// for recording the outcome.
    fn apply_budget(&self) -> Duration {
        self.timeout * 4 / 5
    }

    async fn record_and_process(
        &self,
        connection: &Connection,
        provider: Provider,
        payload: Value,
    ) -> SyncResult<WebhookReceipt> {
        let run_id = Uuid::new_v4();
        let notice = parse_webhook(provider, &payload);
        let provider_event_id = notice
            .as_ref()
            .ok()
            .and_then(|n| n.event_id.clone())
            .unwrap_or_else(|| json_hash(&payload));
        let event_type = notice.as_ref().ok().and_then(|n| n.event_type.clone());

        let new_event = NewWebhookEvent {
            connection_id: connection.id,
            provider: provider.as_str().to_string(),
            provider_event_id: provider_event_id.clone(),
            event_type,
            payload: payload.clone(),
        };
        let Some(event) = self.store.insert_webhook_event(&new_event).await? else {
            tracing::debug!(
                connection_id = connection.id,
                provider_event_id = %provider_event_id,
                "Duplicate webhook delivery acknowledged",
            );
            let entry = SyncLogBuilder::inbound(run_id, connection.id, ENTITY_WEBHOOK, "dedupe")
                .request(payload)
                .skipped("Duplicate delivery");
            self.append_log(&entry).await;
            return Ok(WebhookReceipt {
                event_id: None,
                outcome: WebhookOutcome::Duplicate,
            });
        };

        let outcome = self.process(run_id, &event, notice).await;
        Ok(WebhookReceipt {
            event_id: Some(event.id),
            outcome,
        })
    }

    /// Reprocess a stored event, typically one that failed.
    pub async fn replay(&self, event_id: DbId) -> SyncResult<WebhookReceipt> {
        let event = self
            .store
            .begin_webhook_retry(event_id)
            .await?
            .ok_or_else(|| SyncError::not_found(format!("Webhook event {event_id} not found")))?;
        let provider: Provider = event.provider.parse()?;
        let notice = parse_webhook(provider, &event.payload);

        tracing::info!(
            event_id,
            connection_id = event.connection_id,
            retry_count = event.retry_count,
            "Replaying webhook event",
        );
        let outcome = self.process(Uuid::new_v4(), &event, notice).await;
        Ok(WebhookReceipt {
            event_id: Some(event.id),
            outcome,
        })
    }

    async fn process(
        &self,
        run_id: Uuid,
        event: &WebhookEvent,
        notice: SyncResult<WebhookNotice>,
    ) -> WebhookOutcome {
        let builder = SyncLogBuilder::inbound(
            run_id,
            event.connection_id,
            ENTITY_WEBHOOK,
            event.event_type.clone().unwrap_or_else(|| "booking".into()),
        )
        .request(event.payload.clone());

        let budget = self.apply_budget();
        let applied = match tokio::time::timeout(
            budget,
            self.apply(event.connection_id, notice, event.received_at),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(SyncError::timeout(format!(
                "Webhook processing exceeded {} ms",
                budget.as_millis()
            ))),
        };

        let (outcome, entry) = match applied {
            Ok(Applied::Written(counts)) => (WebhookOutcome::Processed, builder.completed(counts, None)),
            Ok(Applied::Ignored(reason)) => {
                tracing::debug!(event_id = event.id, reason = %reason, "Webhook ignored");
                (WebhookOutcome::Ignored, builder.skipped(&reason))
            }
            Err(e) => {
                tracing::warn!(
                    event_id = event.id,
                    connection_id = event.connection_id,
                    error = %e,
                    "Webhook processing failed; next reconciliation sweep will correct",
                );
                let mut counts = SyncCounts::default();
                counts.record_failure();
                (WebhookOutcome::Failed, builder.failed(counts, &e))
            }
        };

        let status = match outcome {
            WebhookOutcome::Failed => WebhookEventStatus::Failed,
            WebhookOutcome::Ignored => WebhookEventStatus::Ignored,
            _ => WebhookEventStatus::Processed,
        };
        let error = match status {
            WebhookEventStatus::Processed => None,
            _ => entry.error_message.clone(),
        };
        if let Err(e) = self
            .store
            .finish_webhook_event(event.id, status, error.as_deref())
            .await
        {
            tracing::error!(event_id = event.id, error = %e, "Failed to record webhook outcome");
        }
        self.append_log(&entry).await;
        outcome
    }

    /// Apply the notice to the room's nights, observed at `received_at`.
    async fn apply(
        &self,
        connection_id: DbId,
        notice: SyncResult<WebhookNotice>,
        received_at: Timestamp,
    ) -> SyncResult<Applied> {
        let notice = notice?;
        let Some(available) = notice.status.availability_effect() else {
            return Ok(Applied::Ignored(format!(
                "{} booking does not change availability",
                notice.status.as_str()
            )));
        };

        let Some(mapping) = self
            .store
            .mapping(connection_id, EXTERNAL_ROOM_TYPE, &notice.room_external_id)
            .await?
        else {
            return Ok(Applied::Ignored(format!(
                "Room {} is not mapped",
                notice.room_external_id
            )));
        };
        if !mapping.auto_sync {
            return Ok(Applied::Ignored(format!(
                "Room {} is detached from automatic sync",
                notice.room_external_id
            )));
        }

        let nights = DateRange::nights(notice.arrival, notice.departure)
            .map_err(|e| SyncError::validation(e.to_string()))?;
        let source = notice.status.webhook_source();
        let mut counts = SyncCounts::default();
        for day in nights.days() {
            let write = AvailabilityWrite {
                day,
                available,
                units_available: None,
                source,
                source_at: received_at,
            };
            let applied = self.store.upsert_availability(mapping.canonical_id, &write).await?;
            counts.record(if applied {
                RecordOutcome::Updated
            } else {
                RecordOutcome::Skipped
            });
        }

        tracing::info!(
            connection_id,
            unit_id = mapping.canonical_id,
            booking = notice.booking_external_id.as_deref().unwrap_or("-"),
            status = notice.status.as_str(),
            nights = counts.processed,
            "Webhook applied",
        );
        Ok(Applied::Written(counts))
    }

    async fn append_log(&self, entry: &NewSyncLogEntry) {
        if let Err(e) = self.store.append_sync_log(entry).await {
            tracing::error!(connection_id = entry.connection_id, error = %e, "Failed to write sync log");
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use staysync_core::availability::AvailabilitySource;
    use staysync_db::models::mapping::NewMapping;

    use super::*;
    use crate::store::MemoryStore;

    const UNIT: DbId = 500;

    fn setup() -> (Arc<MemoryStore>, Connection, WebhookProcessor) {
        let store = Arc::new(MemoryStore::new());
        let connection = store.add_connection("beds24", json!({}));
        let processor = WebhookProcessor::new(store.clone(), Duration::from_secs(1));
        (store, connection, processor)
    }

    fn map_room(store: &MemoryStore, connection: &Connection) {
        store.add_mapping(&NewMapping {
            connection_id: connection.id,
            external_type: EXTERNAL_ROOM_TYPE.into(),
            external_id: "10919".into(),
            canonical_type: "unit".into(),
            canonical_id: UNIT,
        });
    }

    fn booking(status: &str) -> Value {
        json!({
            "eventId": format!("evt-{status}"),
            "roomExternalId": "10919",
            "status": status,
            "arrival": "2025-12-30",
            "departure": "2025-12-31",
        })
    }

    #[tokio::test]
    async fn tentative_booking_is_recorded_but_ignored() {
        let (store, connection, processor) = setup();
        map_room(&store, &connection);

        let receipt = processor
            .ingest(&connection, Provider::Beds24, booking("tentative"))
            .await
            .unwrap();
        assert_eq!(receipt.outcome, WebhookOutcome::Ignored);
        assert_eq!(store.availability_rows(), 0);
        assert_eq!(store.webhook_events()[0].status, "ignored");
    }

    #[tokio::test]
    async fn unmapped_room_is_ignored() {
        let (store, connection, processor) = setup();
        let receipt = processor
            .ingest(&connection, Provider::Beds24, booking("confirmed"))
            .await
            .unwrap();
        assert_eq!(receipt.outcome, WebhookOutcome::Ignored);
        assert_eq!(store.sync_logs()[0].status, "skipped");
    }

    #[tokio::test]
    async fn malformed_payload_fails_but_is_recorded() {
        let (store, connection, processor) = setup();
        let receipt = processor
            .ingest(&connection, Provider::Beds24, json!({"status": "confirmed"}))
            .await
            .unwrap();
        assert_eq!(receipt.outcome, WebhookOutcome::Failed);
        let event = &store.webhook_events()[0];
        assert_eq!(event.status, "failed");
        assert!(event.error.is_some());
        assert_eq!(store.sync_logs()[0].error_kind.as_deref(), Some("VALIDATION"));
    }

    #[tokio::test]
    async fn payload_without_event_id_dedupes_on_content() {
        let (store, connection, processor) = setup();
        map_room(&store, &connection);
        let mut payload = booking("confirmed");
        payload.as_object_mut().unwrap().remove("eventId");

        let first = processor
            .ingest(&connection, Provider::Beds24, payload.clone())
            .await
            .unwrap();
        let second = processor
            .ingest(&connection, Provider::Beds24, payload)
            .await
            .unwrap();
        assert_eq!(first.outcome, WebhookOutcome::Processed);
        assert_eq!(second.outcome, WebhookOutcome::Duplicate);
        assert_eq!(store.webhook_events().len(), 1);
    }

    #[tokio::test]
    async fn replay_applies_failed_event() {
        let (store, connection, processor) = setup();
        map_room(&store, &connection);

        store.fail_availability_writes(true);
        let receipt = processor
            .ingest(&connection, Provider::Beds24, booking("confirmed"))
            .await
            .unwrap();
        assert_eq!(receipt.outcome, WebhookOutcome::Failed);

        store.fail_availability_writes(false);
        let event_id = receipt.event_id.unwrap();
        let replayed = processor.replay(event_id).await.unwrap();
        assert_eq!(replayed.outcome, WebhookOutcome::Processed);

        let event = store.webhook_event(event_id).await.unwrap().unwrap();
        assert_eq!(event.retry_count, 1);
        assert_eq!(event.status, "processed");
        let row = store
            .availability_day(UNIT, "2025-12-30".parse().unwrap())
            .unwrap();
        assert!(!row.available);
        assert_eq!(row.source(), Some(AvailabilitySource::Webhook));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_apply_is_recorded_as_failed_within_budget() {
        let (store, connection, processor) = setup();
        map_room(&store, &connection);
        store.delay_availability_writes(Some(Duration::from_secs(10)));

        let start = tokio::time::Instant::now();
        let receipt = processor
            .ingest(&connection, Provider::Beds24, booking("confirmed"))
            .await
            .unwrap();
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(receipt.outcome, WebhookOutcome::Failed);
        let event = &store.webhook_events()[0];
        assert_eq!(event.status, "failed");
        assert_eq!(store.sync_logs()[0].error_kind.as_deref(), Some("TIMEOUT"));
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_event_insert_is_bounded_by_the_timeout() {
        let (store, connection, processor) = setup();
        map_room(&store, &connection);
        store.delay_webhook_inserts(Some(Duration::from_secs(10)));

        let start = tokio::time::Instant::now();
        let receipt = processor
            .ingest(&connection, Provider::Beds24, booking("confirmed"))
            .await
            .unwrap();
        assert!(start.elapsed() < Duration::from_secs(2));
        assert_eq!(receipt.outcome, WebhookOutcome::Failed);
        assert_eq!(receipt.event_id, None);
        assert_eq!(store.availability_rows(), 0);
    }

    #[tokio::test]
    async fn failed_event_insert_is_an_error() {
        let (store, connection, processor) = setup();
        store.fail_webhook_inserts(true);
        let err = processor
            .ingest(&connection, Provider::Beds24, booking("confirmed"))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert!(store.webhook_events().is_empty());
    }

    #[tokio::test]
    async fn replay_of_unknown_event_is_not_found() {
        let (_, _, processor) = setup();
        let err = processor.replay(42).await.unwrap_err();
        assert_eq!(err.kind.as_str(), "NOT_FOUND");
    }
}
