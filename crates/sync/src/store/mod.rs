//! Persistence seam for the engine.
//!
//! [`SyncStore`] mirrors the repository operations the engine needs so the
//! mapping engine, webhook processor and runner can be driven against
//! PostgreSQL ([`PgStore`]) or, in tests, an in-memory store.

use std::time::Duration;

use async_trait::async_trait;
use staysync_core::cadence::SyncKind;
use staysync_core::connection::ConnectionStatus;
use staysync_core::sync_error::SyncResult;
use staysync_core::types::{DbId, Timestamp};
use staysync_db::models::connection::{Connection, TokenUpdate};
use staysync_db::models::inventory::{
    AvailabilityWrite, BookingWrite, PropertyWrite, RateWrite, UnitWrite,
};
use staysync_db::models::mapping::{CanonicalInsert, Mapping, UnmappedRecord};
use staysync_db::models::staging::{
    StageInput, StagedRoom, StagedUpsert, StagingKind, StagingRecord,
};
use staysync_db::models::sync_log::{NewSyncLogEntry, SyncLogEntry, SyncLogQuery};
use staysync_db::models::webhook_event::{NewWebhookEvent, WebhookEvent, WebhookEventStatus};

#[cfg(any(test, feature = "test-support"))]
pub mod memory;
pub mod pg;

#[cfg(any(test, feature = "test-support"))]
pub use memory::MemoryStore;
pub use pg::PgStore;

#[async_trait]
pub trait SyncStore: Send + Sync {
    /// Reachability check for the health endpoint.
    async fn ping(&self) -> SyncResult<()>;

    // -- Connections --------------------------------------------------------

    async fn connection(&self, id: DbId) -> SyncResult<Option<Connection>>;
    async fn schedulable_connections(&self) -> SyncResult<Vec<Connection>>;
    async fn due_connections(&self, now: Timestamp) -> SyncResult<Vec<Connection>>;
    /// Take the connection's lease for `kind`; `false` when another run of
    /// the same kind holds it.
    async fn try_lock(&self, id: DbId, kind: SyncKind, lease: Duration) -> SyncResult<bool>;
    async fn unlock(&self, id: DbId, kind: SyncKind) -> SyncResult<()>;
    async fn record_success(
        &self,
        id: DbId,
        status: ConnectionStatus,
        finished_at: Timestamp,
        advance_schedule: bool,
    ) -> SyncResult<()>;
    async fn record_failure(
        &self,
        id: DbId,
        status: ConnectionStatus,
        error: &str,
        failed_at: Timestamp,
        advance_schedule: bool,
    ) -> SyncResult<()>;
    async fn update_tokens(&self, id: DbId, tokens: &TokenUpdate) -> SyncResult<()>;

    // -- Staging ------------------------------------------------------------

    async fn stage(&self, kind: StagingKind, input: &StageInput<'_>) -> SyncResult<StagedUpsert>;
    async fn invalidate_staged(
        &self,
        kind: StagingKind,
        connection_id: DbId,
        external_id: &str,
    ) -> SyncResult<()>;
    async fn staged(
        &self,
        kind: StagingKind,
        connection_id: DbId,
        external_id: &str,
    ) -> SyncResult<Option<StagingRecord>>;
    async fn retire_missing(
        &self,
        kind: StagingKind,
        connection_id: DbId,
        seen: &[String],
    ) -> SyncResult<Vec<StagingRecord>>;
    async fn staged_rooms(&self, connection_id: DbId) -> SyncResult<Vec<StagedRoom>>;

    // -- Mappings -----------------------------------------------------------

    async fn mapping(
        &self,
        connection_id: DbId,
        external_type: &str,
        external_id: &str,
    ) -> SyncResult<Option<Mapping>>;
    /// Create the canonical row, its mapping and the staging link atomically.
    /// If the key was mapped concurrently, that mapping is returned and
    /// nothing is inserted.
    async fn create_mapped(
        &self,
        record: &UnmappedRecord<'_>,
        insert: &CanonicalInsert<'_>,
    ) -> SyncResult<Mapping>;

    // -- Canonical writes ---------------------------------------------------

    async fn update_property(&self, id: DbId, input: &PropertyWrite) -> SyncResult<bool>;
    async fn set_property_active(&self, id: DbId, active: bool) -> SyncResult<bool>;
    async fn update_unit(&self, id: DbId, input: &UnitWrite) -> SyncResult<bool>;
    async fn set_unit_active(&self, id: DbId, active: bool) -> SyncResult<bool>;
    async fn update_booking(&self, id: DbId, input: &BookingWrite) -> SyncResult<bool>;
    /// Most-recent-wins availability write; `false` when superseded.
    async fn upsert_availability(&self, unit_id: DbId, input: &AvailabilityWrite)
        -> SyncResult<bool>;
    /// Overwrite a provisional webhook row with an older-or-equal sync observation.
    async fn reconfirm_availability(
        &self,
        unit_id: DbId,
        input: &AvailabilityWrite,
    ) -> SyncResult<bool>;
    async fn upsert_rate(&self, unit_id: DbId, input: &RateWrite) -> SyncResult<bool>;

    // -- Webhook events -----------------------------------------------------

    /// Record an inbound event; `None` when `(connection, provider_event_id)` exists.
    async fn insert_webhook_event(&self, input: &NewWebhookEvent)
        -> SyncResult<Option<WebhookEvent>>;
    async fn webhook_event(&self, id: DbId) -> SyncResult<Option<WebhookEvent>>;
    async fn finish_webhook_event(
        &self,
        id: DbId,
        status: WebhookEventStatus,
        error: Option<&str>,
    ) -> SyncResult<()>;
    async fn begin_webhook_retry(&self, id: DbId) -> SyncResult<Option<WebhookEvent>>;

    // -- Sync Log -----------------------------------------------------------

    async fn append_sync_log(&self, entry: &NewSyncLogEntry) -> SyncResult<SyncLogEntry>;
    async fn query_sync_logs(&self, query: &SyncLogQuery) -> SyncResult<Vec<SyncLogEntry>>;
}
