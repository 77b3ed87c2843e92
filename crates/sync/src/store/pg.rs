//! PostgreSQL-backed [`SyncStore`].

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
use staysync_db::repositories::{
    AvailabilityRepo, BookingRepo, ConnectionRepo, MappingRepo, PropertyRepo, StagingRepo,
    SyncLeaseRepo, SyncLogRepo, UnitRepo, WebhookEventRepo,
};
use staysync_db::DbPool;

use super::SyncStore;
use crate::error::store_error;

#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl SyncStore for PgStore {
    async fn ping(&self) -> SyncResult<()> {
        staysync_db::health_check(&self.pool)
            .await
            .map_err(store_error)
    }

    async fn connection(&self, id: DbId) -> SyncResult<Option<Connection>> {
        ConnectionRepo::find_by_id(&self.pool, id)
            .await
            .map_err(store_error)
    }

    async fn schedulable_connections(&self) -> SyncResult<Vec<Connection>> {
        ConnectionRepo::list_schedulable(&self.pool)
            .await
            .map_err(store_error)
    }

    async fn due_connections(&self, now: Timestamp) -> SyncResult<Vec<Connection>> {
        ConnectionRepo::list_due(&self.pool, now)
            .await
            .map_err(store_error)
    }

    async fn try_lock(&self, id: DbId, kind: SyncKind, lease: Duration) -> SyncResult<bool> {
        let lease_secs = i64::try_from(lease.as_secs()).unwrap_or(i64::MAX);
        SyncLeaseRepo::try_acquire(&self.pool, id, kind, lease_secs)
            .await
            .map_err(store_error)
    }

    async fn unlock(&self, id: DbId, kind: SyncKind) -> SyncResult<()> {
        SyncLeaseRepo::release(&self.pool, id, kind)
            .await
            .map_err(store_error)
    }

    async fn record_success(
        &self,
        id: DbId,
        status: ConnectionStatus,
        finished_at: Timestamp,
        advance_schedule: bool,
    ) -> SyncResult<()> {
        ConnectionRepo::record_success(&self.pool, id, status, finished_at, advance_schedule)
            .await
            .map_err(store_error)
    }

    async fn record_failure(
        &self,
        id: DbId,
        status: ConnectionStatus,
        error: &str,
        failed_at: Timestamp,
        advance_schedule: bool,
    ) -> SyncResult<()> {
        ConnectionRepo::record_failure(&self.pool, id, status, error, failed_at, advance_schedule)
            .await
            .map_err(store_error)
    }

    async fn update_tokens(&self, id: DbId, tokens: &TokenUpdate) -> SyncResult<()> {
        ConnectionRepo::update_tokens(&self.pool, id, tokens)
            .await
            .map_err(store_error)
    }

    async fn stage(&self, kind: StagingKind, input: &StageInput<'_>) -> SyncResult<StagedUpsert> {
        StagingRepo::upsert(&self.pool, kind, input)
            .await
            .map_err(store_error)
    }

    async fn invalidate_staged(
        &self,
        kind: StagingKind,
        connection_id: DbId,
        external_id: &str,
    ) -> SyncResult<()> {
        StagingRepo::invalidate_hash(&self.pool, kind, connection_id, external_id)
            .await
            .map_err(store_error)
    }

    async fn staged(
        &self,
        kind: StagingKind,
        connection_id: DbId,
        external_id: &str,
    ) -> SyncResult<Option<StagingRecord>> {
        StagingRepo::find(&self.pool, kind, connection_id, external_id)
            .await
            .map_err(store_error)
    }

    async fn retire_missing(
        &self,
        kind: StagingKind,
        connection_id: DbId,
        seen: &[String],
    ) -> SyncResult<Vec<StagingRecord>> {
        StagingRepo::retire_missing(&self.pool, kind, connection_id, seen)
            .await
            .map_err(store_error)
    }

    async fn staged_rooms(&self, connection_id: DbId) -> SyncResult<Vec<StagedRoom>> {
        StagingRepo::list_staged_rooms(&self.pool, connection_id)
            .await
            .map_err(store_error)
    }

    async fn mapping(
        &self,
        connection_id: DbId,
        external_type: &str,
        external_id: &str,
    ) -> SyncResult<Option<Mapping>> {
        MappingRepo::find(&self.pool, connection_id, external_type, external_id)
            .await
            .map_err(store_error)
    }

    async fn create_mapped(
        &self,
        record: &UnmappedRecord<'_>,
        insert: &CanonicalInsert<'_>,
    ) -> SyncResult<Mapping> {
        MappingRepo::create_with_canonical(&self.pool, record, insert)
            .await
            .map_err(store_error)
    }

    async fn update_property(&self, id: DbId, input: &PropertyWrite) -> SyncResult<bool> {
        PropertyRepo::update(&self.pool, id, input)
            .await
            .map_err(store_error)
    }

    async fn set_property_active(&self, id: DbId, active: bool) -> SyncResult<bool> {
        PropertyRepo::set_active(&self.pool, id, active)
            .await
            .map_err(store_error)
    }

    async fn update_unit(&self, id: DbId, input: &UnitWrite) -> SyncResult<bool> {
        UnitRepo::update(&self.pool, id, input)
            .await
            .map_err(store_error)
    }

    async fn set_unit_active(&self, id: DbId, active: bool) -> SyncResult<bool> {
        UnitRepo::set_active(&self.pool, id, active)
            .await
            .map_err(store_error)
    }

    async fn update_booking(&self, id: DbId, input: &BookingWrite) -> SyncResult<bool> {
        BookingRepo::update(&self.pool, id, input)
            .await
            .map_err(store_error)
    }

    async fn upsert_availability(
        &self,
        unit_id: DbId,
        input: &AvailabilityWrite,
    ) -> SyncResult<bool> {
        AvailabilityRepo::upsert(&self.pool, unit_id, input)
            .await
            .map_err(store_error)
    }

    async fn reconfirm_availability(
        &self,
        unit_id: DbId,
        input: &AvailabilityWrite,
    ) -> SyncResult<bool> {
        AvailabilityRepo::reconfirm(&self.pool, unit_id, input)
            .await
            .map_err(store_error)
    }

    async fn upsert_rate(&self, unit_id: DbId, input: &RateWrite) -> SyncResult<bool> {
        AvailabilityRepo::upsert_rate(&self.pool, unit_id, input)
            .await
            .map_err(store_error)
    }

    async fn insert_webhook_event(
        &self,
        input: &NewWebhookEvent,
    ) -> SyncResult<Option<WebhookEvent>> {
        WebhookEventRepo::insert_if_new(&self.pool, input)
            .await
            .map_err(store_error)
    }

    async fn webhook_event(&self, id: DbId) -> SyncResult<Option<WebhookEvent>> {
        WebhookEventRepo::find_by_id(&self.pool, id)
            .await
            .map_err(store_error)
    }

    async fn finish_webhook_event(
        &self,
        id: DbId,
        status: WebhookEventStatus,
        error: Option<&str>,
    ) -> SyncResult<()> {
        WebhookEventRepo::mark_finished(&self.pool, id, status, error)
            .await
            .map_err(store_error)
    }

    async fn begin_webhook_retry(&self, id: DbId) -> SyncResult<Option<WebhookEvent>> {
        WebhookEventRepo::begin_retry(&self.pool, id)
            .await
            .map_err(store_error)
    }

    async fn append_sync_log(&self, entry: &NewSyncLogEntry) -> SyncResult<SyncLogEntry> {
        SyncLogRepo::append(&self.pool, entry)
            .await
            .map_err(store_error)
    }

    async fn query_sync_logs(&self, query: &SyncLogQuery) -> SyncResult<Vec<SyncLogEntry>> {
        SyncLogRepo::query(&self.pool, query)
            .await
            .map_err(store_error)
    }
}
