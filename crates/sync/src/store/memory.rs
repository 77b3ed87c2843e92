//! In-memory [`SyncStore`] for tests.
//!
//! Mirrors the PostgreSQL semantics the engine relies on: staging upserts
//! report the previous hash, availability writes are most-recent-wins on
//! `source_at`, webhook events dedupe on `(connection_id, provider_event_id)`
//! and sync leases are per kind and expire. Availability writes can be made to fail or
//! stall to exercise recovery paths.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use staysync_core::availability::AvailabilitySource;
use staysync_core::cadence::SyncKind;
use staysync_core::connection::ConnectionStatus;
use staysync_core::pagination::{clamp_limit, clamp_offset, DEFAULT_LIMIT, MAX_LIMIT};
use staysync_core::sync_error::{SyncError, SyncResult};
use staysync_core::types::{DbId, Day, Timestamp};
use staysync_db::models::connection::{Connection, TokenUpdate};
use staysync_db::models::inventory::{
    AvailabilityDay, AvailabilityWrite, Booking, BookingWrite, Property, PropertyWrite, RateWrite,
    Unit, UnitWrite,
};
use staysync_db::models::mapping::{
    CanonicalInsert, Mapping, NewMapping, UnmappedRecord, EXTERNAL_ROOM_TYPE,
};
use staysync_db::models::staging::{
    StageInput, StagedRoom, StagedUpsert, StagingKind, StagingRecord,
};
use staysync_db::models::sync_log::{NewSyncLogEntry, SyncLogEntry, SyncLogQuery};
use staysync_db::models::webhook_event::{NewWebhookEvent, WebhookEvent, WebhookEventStatus};

use super::SyncStore;

type StagingKey = (StagingKind, DbId, String);

#[derive(Default)]
struct Inner {
    next_id: DbId,
    connections: BTreeMap<DbId, Connection>,
    staging: HashMap<StagingKey, StagingRecord>,
    mappings: Vec<Mapping>,
    properties: BTreeMap<DbId, Property>,
    units: BTreeMap<DbId, Unit>,
    bookings: BTreeMap<DbId, Booking>,
    availability: BTreeMap<(DbId, Day), AvailabilityDay>,
    webhook_events: BTreeMap<DbId, WebhookEvent>,
    sync_logs: Vec<SyncLogEntry>,
    canonical_writes: u64,
    leases: HashMap<(DbId, SyncKind), Timestamp>,
    fail_availability: bool,
    fail_mappings: bool,
    availability_delay: Option<Duration>,
    fail_connection_lookups: bool,
    fail_webhook_inserts: bool,
    webhook_insert_delay: Option<Duration>,
}

impl Inner {
    fn id(&mut self) -> DbId {
        self.next_id += 1;
        self.next_id
    }

    fn find_mapping(&self, connection_id: DbId, external_type: &str, external_id: &str) -> Option<&Mapping> {
        self.mappings.iter().find(|m| {
            m.connection_id == connection_id
                && m.external_type == external_type
                && m.external_id == external_id
        })
    }

    fn push_mapping(&mut self, input: &NewMapping) -> Mapping {
        let now = Utc::now();
        let mapping = Mapping {
            id: self.id(),
            connection_id: input.connection_id,
            external_type: input.external_type.clone(),
            external_id: input.external_id.clone(),
            canonical_type: input.canonical_type.clone(),
            canonical_id: input.canonical_id,
            auto_sync: true,
            created_at: now,
            updated_at: now,
        };
        self.mappings.push(mapping.clone());
        mapping
    }
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // -- Fixtures and inspection ------------------------------------------

    /// Add an enabled `pending` connection holding a valid access token.
    pub fn add_connection(&self, provider: &str, credentials: Value) -> Connection {
        let mut inner = self.inner();
        let now = Utc::now();
        let connection = Connection {
            id: inner.id(),
            account_id: 1,
            provider: provider.to_string(),
            display_name: None,
            credentials,
            access_token: Some("access-token".to_string()),
            refresh_token: None,
            token_expires_at: None,
            status: ConnectionStatus::Pending.as_str().to_string(),
            sync_enabled: true,
            sync_interval_secs: 3600,
            requests_per_minute: None,
            last_sync_at: None,
            next_sync_at: None,
            last_error: None,
            last_error_at: None,
            created_at: now,
            updated_at: now,
        };
        inner.connections.insert(connection.id, connection.clone());
        connection
    }

    pub fn update_connection(&self, id: DbId, edit: impl FnOnce(&mut Connection)) {
        if let Some(connection) = self.inner().connections.get_mut(&id) {
            edit(connection);
        }
    }

    /// Whether a run of `kind` currently holds the connection's lease.
    pub fn is_locked(&self, id: DbId, kind: SyncKind) -> bool {
        let now = Utc::now();
        self.inner()
            .leases
            .get(&(id, kind))
            .is_some_and(|until| *until >= now)
    }

    /// Number of leases held on the connection across all kinds.
    pub fn held_leases(&self, id: DbId) -> usize {
        self.inner().leases.keys().filter(|(c, _)| *c == id).count()
    }

    pub fn property(&self, id: DbId) -> Option<Property> {
        self.inner().properties.get(&id).cloned()
    }

    pub fn unit(&self, id: DbId) -> Option<Unit> {
        self.inner().units.get(&id).cloned()
    }

    pub fn booking(&self, id: DbId) -> Option<Booking> {
        self.inner().bookings.get(&id).cloned()
    }

    pub fn mappings(&self) -> Vec<Mapping> {
        self.inner().mappings.clone()
    }

    /// Map an external record to an existing canonical row, as a user would.
    pub fn add_mapping(&self, input: &NewMapping) -> Mapping {
        let mut inner = self.inner();
        if let Some(existing) =
            inner.find_mapping(input.connection_id, &input.external_type, &input.external_id)
        {
            return existing.clone();
        }
        inner.push_mapping(input)
    }

    pub fn set_auto_sync(&self, mapping_id: DbId, auto_sync: bool) {
        if let Some(m) = self.inner().mappings.iter_mut().find(|m| m.id == mapping_id) {
            m.auto_sync = auto_sync;
        }
    }

    pub fn availability_day(&self, unit_id: DbId, day: Day) -> Option<AvailabilityDay> {
        self.inner().availability.get(&(unit_id, day)).cloned()
    }

    pub fn availability_rows(&self) -> usize {
        self.inner().availability.len()
    }

    pub fn sync_logs(&self) -> Vec<SyncLogEntry> {
        self.inner().sync_logs.clone()
    }

    pub fn webhook_events(&self) -> Vec<WebhookEvent> {
        self.inner().webhook_events.values().cloned().collect()
    }

    /// Number of canonical property/unit/booking inserts and updates so far.
    pub fn canonical_writes(&self) -> u64 {
        self.inner().canonical_writes
    }

    /// Make every `availability_days` write fail with a `NETWORK` error.
    pub fn fail_availability_writes(&self, fail: bool) {
        self.inner().fail_availability = fail;
    }

    /// Make every canonical create-and-map fail before anything is written.
    pub fn fail_mapping_writes(&self, fail: bool) {
        self.inner().fail_mappings = fail;
    }

    /// Delay every `availability_days` write.
    pub fn delay_availability_writes(&self, delay: Option<Duration>) {
        self.inner().availability_delay = delay;
    }

    /// Make every connection lookup fail with a `NETWORK` error.
    pub fn fail_connection_lookups(&self, fail: bool) {
        self.inner().fail_connection_lookups = fail;
    }

    /// Make every webhook event insert fail with a `NETWORK` error.
    pub fn fail_webhook_inserts(&self, fail: bool) {
        self.inner().fail_webhook_inserts = fail;
    }

    /// Delay every webhook event insert.
    pub fn delay_webhook_inserts(&self, delay: Option<Duration>) {
        self.inner().webhook_insert_delay = delay;
    }

    async fn before_availability_write(&self) -> SyncResult<()> {
        let (fail, delay) = {
            let inner = self.inner();
            (inner.fail_availability, inner.availability_delay)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if fail {
            return Err(SyncError::network("availability store unavailable"));
        }
        Ok(())
    }
}

fn chrono_duration(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or_else(|_| chrono::Duration::days(365))
}

fn property_row(id: DbId, account_id: DbId, connection_id: DbId, w: &PropertyWrite) -> Property {
    let now = Utc::now();
    Property {
        id,
        account_id,
        connection_id,
        name: w.name.clone(),
        description: w.description.clone(),
        address: w.address.clone(),
        city: w.city.clone(),
        country_code: w.country_code.clone(),
        latitude: w.latitude,
        longitude: w.longitude,
        currency: w.currency.clone(),
        timezone: w.timezone.clone(),
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

fn unit_row(id: DbId, property_id: DbId, w: &UnitWrite) -> Unit {
    let now = Utc::now();
    Unit {
        id,
        property_id,
        name: w.name.clone(),
        max_occupancy: w.max_occupancy,
        bedrooms: w.bedrooms,
        bathrooms: w.bathrooms,
        bed_configuration: w
            .bed_configuration
            .clone()
            .unwrap_or_else(|| Value::Array(Vec::new())),
        quantity: w.quantity,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

fn booking_row(id: DbId, connection_id: DbId, w: &BookingWrite) -> Booking {
    let now = Utc::now();
    Booking {
        id,
        connection_id,
        unit_id: w.unit_id,
        external_reference: w.external_reference.clone(),
        status: w.status.clone(),
        arrival: w.arrival,
        departure: w.departure,
        guest_name: w.guest_name.clone(),
        adults: w.adults,
        children: w.children,
        total_price: w.total_price,
        currency: w.currency.clone(),
        created_at: now,
        updated_at: now,
    }
}

fn empty_day(id: DbId, unit_id: DbId, day: Day) -> AvailabilityDay {
    let now = Utc::now();
    AvailabilityDay {
        id,
        unit_id,
        day,
        available: true,
        units_available: None,
        source: AvailabilitySource::Sync.as_str().to_string(),
        source_at: DateTime::UNIX_EPOCH,
        price: None,
        min_stay: None,
        rates_synced_at: None,
        created_at: now,
        updated_at: now,
    }
}

#[async_trait]
impl SyncStore for MemoryStore {
    async fn ping(&self) -> SyncResult<()> {
        Ok(())
    }

    async fn connection(&self, id: DbId) -> SyncResult<Option<Connection>> {
        let inner = self.inner();
        if inner.fail_connection_lookups {
            return Err(SyncError::network("connection store unavailable"));
        }
        Ok(inner.connections.get(&id).cloned())
    }

    async fn schedulable_connections(&self) -> SyncResult<Vec<Connection>> {
        Ok(self
            .inner()
            .connections
            .values()
            .filter(|c| c.is_schedulable())
            .cloned()
            .collect())
    }

    async fn due_connections(&self, now: Timestamp) -> SyncResult<Vec<Connection>> {
        let mut due: Vec<Connection> = self
            .inner()
            .connections
            .values()
            .filter(|c| c.is_schedulable() && c.next_sync_at.map_or(true, |at| at <= now))
            .cloned()
            .collect();
        due.sort_by_key(|c| (c.next_sync_at.is_some(), c.next_sync_at, c.id));
        Ok(due)
    }

    async fn try_lock(&self, id: DbId, kind: SyncKind, lease: Duration) -> SyncResult<bool> {
        let now = Utc::now();
        let mut inner = self.inner();
        if !inner.connections.contains_key(&id) {
            return Ok(false);
        }
        if inner.leases.get(&(id, kind)).is_some_and(|until| *until >= now) {
            return Ok(false);
        }
        inner.leases.insert((id, kind), now + chrono_duration(lease));
        Ok(true)
    }

    async fn unlock(&self, id: DbId, kind: SyncKind) -> SyncResult<()> {
        self.inner().leases.remove(&(id, kind));
        Ok(())
    }

    async fn record_success(
        &self,
        id: DbId,
        status: ConnectionStatus,
        finished_at: Timestamp,
        advance_schedule: bool,
    ) -> SyncResult<()> {
        if let Some(c) = self.inner().connections.get_mut(&id) {
            c.status = status.as_str().to_string();
            c.last_sync_at = Some(finished_at);
            c.last_error = None;
            c.last_error_at = None;
            if advance_schedule {
                c.next_sync_at =
                    Some(finished_at + chrono::Duration::seconds(i64::from(c.sync_interval_secs)));
            }
        }
        Ok(())
    }

    async fn record_failure(
        &self,
        id: DbId,
        status: ConnectionStatus,
        error: &str,
        failed_at: Timestamp,
        advance_schedule: bool,
    ) -> SyncResult<()> {
        if let Some(c) = self.inner().connections.get_mut(&id) {
            c.status = status.as_str().to_string();
            c.last_error = Some(error.to_string());
            c.last_error_at = Some(failed_at);
            if advance_schedule {
                c.next_sync_at =
                    Some(failed_at + chrono::Duration::seconds(i64::from(c.sync_interval_secs)));
            }
        }
        Ok(())
    }

    async fn update_tokens(&self, id: DbId, tokens: &TokenUpdate) -> SyncResult<()> {
        if let Some(c) = self.inner().connections.get_mut(&id) {
            c.access_token = Some(tokens.access_token.clone());
            if let Some(refresh) = &tokens.refresh_token {
                c.refresh_token = Some(refresh.clone());
            }
            c.token_expires_at = tokens.expires_at;
        }
        Ok(())
    }

    async fn stage(&self, kind: StagingKind, input: &StageInput<'_>) -> SyncResult<StagedUpsert> {
        let now = Utc::now();
        let mut inner = self.inner();
        let key = (kind, input.connection_id, input.external_id.to_string());
        if let Some(record) = inner.staging.get_mut(&key) {
            let previous = StagedUpsert {
                previous_hash: Some(record.sync_hash.clone()),
                canonical_id: record.canonical_id,
            };
            record.parent_external_id = input.parent_external_id.map(str::to_string);
            record.payload = input.payload.clone();
            record.sync_hash = input.sync_hash.to_string();
            record.synced_at = now;
            record.removed_at = None;
            record.updated_at = now;
            return Ok(previous);
        }
        let record = StagingRecord {
            id: inner.id(),
            connection_id: input.connection_id,
            external_id: input.external_id.to_string(),
            parent_external_id: input.parent_external_id.map(str::to_string),
            payload: input.payload.clone(),
            sync_hash: input.sync_hash.to_string(),
            canonical_id: None,
            synced_at: now,
            removed_at: None,
            created_at: now,
            updated_at: now,
        };
        inner.staging.insert(key, record);
        Ok(StagedUpsert {
            previous_hash: None,
            canonical_id: None,
        })
    }

    async fn invalidate_staged(
        &self,
        kind: StagingKind,
        connection_id: DbId,
        external_id: &str,
    ) -> SyncResult<()> {
        let key = (kind, connection_id, external_id.to_string());
        if let Some(record) = self.inner().staging.get_mut(&key) {
            record.sync_hash.clear();
        }
        Ok(())
    }

    async fn staged(
        &self,
        kind: StagingKind,
        connection_id: DbId,
        external_id: &str,
    ) -> SyncResult<Option<StagingRecord>> {
        let key = (kind, connection_id, external_id.to_string());
        Ok(self.inner().staging.get(&key).cloned())
    }

    async fn retire_missing(
        &self,
        kind: StagingKind,
        connection_id: DbId,
        seen: &[String],
    ) -> SyncResult<Vec<StagingRecord>> {
        let now = Utc::now();
        let mut retired = Vec::new();
        for ((k, conn, external_id), record) in self.inner().staging.iter_mut() {
            if *k == kind
                && *conn == connection_id
                && record.removed_at.is_none()
                && !seen.contains(external_id)
            {
                record.removed_at = Some(now);
                record.sync_hash.clear();
                retired.push(record.clone());
            }
        }
        Ok(retired)
    }

    async fn staged_rooms(&self, connection_id: DbId) -> SyncResult<Vec<StagedRoom>> {
        let inner = self.inner();
        let mut rooms: Vec<StagedRoom> = inner
            .staging
            .iter()
            .filter(|((kind, conn, _), record)| {
                *kind == StagingKind::RoomType
                    && *conn == connection_id
                    && record.removed_at.is_none()
            })
            .map(|(_, record)| {
                let mapping = inner.mappings.iter().find(|m| {
                    m.connection_id == connection_id
                        && m.external_type == EXTERNAL_ROOM_TYPE
                        && m.external_id == record.external_id
                });
                StagedRoom {
                    property_external_id: record.parent_external_id.clone(),
                    room_external_id: record.external_id.clone(),
                    unit_id: mapping.map(|m| m.canonical_id),
                    auto_sync: mapping.map(|m| m.auto_sync),
                }
            })
            .collect();
        rooms.sort_by(|a, b| a.room_external_id.cmp(&b.room_external_id));
        Ok(rooms)
    }

    async fn mapping(
        &self,
        connection_id: DbId,
        external_type: &str,
        external_id: &str,
    ) -> SyncResult<Option<Mapping>> {
        Ok(self
            .inner()
            .mappings
            .iter()
            .find(|m| {
                m.connection_id == connection_id
                    && m.external_type == external_type
                    && m.external_id == external_id
            })
            .cloned())
    }

    async fn create_mapped(
        &self,
        record: &UnmappedRecord<'_>,
        insert: &CanonicalInsert<'_>,
    ) -> SyncResult<Mapping> {
        let mut inner = self.inner();
        if let Some(existing) = inner.find_mapping(
            record.connection_id,
            record.external_type,
            record.external_id,
        ) {
            return Ok(existing.clone());
        }
        if inner.fail_mappings {
            return Err(SyncError::network("mapping store unavailable"));
        }

        let canonical_id = inner.id();
        match *insert {
            CanonicalInsert::Property { account_id, input } => {
                let row = property_row(canonical_id, account_id, record.connection_id, input);
                inner.properties.insert(canonical_id, row);
            }
            CanonicalInsert::Unit { property_id, input } => {
                inner
                    .units
                    .insert(canonical_id, unit_row(canonical_id, property_id, input));
            }
            CanonicalInsert::Booking { input } => {
                let row = booking_row(canonical_id, record.connection_id, input);
                inner.bookings.insert(canonical_id, row);
            }
        }
        inner.canonical_writes += 1;

        let key = (record.kind, record.connection_id, record.external_id.to_string());
        if let Some(staged) = inner.staging.get_mut(&key) {
            staged.canonical_id = Some(canonical_id);
        }
        Ok(inner.push_mapping(&NewMapping {
            connection_id: record.connection_id,
            external_type: record.external_type.to_string(),
            external_id: record.external_id.to_string(),
            canonical_type: insert.canonical_type().to_string(),
            canonical_id,
        }))
    }

    async fn update_property(&self, id: DbId, input: &PropertyWrite) -> SyncResult<bool> {
        let mut inner = self.inner();
        let Some(existing) = inner.properties.get(&id).cloned() else {
            return Ok(false);
        };
        let mut row = property_row(id, existing.account_id, existing.connection_id, input);
        row.created_at = existing.created_at;
        inner.properties.insert(id, row);
        inner.canonical_writes += 1;
        Ok(true)
    }

    async fn set_property_active(&self, id: DbId, active: bool) -> SyncResult<bool> {
        Ok(match self.inner().properties.get_mut(&id) {
            Some(p) => {
                p.is_active = active;
                true
            }
            None => false,
        })
    }

    async fn update_unit(&self, id: DbId, input: &UnitWrite) -> SyncResult<bool> {
        let mut inner = self.inner();
        let Some(existing) = inner.units.get(&id).cloned() else {
            return Ok(false);
        };
        let mut row = unit_row(id, existing.property_id, input);
        row.created_at = existing.created_at;
        inner.units.insert(id, row);
        inner.canonical_writes += 1;
        Ok(true)
    }

    async fn set_unit_active(&self, id: DbId, active: bool) -> SyncResult<bool> {
        Ok(match self.inner().units.get_mut(&id) {
            Some(u) => {
                u.is_active = active;
                true
            }
            None => false,
        })
    }

    async fn update_booking(&self, id: DbId, input: &BookingWrite) -> SyncResult<bool> {
        let mut inner = self.inner();
        let Some(existing) = inner.bookings.get(&id).cloned() else {
            return Ok(false);
        };
        let mut row = booking_row(id, existing.connection_id, input);
        row.created_at = existing.created_at;
        inner.bookings.insert(id, row);
        inner.canonical_writes += 1;
        Ok(true)
    }

    async fn upsert_availability(
        &self,
        unit_id: DbId,
        input: &AvailabilityWrite,
    ) -> SyncResult<bool> {
        self.before_availability_write().await?;
        let mut inner = self.inner();
        let id = inner.id();
        let row = inner
            .availability
            .entry((unit_id, input.day))
            .or_insert_with(|| empty_day(id, unit_id, input.day));
        if row.source_at > input.source_at {
            return Ok(false);
        }
        row.available = input.available;
        row.units_available = input.units_available.or(row.units_available);
        row.source = input.source.as_str().to_string();
        row.source_at = input.source_at;
        row.updated_at = Utc::now();
        Ok(true)
    }

    async fn reconfirm_availability(
        &self,
        unit_id: DbId,
        input: &AvailabilityWrite,
    ) -> SyncResult<bool> {
        self.before_availability_write().await?;
        let mut inner = self.inner();
        let Some(row) = inner.availability.get_mut(&(unit_id, input.day)) else {
            return Ok(false);
        };
        if row.source == AvailabilitySource::Sync.as_str() || row.source_at > input.source_at {
            return Ok(false);
        }
        row.available = input.available;
        row.units_available = input.units_available.or(row.units_available);
        row.source = AvailabilitySource::Sync.as_str().to_string();
        row.source_at = input.source_at;
        row.updated_at = Utc::now();
        Ok(true)
    }

    async fn upsert_rate(&self, unit_id: DbId, input: &RateWrite) -> SyncResult<bool> {
        self.before_availability_write().await?;
        let mut inner = self.inner();
        let id = inner.id();
        let row = inner
            .availability
            .entry((unit_id, input.day))
            .or_insert_with(|| empty_day(id, unit_id, input.day));
        if row.rates_synced_at.is_some_and(|at| at > input.synced_at) {
            return Ok(false);
        }
        row.price = input.price;
        row.min_stay = input.min_stay;
        row.rates_synced_at = Some(input.synced_at);
        Ok(true)
    }

    async fn insert_webhook_event(
        &self,
        input: &NewWebhookEvent,
    ) -> SyncResult<Option<WebhookEvent>> {
        let (fail, delay) = {
            let inner = self.inner();
            (inner.fail_webhook_inserts, inner.webhook_insert_delay)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if fail {
            return Err(SyncError::network("webhook store unavailable"));
        }
        let mut inner = self.inner();
        let duplicate = inner.webhook_events.values().any(|e| {
            e.connection_id == input.connection_id
                && e.provider_event_id == input.provider_event_id
        });
        if duplicate {
            return Ok(None);
        }
        let now = Utc::now();
        let event = WebhookEvent {
            id: inner.id(),
            connection_id: input.connection_id,
            provider: input.provider.clone(),
            provider_event_id: input.provider_event_id.clone(),
            event_type: input.event_type.clone(),
            payload: input.payload.clone(),
            status: WebhookEventStatus::Received.as_str().to_string(),
            error: None,
            retry_count: 0,
            received_at: now,
            processed_at: None,
            updated_at: now,
        };
        inner.webhook_events.insert(event.id, event.clone());
        Ok(Some(event))
    }

    async fn webhook_event(&self, id: DbId) -> SyncResult<Option<WebhookEvent>> {
        Ok(self.inner().webhook_events.get(&id).cloned())
    }

    async fn finish_webhook_event(
        &self,
        id: DbId,
        status: WebhookEventStatus,
        error: Option<&str>,
    ) -> SyncResult<()> {
        if let Some(event) = self.inner().webhook_events.get_mut(&id) {
            event.status = status.as_str().to_string();
            event.error = error.map(str::to_string);
            event.processed_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn begin_webhook_retry(&self, id: DbId) -> SyncResult<Option<WebhookEvent>> {
        Ok(self.inner().webhook_events.get_mut(&id).map(|event| {
            event.retry_count += 1;
            event.status = WebhookEventStatus::Received.as_str().to_string();
            event.error = None;
            event.clone()
        }))
    }

    async fn append_sync_log(&self, entry: &NewSyncLogEntry) -> SyncResult<SyncLogEntry> {
        let mut inner = self.inner();
        let row = SyncLogEntry {
            id: inner.id(),
            run_id: entry.run_id,
            connection_id: entry.connection_id,
            direction: entry.direction.as_str().to_string(),
            sync_kind: entry.sync_kind.clone(),
            entity_type: entry.entity_type.clone(),
            action: entry.action.clone(),
            status: entry.status.as_str().to_string(),
            processed: entry.counts.processed,
            created: entry.counts.created,
            updated: entry.counts.updated,
            unchanged: entry.counts.unchanged,
            skipped: entry.counts.skipped,
            deleted: entry.counts.deleted,
            failed: entry.counts.failed,
            error_kind: entry.error_kind.clone(),
            error_message: entry.error_message.clone(),
            request_snapshot: entry.request_snapshot.clone(),
            response_snapshot: entry.response_snapshot.clone(),
            started_at: entry.started_at,
            finished_at: entry.finished_at,
            duration_ms: entry.duration_ms(),
            created_at: Utc::now(),
        };
        inner.sync_logs.push(row.clone());
        Ok(row)
    }

    async fn query_sync_logs(&self, query: &SyncLogQuery) -> SyncResult<Vec<SyncLogEntry>> {
        let limit = clamp_limit(query.limit, DEFAULT_LIMIT, MAX_LIMIT) as usize;
        let offset = clamp_offset(query.offset) as usize;
        let mut rows: Vec<SyncLogEntry> = self
            .inner()
            .sync_logs
            .iter()
            .filter(|e| query.connection_id.map_or(true, |id| e.connection_id == id))
            .filter(|e| query.status.as_deref().map_or(true, |s| e.status == s))
            .filter(|e| query.from.map_or(true, |from| e.created_at >= from))
            .filter(|e| query.to.map_or(true, |to| e.created_at < to))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(rows.into_iter().skip(offset).take(limit).collect())
    }
}
