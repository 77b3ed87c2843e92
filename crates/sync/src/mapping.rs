//! Mapping & reconciliation engine.
//!
//! Every fetched record is staged verbatim with a content hash first. The
//! canonical write only happens when the hash changed (or the record was
//! never mapped), and never for records the user detached from automatic
//! sync. Categories are written independently: properties and room types
//! update canonical metadata, availability and rates update disjoint columns
//! of `availability_days`, reservations update bookings.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use staysync_channels::dto::{sync_hash, DayDto, PropertyDto, RateDto, ReservationDto, RoomTypeDto};
use staysync_core::availability::AvailabilitySource;
use staysync_core::reconcile::{decide, ReconcileAction, RecordOutcome};
use staysync_core::sync_error::{SyncError, SyncResult};
use staysync_core::types::{DbId, Timestamp};
use staysync_db::models::connection::Connection;
use staysync_db::models::inventory::{
    AvailabilityWrite, BookingWrite, PropertyWrite, RateWrite, UnitWrite,
};
use staysync_db::models::mapping::{
    CanonicalInsert, UnmappedRecord, EXTERNAL_PROPERTY, EXTERNAL_RESERVATION, EXTERNAL_ROOM_TYPE,
};
use staysync_db::models::staging::{StageInput, StagedRoom, StagingKind};

use crate::store::SyncStore;

/// A mapped room type whose unit receives availability and rate writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomTarget {
    pub property_external_id: String,
    pub room_external_id: String,
    pub unit_id: DbId,
    pub auto_sync: bool,
}

impl RoomTarget {
    /// `None` for staged rooms that were never mapped to a unit.
    pub fn from_staged(room: StagedRoom) -> Option<Self> {
        Some(Self {
            property_external_id: room.property_external_id.unwrap_or_default(),
            unit_id: room.unit_id?,
            auto_sync: room.auto_sync.unwrap_or(true),
            room_external_id: room.room_external_id,
        })
    }

    fn day_key(&self, day: impl std::fmt::Display) -> String {
        format!("{}:{day}", self.room_external_id)
    }
}

pub struct MappingEngine {
    store: Arc<dyn SyncStore>,
    connection_id: DbId,
    account_id: DbId,
}

impl MappingEngine {
    pub fn new(store: Arc<dyn SyncStore>, connection: &Connection) -> Self {
        Self {
            store,
            connection_id: connection.id,
            account_id: connection.account_id,
        }
    }

    // -----------------------------------------------------------------------
    // Metadata
    // -----------------------------------------------------------------------

    pub async fn reconcile_property(&self, dto: &PropertyDto) -> SyncResult<RecordOutcome> {
        let hash = sync_hash(dto);
        let payload = staged_payload(&dto.raw, dto);
        let staged = self
            .stage(StagingKind::Property, &dto.external_id, None, &payload, &hash)
            .await?;
        let mapping = self
            .store
            .mapping(self.connection_id, EXTERNAL_PROPERTY, &dto.external_id)
            .await?;

        let action = decide(staged.as_deref(), &hash, mapping.map(|m| m.as_ref()));
        let write = property_write(dto);
        let result = async {
            match action {
                ReconcileAction::Create => {
                    let insert = CanonicalInsert::Property {
                        account_id: self.account_id,
                        input: &write,
                    };
                    self.create(StagingKind::Property, EXTERNAL_PROPERTY, &dto.external_id, &insert)
                        .await
                }
                ReconcileAction::Update { canonical_id } => self
                    .store
                    .update_property(canonical_id, &write)
                    .await
                    .and_then(|found| require(found, "property", canonical_id)),
                _ => Ok(()),
            }
        }
        .await;
        self.settle(StagingKind::Property, &dto.external_id, action, result)
            .await
    }

    /// Requires the parent property to be mapped already. Until it is, the
    /// room type is only staged and reported as skipped.
    pub async fn reconcile_room_type(&self, dto: &RoomTypeDto) -> SyncResult<RecordOutcome> {
        let hash = sync_hash(dto);
        let payload = staged_payload(&dto.raw, dto);
        let staged = self
            .stage(
                StagingKind::RoomType,
                &dto.external_id,
                Some(&dto.property_external_id),
                &payload,
                &hash,
            )
            .await?;

        let Some(property) = self
            .store
            .mapping(self.connection_id, EXTERNAL_PROPERTY, &dto.property_external_id)
            .await?
        else {
            tracing::warn!(
                connection_id = self.connection_id,
                external_id = %dto.external_id,
                property_external_id = %dto.property_external_id,
                "Room type deferred until its property is mapped"
            );
            self.invalidate(StagingKind::RoomType, &dto.external_id).await;
            return Ok(RecordOutcome::Skipped);
        };
        let mapping = self
            .store
            .mapping(self.connection_id, EXTERNAL_ROOM_TYPE, &dto.external_id)
            .await?;

        let action = decide(staged.as_deref(), &hash, mapping.map(|m| m.as_ref()));
        let write = unit_write(dto);
        let result = async {
            match action {
                ReconcileAction::Create => {
                    let insert = CanonicalInsert::Unit {
                        property_id: property.canonical_id,
                        input: &write,
                    };
                    self.create(StagingKind::RoomType, EXTERNAL_ROOM_TYPE, &dto.external_id, &insert)
                        .await
                }
                ReconcileAction::Update { canonical_id } => self
                    .store
                    .update_unit(canonical_id, &write)
                    .await
                    .and_then(|found| require(found, "unit", canonical_id)),
                _ => Ok(()),
            }
        }
        .await;
        self.settle(StagingKind::RoomType, &dto.external_id, action, result)
            .await
    }

    /// Bookings for unmapped rooms are still recorded, without a unit.
    pub async fn reconcile_reservation(&self, dto: &ReservationDto) -> SyncResult<RecordOutcome> {
        let hash = sync_hash(dto);
        let payload = staged_payload(&dto.raw, dto);
        let staged = self
            .stage(
                StagingKind::Reservation,
                &dto.external_id,
                dto.room_external_id.as_deref(),
                &payload,
                &hash,
            )
            .await?;

        let unit_id = match &dto.room_external_id {
            Some(room) => self
                .store
                .mapping(self.connection_id, EXTERNAL_ROOM_TYPE, room)
                .await?
                .map(|m| m.canonical_id),
            None => None,
        };
        let mapping = self
            .store
            .mapping(self.connection_id, EXTERNAL_RESERVATION, &dto.external_id)
            .await?;

        let action = decide(staged.as_deref(), &hash, mapping.map(|m| m.as_ref()));
        let write = booking_write(dto, unit_id);
        let result = async {
            match action {
                ReconcileAction::Create => {
                    let insert = CanonicalInsert::Booking { input: &write };
                    self.create(StagingKind::Reservation, EXTERNAL_RESERVATION, &dto.external_id, &insert)
                        .await
                }
                ReconcileAction::Update { canonical_id } => self
                    .store
                    .update_booking(canonical_id, &write)
                    .await
                    .and_then(|found| require(found, "booking", canonical_id)),
                _ => Ok(()),
            }
        }
        .await;
        self.settle(StagingKind::Reservation, &dto.external_id, action, result)
            .await
    }

    // -----------------------------------------------------------------------
    // Calendar
    // -----------------------------------------------------------------------

    /// Write one fetched availability day, observed at `observed_at`.
    ///
    /// An unchanged hash still re-confirms a provisional webhook row older
    /// than the observation. A superseded write counts as skipped.
    pub async fn reconcile_availability_day(
        &self,
        room: &RoomTarget,
        dto: &DayDto,
        observed_at: Timestamp,
    ) -> SyncResult<RecordOutcome> {
        let key = room.day_key(dto.day);
        let hash = sync_hash(dto);
        let payload = staged_payload(&dto.raw, dto);
        let previous = self
            .stage(
                StagingKind::Availability,
                &key,
                Some(&room.room_external_id),
                &payload,
                &hash,
            )
            .await?;
        if !room.auto_sync {
            return Ok(RecordOutcome::Skipped);
        }

        let write = AvailabilityWrite {
            day: dto.day,
            available: dto.available,
            units_available: dto.units_available,
            source: AvailabilitySource::Sync,
            source_at: observed_at,
        };
        let result = match previous.as_deref() {
            Some(h) if h == hash => self
                .store
                .reconfirm_availability(room.unit_id, &write)
                .await
                .map(|_| RecordOutcome::Unchanged),
            prev => self
                .store
                .upsert_availability(room.unit_id, &write)
                .await
                .map(|applied| written(applied, prev.is_none())),
        };
        self.settle_calendar(StagingKind::Availability, &key, result)
            .await
    }

    pub async fn reconcile_rate_day(
        &self,
        room: &RoomTarget,
        dto: &RateDto,
        observed_at: Timestamp,
    ) -> SyncResult<RecordOutcome> {
        let key = room.day_key(dto.day);
        let hash = sync_hash(dto);
        let payload = staged_payload(&dto.raw, dto);
        let previous = self
            .stage(StagingKind::Rate, &key, Some(&room.room_external_id), &payload, &hash)
            .await?;
        if !room.auto_sync {
            return Ok(RecordOutcome::Skipped);
        }
        if previous.as_deref() == Some(hash.as_str()) {
            return Ok(RecordOutcome::Unchanged);
        }

        let write = RateWrite {
            day: dto.day,
            price: dto.price,
            min_stay: dto.min_stay,
            synced_at: observed_at,
        };
        let result = self
            .store
            .upsert_rate(room.unit_id, &write)
            .await
            .map(|applied| written(applied, previous.is_none()));
        self.settle_calendar(StagingKind::Rate, &key, result).await
    }

    // -----------------------------------------------------------------------
    // Removal
    // -----------------------------------------------------------------------

    /// Mark staged properties absent from `seen` as removed and deactivate
    /// their auto-synced canonical properties. Returns how many were deactivated.
    pub async fn retire_missing_properties(&self, seen: &[String]) -> SyncResult<i32> {
        self.retire(StagingKind::Property, EXTERNAL_PROPERTY, seen).await
    }

    /// Same as [`Self::retire_missing_properties`] for room types and units.
    pub async fn retire_missing_room_types(&self, seen: &[String]) -> SyncResult<i32> {
        self.retire(StagingKind::RoomType, EXTERNAL_ROOM_TYPE, seen).await
    }

    async fn retire(&self, kind: StagingKind, external_type: &str, seen: &[String]) -> SyncResult<i32> {
        let retired = self
            .store
            .retire_missing(kind, self.connection_id, seen)
            .await?;
        let mut deactivated = 0;
        for record in retired {
            let Some(mapping) = self
                .store
                .mapping(self.connection_id, external_type, &record.external_id)
                .await?
            else {
                continue;
            };
            if !mapping.auto_sync {
                continue;
            }
            let changed = match kind {
                StagingKind::Property => {
                    self.store
                        .set_property_active(mapping.canonical_id, false)
                        .await?
                }
                _ => self.store.set_unit_active(mapping.canonical_id, false).await?,
            };
            if changed {
                tracing::info!(
                    connection_id = self.connection_id,
                    external_id = %record.external_id,
                    canonical_id = mapping.canonical_id,
                    entity = external_type,
                    "Deactivated entity no longer returned by provider"
                );
                deactivated += 1;
            }
        }
        Ok(deactivated)
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// Stage a record and return the hash stored before this write.
    async fn stage(
        &self,
        kind: StagingKind,
        external_id: &str,
        parent_external_id: Option<&str>,
        payload: &Value,
        hash: &str,
    ) -> SyncResult<Option<String>> {
        let input = StageInput {
            connection_id: self.connection_id,
            external_id,
            parent_external_id,
            payload,
            sync_hash: hash,
        };
        Ok(self.store.stage(kind, &input).await?.previous_hash)
    }

    async fn create(
        &self,
        kind: StagingKind,
        external_type: &str,
        external_id: &str,
        insert: &CanonicalInsert<'_>,
    ) -> SyncResult<()> {
        let record = UnmappedRecord {
            kind,
            connection_id: self.connection_id,
            external_type,
            external_id,
        };
        self.store.create_mapped(&record, insert).await.map(|_| ())
    }

    /// Turn a canonical write result into an outcome. A failed write clears
    /// the staged hash so the next run retries the record.
    async fn settle(
        &self,
        kind: StagingKind,
        external_id: &str,
        action: ReconcileAction,
        result: SyncResult<()>,
    ) -> SyncResult<RecordOutcome> {
        match result {
            Ok(()) => {
                if let ReconcileAction::Detached { canonical_id } = action {
                    tracing::debug!(
                        connection_id = self.connection_id,
                        external_id,
                        canonical_id,
                        "Detached record, canonical write skipped"
                    );
                }
                Ok(action.into())
            }
            Err(err) => {
                self.invalidate(kind, external_id).await;
                Err(err)
            }
        }
    }

    async fn settle_calendar(
        &self,
        kind: StagingKind,
        external_id: &str,
        result: SyncResult<RecordOutcome>,
    ) -> SyncResult<RecordOutcome> {
        if result.is_err() {
            self.invalidate(kind, external_id).await;
        }
        result
    }

    async fn invalidate(&self, kind: StagingKind, external_id: &str) {
        if let Err(e) = self
            .store
            .invalidate_staged(kind, self.connection_id, external_id)
            .await
        {
            tracing::error!(
                connection_id = self.connection_id,
                external_id,
                error = %e,
                "Failed to invalidate staged hash"
            );
        }
    }
}

fn written(applied: bool, first_sighting: bool) -> RecordOutcome {
    match (applied, first_sighting) {
        (false, _) => RecordOutcome::Skipped,
        (true, true) => RecordOutcome::Created,
        (true, false) => RecordOutcome::Updated,
    }
}

fn require(found: bool, entity: &str, id: DbId) -> SyncResult<()> {
    if found {
        Ok(())
    } else {
        Err(SyncError::unknown(format!("Mapped {entity} {id} no longer exists")))
    }
}

/// The provider object as received, or the DTO itself when no raw payload was kept.
fn staged_payload<T: Serialize>(raw: &Value, dto: &T) -> Value {
    if raw.is_null() {
        serde_json::to_value(dto).unwrap_or(Value::Null)
    } else {
        raw.clone()
    }
}

// ---------------------------------------------------------------------------
// DTO -> canonical writes
// ---------------------------------------------------------------------------

pub fn property_write(dto: &PropertyDto) -> PropertyWrite {
    PropertyWrite {
        name: dto.name.clone(),
        description: dto.description.clone(),
        address: dto.address.clone(),
        city: dto.city.clone(),
        country_code: dto.country_code.clone(),
        latitude: dto.latitude,
        longitude: dto.longitude,
        currency: dto.currency.clone(),
        timezone: dto.timezone.clone(),
    }
}

pub fn unit_write(dto: &RoomTypeDto) -> UnitWrite {
    UnitWrite {
        name: dto.name.clone(),
        max_occupancy: dto.max_occupancy,
        bedrooms: dto.bedrooms,
        bathrooms: dto.bathrooms,
        bed_configuration: dto.bed_configuration.clone(),
        quantity: dto.quantity.max(1),
    }
}

pub fn booking_write(dto: &ReservationDto, unit_id: Option<DbId>) -> BookingWrite {
    BookingWrite {
        unit_id,
        external_reference: dto.external_id.clone(),
        status: dto.status.as_str().to_string(),
        arrival: dto.arrival,
        departure: dto.departure,
        guest_name: dto.guest_name.clone(),
        adults: dto.adults,
        children: dto.children,
        total_price: dto.total_price,
        currency: dto.currency.clone(),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::{Duration, NaiveDate, Utc};
    use serde_json::json;
    use staysync_core::availability::BookingStatus;
    use staysync_core::sync_error::SyncErrorKind;

    use super::*;
    use crate::store::MemoryStore;

    fn setup() -> (Arc<MemoryStore>, MappingEngine) {
        let store = Arc::new(MemoryStore::new());
        let connection = store.add_connection("beds24", json!({}));
        let engine = MappingEngine::new(store.clone(), &connection);
        (store, engine)
    }

    fn villa(name: &str) -> PropertyDto {
        PropertyDto {
            external_id: "4521".into(),
            name: name.into(),
            raw: json!({"id": 4521, "name": name}),
            ..Default::default()
        }
    }

    fn room() -> RoomTypeDto {
        RoomTypeDto {
            external_id: "10919".into(),
            property_external_id: "4521".into(),
            name: "Double".into(),
            quantity: 1,
            ..Default::default()
        }
    }

    fn day(date: &str, available: bool) -> DayDto {
        DayDto {
            day: date.parse::<NaiveDate>().unwrap(),
            available,
            units_available: None,
            raw: Value::Null,
        }
    }

    async fn mapped_room(store: &MemoryStore, engine: &MappingEngine) -> RoomTarget {
        engine.reconcile_property(&villa("Beach Villa")).await.unwrap();
        engine.reconcile_room_type(&room()).await.unwrap();
        let rooms = store.staged_rooms(1).await.unwrap();
        RoomTarget::from_staged(rooms.into_iter().next().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn unchanged_property_is_not_rewritten() {
        let (store, engine) = setup();
        assert_eq!(
            engine.reconcile_property(&villa("Beach Villa")).await.unwrap(),
            RecordOutcome::Created
        );
        let writes = store.canonical_writes();
        assert_eq!(
            engine.reconcile_property(&villa("Beach Villa")).await.unwrap(),
            RecordOutcome::Unchanged
        );
        assert_eq!(store.canonical_writes(), writes);

        assert_eq!(
            engine.reconcile_property(&villa("Beach Villa II")).await.unwrap(),
            RecordOutcome::Updated
        );
        let mapping = &store.mappings()[0];
        assert_eq!(store.property(mapping.canonical_id).unwrap().name, "Beach Villa II");
    }

    #[tokio::test]
    async fn detached_property_updates_staging_only() {
        let (store, engine) = setup();
        engine.reconcile_property(&villa("Beach Villa")).await.unwrap();
        let mapping = store.mappings()[0].clone();
        store.set_auto_sync(mapping.id, false);

        let outcome = engine.reconcile_property(&villa("Renamed")).await.unwrap();
        assert_eq!(outcome, RecordOutcome::Skipped);
        assert_eq!(store.property(mapping.canonical_id).unwrap().name, "Beach Villa");
        let staged = store
            .staged(StagingKind::Property, 1, "4521")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(staged.sync_hash, sync_hash(&villa("Renamed")));
    }

    #[tokio::test]
    async fn room_type_without_property_is_deferred() {
        let (store, engine) = setup();
        assert_eq!(
            engine.reconcile_room_type(&room()).await.unwrap(),
            RecordOutcome::Skipped
        );
        assert!(store.mappings().is_empty());
        assert_eq!(store.canonical_writes(), 0);
        let staged = store
            .staged(StagingKind::RoomType, 1, "10919")
            .await
            .unwrap()
            .unwrap();
        assert!(staged.sync_hash.is_empty());

        engine.reconcile_property(&villa("Beach Villa")).await.unwrap();
        assert_eq!(
            engine.reconcile_room_type(&room()).await.unwrap(),
            RecordOutcome::Created
        );
    }

    #[tokio::test]
    async fn sync_reconfirms_provisional_webhook_row() {
        let (store, engine) = setup();
        let target = mapped_room(&store, &engine).await;
        let t0 = Utc::now();

        let open = day("2025-12-30", true);
        assert_eq!(
            engine.reconcile_availability_day(&target, &open, t0).await.unwrap(),
            RecordOutcome::Created
        );

        // A webhook blocks the night after the first sweep.
        let blocked = AvailabilityWrite {
            day: open.day,
            available: false,
            units_available: None,
            source: AvailabilitySource::Webhook,
            source_at: t0 + Duration::seconds(10),
        };
        store.upsert_availability(target.unit_id, &blocked).await.unwrap();

        // A newer sweep with the same provider state restores it.
        let outcome = engine
            .reconcile_availability_day(&target, &open, t0 + Duration::seconds(20))
            .await
            .unwrap();
        assert_eq!(outcome, RecordOutcome::Unchanged);
        let row = store.availability_day(target.unit_id, open.day).unwrap();
        assert!(row.available);
        assert_eq!(row.source, "sync");
    }

    #[tokio::test]
    async fn stale_sweep_does_not_clobber_newer_webhook() {
        let (store, engine) = setup();
        let target = mapped_room(&store, &engine).await;
        let t0 = Utc::now();
        let blocked = AvailabilityWrite {
            day: "2025-12-30".parse().unwrap(),
            available: false,
            units_available: None,
            source: AvailabilitySource::Webhook,
            source_at: t0,
        };
        store.upsert_availability(target.unit_id, &blocked).await.unwrap();

        let outcome = engine
            .reconcile_availability_day(&target, &day("2025-12-30", true), t0 - Duration::seconds(5))
            .await
            .unwrap();
        assert_eq!(outcome, RecordOutcome::Skipped);
        let row = store.availability_day(target.unit_id, blocked.day).unwrap();
        assert!(!row.available);
        assert_eq!(row.source, "webhook");
    }

    #[tokio::test]
    async fn failed_calendar_write_is_retried_next_run() {
        let (store, engine) = setup();
        let target = mapped_room(&store, &engine).await;
        let d = day("2025-12-30", false);

        store.fail_availability_writes(true);
        assert!(engine
            .reconcile_availability_day(&target, &d, Utc::now())
            .await
            .is_err());

        store.fail_availability_writes(false);
        let outcome = engine
            .reconcile_availability_day(&target, &d, Utc::now())
            .await
            .unwrap();
        assert_eq!(outcome, RecordOutcome::Updated);
        assert!(!store.availability_day(target.unit_id, d.day).unwrap().available);
    }

    #[tokio::test]
    async fn rates_leave_availability_alone() {
        let (store, engine) = setup();
        let target = mapped_room(&store, &engine).await;
        let d = day("2025-12-30", false);
        engine
            .reconcile_availability_day(&target, &d, Utc::now())
            .await
            .unwrap();

        let rate = RateDto {
            day: d.day,
            price: Some(120.0),
            min_stay: Some(2),
            currency: None,
            raw: Value::Null,
        };
        engine.reconcile_rate_day(&target, &rate, Utc::now()).await.unwrap();
        assert_eq!(
            engine.reconcile_rate_day(&target, &rate, Utc::now()).await.unwrap(),
            RecordOutcome::Unchanged
        );
        let row = store.availability_day(target.unit_id, d.day).unwrap();
        assert!(!row.available);
        assert_eq!(row.price, Some(120.0));
    }

    #[tokio::test]
    async fn reservation_links_mapped_unit() {
        let (store, engine) = setup();
        let target = mapped_room(&store, &engine).await;
        let dto = ReservationDto {
            external_id: "77".into(),
            property_external_id: Some("4521".into()),
            room_external_id: Some("10919".into()),
            status: BookingStatus::Confirmed,
            arrival: "2025-12-30".parse().unwrap(),
            departure: "2025-12-31".parse().unwrap(),
            guest_name: None,
            adults: Some(2),
            children: None,
            total_price: None,
            currency: None,
            raw: Value::Null,
        };
        assert_eq!(
            engine.reconcile_reservation(&dto).await.unwrap(),
            RecordOutcome::Created
        );
        let mapping = store
            .mapping(1, EXTERNAL_RESERVATION, "77")
            .await
            .unwrap()
            .unwrap();
        let booking = store.booking(mapping.canonical_id).unwrap();
        assert_eq!(booking.unit_id, Some(target.unit_id));
        assert_eq!(booking.status, "confirmed");
    }

    #[tokio::test]
    async fn missing_room_types_are_deactivated() {
        let (store, engine) = setup();
        let target = mapped_room(&store, &engine).await;

        let deactivated = engine.retire_missing_room_types(&[]).await.unwrap();
        assert_eq!(deactivated, 1);
        assert!(!store.unit(target.unit_id).unwrap().is_active);
        assert!(store.staged_rooms(1).await.unwrap().is_empty());

        // Seeing it again brings it back into the calendar sweep.
        let mut renamed = room();
        renamed.name = "Double Deluxe".into();
        engine.reconcile_room_type(&renamed).await.unwrap();
        assert_eq!(store.staged_rooms(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_create_leaves_no_orphan() {
        let (store, engine) = setup();
        store.fail_mapping_writes(true);
        let err = engine.reconcile_property(&villa("Beach Villa")).await.unwrap_err();
        assert_matches!(err.kind, SyncErrorKind::Network);
        assert_eq!(store.canonical_writes(), 0);
        assert!(store.mappings().is_empty());

        store.fail_mapping_writes(false);
        assert_eq!(
            engine.reconcile_property(&villa("Beach Villa")).await.unwrap(),
            RecordOutcome::Created
        );
        assert_eq!(store.canonical_writes(), 1);
        let mapping = &store.mappings()[0];
        let staged = store
            .staged(StagingKind::Property, 1, "4521")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(staged.canonical_id, Some(mapping.canonical_id));
    }

    #[tokio::test]
    async fn retired_property_reactivates_when_seen_again() {
        let (store, engine) = setup();
        engine.reconcile_property(&villa("Beach Villa")).await.unwrap();
        let canonical_id = store.mappings()[0].canonical_id;

        assert_eq!(engine.retire_missing_properties(&[]).await.unwrap(), 1);
        assert!(!store.property(canonical_id).unwrap().is_active);

        // Same content as before it disappeared.
        let outcome = engine.reconcile_property(&villa("Beach Villa")).await.unwrap();
        assert_eq!(outcome, RecordOutcome::Updated);
        assert!(store.property(canonical_id).unwrap().is_active);
        assert_eq!(store.mappings().len(), 1);

        assert_eq!(
            engine.reconcile_property(&villa("Beach Villa")).await.unwrap(),
            RecordOutcome::Unchanged
        );
    }

    #[tokio::test]
    async fn retired_room_type_reactivates_unchanged() {
        let (store, engine) = setup();
        let target = mapped_room(&store, &engine).await;
        engine.retire_missing_room_types(&[]).await.unwrap();

        engine.reconcile_room_type(&room()).await.unwrap();
        assert!(store.unit(target.unit_id).unwrap().is_active);
    }

    #[tokio::test]
    async fn detached_property_stays_untouched_on_return() {
        let (store, engine) = setup();
        engine.reconcile_property(&villa("Beach Villa")).await.unwrap();
        let mapping = store.mappings()[0].clone();
        store.set_auto_sync(mapping.id, false);

        assert_eq!(engine.retire_missing_properties(&[]).await.unwrap(), 0);
        assert_eq!(
            engine.reconcile_property(&villa("Beach Villa")).await.unwrap(),
            RecordOutcome::Skipped
        );
        assert!(store.property(mapping.canonical_id).unwrap().is_active);
    }
}
