//! One run of one [`SyncKind`] for one connection.
//!
//! A run takes the connection's lease for its kind, refreshes the access token when
//! it is about to expire, fetches every category the kind touches (skipping
//! capabilities the adapter lacks), reconciles each record through the
//! [`MappingEngine`], writes one Sync Log entry per category plus a run
//! summary, moves the connection through its state machine and releases the
//! lease.
//!
//! Record-level failures are counted and never abort a batch. A failed
//! category fetch marks the run failed but the remaining categories still
//! run. An `AUTH_FAILED` response halts the run.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use staysync_channels::adapter::{list_all_properties, ChannelAdapter};
use staysync_channels::capability::Capability;
use staysync_channels::dto::ReservationFilter;
use staysync_core::cadence::{Category, DateRange, SyncKind};
use staysync_core::connection::ConnectionStatus;
use staysync_core::reconcile::{RecordOutcome, SyncCounts};
use staysync_core::sync_error::{SyncError, SyncErrorKind, SyncResult};
use staysync_core::types::{DbId, Timestamp};
use staysync_db::models::connection::{Connection, TokenUpdate};
use staysync_db::models::sync_log::{NewSyncLogEntry, SyncLogStatus};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::mapping::{MappingEngine, RoomTarget};
use crate::source::AdapterSource;
use crate::store::SyncStore;
use crate::sync_log::{SyncLogBuilder, ENTITY_RUN};

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Why a run did not start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// A run of the same kind holds the connection's lease.
    AlreadyRunning,
    /// Disabled, or waiting on the user to re-authenticate.
    NotSchedulable,
    /// The access token could not be refreshed; the connection now needs attention.
    TokenRefreshFailed,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub connection_id: DbId,
    pub kind: SyncKind,
    pub status: SyncLogStatus,
    pub counts: SyncCounts,
    pub error: Option<SyncError>,
}

#[derive(Debug, Clone)]
pub enum RunOutcome {
    Completed(RunSummary),
    Skipped(SkipReason),
}

/// Answer to an on-demand start request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started { run_id: Uuid },
    AlreadyRunning,
}

/// What stopped a run before all categories were processed.
enum Halt {
    Refresh(SyncError),
    Fatal(SyncError),
}

/// Counters accumulated across the categories of one run.
#[derive(Default)]
struct RunTotals {
    counts: SyncCounts,
    /// First category-level fetch failure.
    fetch_error: Option<SyncError>,
}

/// One category's counters and its Sync Log entry.
struct Batch {
    log: SyncLogBuilder,
    counts: SyncCounts,
    last_error: Option<SyncError>,
    fetch_error: Option<SyncError>,
}

impl Batch {
    fn record(&mut self, result: SyncResult<RecordOutcome>) {
        match result {
            Ok(outcome) => self.counts.record(outcome),
            Err(e) => {
                self.counts.record_failure();
                self.last_error = Some(e);
            }
        }
    }

    /// Keep the first fetch failure. Returns `true` when the batch should stop.
    fn fetch_failed(&mut self, err: SyncError) -> bool {
        let halt = err.kind == SyncErrorKind::AuthFailed;
        if self.fetch_error.is_none() {
            self.fetch_error = Some(err);
        }
        halt
    }
}

/// Per-run state shared by the category steps.
struct RunContext<'a> {
    run_id: Uuid,
    kind: SyncKind,
    connection: &'a Connection,
    adapter: &'a dyn ChannelAdapter,
    engine: MappingEngine,
}

impl RunContext<'_> {
    fn batch(&self, category: Category) -> Batch {
        Batch {
            log: SyncLogBuilder::inbound(self.run_id, self.connection.id, category.as_str(), "fetch")
                .kind(self.kind),
            counts: SyncCounts::default(),
            last_error: None,
            fetch_error: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

pub struct SyncRunner {
    store: Arc<dyn SyncStore>,
    adapters: Arc<dyn AdapterSource>,
    config: EngineConfig,
    refresh_gates: Mutex<HashMap<DbId, Arc<tokio::sync::Mutex<()>>>>,
}

impl SyncRunner {
    pub fn new(store: Arc<dyn SyncStore>, adapters: Arc<dyn AdapterSource>, config: EngineConfig) -> Self {
        Self {
            store,
            adapters,
            config,
            refresh_gates: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run `kind` for a connection and wait for it to finish.
    pub async fn run(&self, connection_id: DbId, kind: SyncKind) -> SyncResult<RunOutcome> {
        let connection = self.load(connection_id).await?;
        if !runnable(&connection, kind) {
            tracing::debug!(connection_id, kind = %kind, status = %connection.status, "Connection not runnable");
            return Ok(RunOutcome::Skipped(SkipReason::NotSchedulable));
        }
        if !self.store.try_lock(connection_id, kind, self.config.lock_lease).await? {
            tracing::info!(connection_id, kind = %kind, "Same sync kind already running, skipping");
            return Ok(RunOutcome::Skipped(SkipReason::AlreadyRunning));
        }
        Ok(self.run_locked(connection, kind, Uuid::new_v4()).await)
    }

    /// Take the lease now and run `kind` in the background.
    pub async fn start(self: &Arc<Self>, connection_id: DbId, kind: SyncKind) -> SyncResult<StartOutcome> {
        let connection = self.load(connection_id).await?;
        if !runnable(&connection, kind) {
            return Err(SyncError::validation(format!(
                "Connection {connection_id} is {} and cannot sync",
                connection.status
            )));
        }
        if !self.store.try_lock(connection_id, kind, self.config.lock_lease).await? {
            return Ok(StartOutcome::AlreadyRunning);
        }

        let run_id = Uuid::new_v4();
        let runner = Arc::clone(self);
        tokio::spawn(async move {
            runner.run_locked(connection, kind, run_id).await;
        });
        Ok(StartOutcome::Started { run_id })
    }

    async fn load(&self, connection_id: DbId) -> SyncResult<Connection> {
        self.store
            .connection(connection_id)
            .await?
            .ok_or_else(|| SyncError::not_found(format!("Connection {connection_id} not found")))
    }

    /// Run with the lease already held; always releases it.
    async fn run_locked(&self, connection: Connection, kind: SyncKind, run_id: Uuid) -> RunOutcome {
        let started_at = Utc::now();
        tracing::info!(connection_id = connection.id, run_id = %run_id, kind = %kind, "Sync run started");

        let mut totals = RunTotals::default();
        let result = match tokio::time::timeout(
            self.config.run_timeout,
            self.execute(&connection, kind, run_id, &mut totals),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(Halt::Fatal(SyncError::timeout(format!(
                "Run exceeded {} s",
                self.config.run_timeout.as_secs()
            )))),
        };
        let outcome = self
            .finish(&connection, kind, run_id, started_at, totals, result)
            .await;

        if let Err(e) = self.store.unlock(connection.id, kind).await {
            tracing::error!(connection_id = connection.id, error = %e, "Failed to release sync lease");
        }
        outcome
    }

    async fn execute(
        &self,
        connection: &Connection,
        kind: SyncKind,
        run_id: Uuid,
        totals: &mut RunTotals,
    ) -> Result<(), Halt> {
        let (connection, adapter) = self.prepare(connection).await?;
        let cx = RunContext {
            run_id,
            kind,
            connection: &connection,
            adapter: adapter.as_ref(),
            engine: MappingEngine::new(Arc::clone(&self.store), &connection),
        };

        if kind.discovers_inventory() {
            self.sync_inventory(&cx, totals).await?;
        }
        if kind.touches(Category::Availability) || kind.touches(Category::Rate) {
            self.sync_calendar(&cx, totals).await?;
        }
        if kind.touches(Category::Reservation) {
            self.sync_reservations(&cx, totals).await?;
        }
        Ok(())
    }

    /// Build the adapter, refreshing the access token first when needed.
    async fn prepare(&self, connection: &Connection) -> Result<(Connection, Arc<dyn ChannelAdapter>), Halt> {
        let adapter = self.adapters.adapter_for(connection).await.map_err(Halt::Fatal)?;
        if !self.token_expiring(connection) || !adapter.supports(Capability::RefreshToken) {
            return Ok((connection.clone(), adapter));
        }

        // Runs of different kinds share the tokens; only one of them refreshes.
        let gate = self.refresh_gate(connection.id);
        let _refreshing = gate.lock().await;
        let mut connection = self.load(connection.id).await.map_err(Halt::Fatal)?;
        if !self.token_expiring(&connection) {
            let adapter = self.adapters.adapter_for(&connection).await.map_err(Halt::Fatal)?;
            return Ok((connection, adapter));
        }

        let refresh_token = connection.refresh_token.clone().unwrap_or_default();
        let grant = adapter
            .refresh_token(&refresh_token)
            .await
            .map_err(Halt::Refresh)?;
        let update = TokenUpdate {
            access_token: grant.access_token,
            refresh_token: grant.refresh_token,
            expires_at: grant.expires_at,
        };
        self.store
            .update_tokens(connection.id, &update)
            .await
            .map_err(Halt::Fatal)?;
        tracing::info!(connection_id = connection.id, "Access token refreshed");

        connection.access_token = Some(update.access_token);
        if let Some(rotated) = update.refresh_token {
            connection.refresh_token = Some(rotated);
        }
        connection.token_expires_at = update.expires_at;
        let adapter = self.adapters.adapter_for(&connection).await.map_err(Halt::Fatal)?;
        Ok((connection, adapter))
    }

    fn token_expiring(&self, connection: &Connection) -> bool {
        let skew = chrono::Duration::from_std(self.config.token_refresh_skew)
            .unwrap_or_else(|_| chrono::Duration::zero());
        connection.token_needs_refresh(Utc::now(), skew)
    }

    fn refresh_gate(&self, connection_id: DbId) -> Arc<tokio::sync::Mutex<()>> {
        let mut gates = self
            .refresh_gates
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(gates.entry(connection_id).or_default())
    }

    // -----------------------------------------------------------------------
    // Categories
    // -----------------------------------------------------------------------

    async fn sync_inventory(&self, cx: &RunContext<'_>, totals: &mut RunTotals) -> Result<(), Halt> {
        if !cx.adapter.supports(Capability::ListProperties) {
            tracing::debug!(connection_id = cx.connection.id, "Adapter cannot list properties, skipping inventory");
            return Ok(());
        }
        let mut properties = cx.batch(Category::Property);
        let mut rooms = cx.batch(Category::RoomType);

        match list_all_properties(cx.adapter).await {
            Err(e) => {
                properties.fetch_failed(e);
            }
            Ok(listed) => {
                let mut seen_properties = Vec::with_capacity(listed.len());
                let mut seen_rooms = Vec::new();
                for property in &listed {
                    seen_properties.push(property.external_id.clone());
                    properties.record(cx.engine.reconcile_property(property).await);

                    let room_types = if !property.room_types.is_empty() {
                        Ok(property.room_types.clone())
                    } else if cx.adapter.supports(Capability::ListRoomTypes) {
                        cx.adapter.list_room_types(&property.external_id).await
                    } else {
                        Ok(Vec::new())
                    };
                    match room_types {
                        Ok(room_types) => {
                            for room in &room_types {
                                seen_rooms.push(room.external_id.clone());
                                rooms.record(cx.engine.reconcile_room_type(room).await);
                            }
                        }
                        Err(e) => {
                            if rooms.fetch_failed(e) {
                                break;
                            }
                        }
                    }
                }

                if cx.kind == SyncKind::FullImport {
                    if listed.is_empty() {
                        tracing::warn!(
                            connection_id = cx.connection.id,
                            "Provider returned no properties, skipping removal detection",
                        );
                    } else {
                        match cx.engine.retire_missing_properties(&seen_properties).await {
                            Ok(n) => properties.counts.record_deleted(n),
                            Err(e) => properties.last_error = Some(e),
                        }
                        if rooms.fetch_error.is_none() {
                            match cx.engine.retire_missing_room_types(&seen_rooms).await {
                                Ok(n) => rooms.counts.record_deleted(n),
                                Err(e) => rooms.last_error = Some(e),
                            }
                        }
                    }
                }
            }
        }

        self.close(properties, totals).await?;
        self.close(rooms, totals).await
    }

    async fn sync_calendar(&self, cx: &RunContext<'_>, totals: &mut RunTotals) -> Result<(), Halt> {
        let availability = cx.kind.touches(Category::Availability)
            && cx.adapter.supports(Capability::GetAvailability);
        let rates = cx.kind.touches(Category::Rate) && cx.adapter.supports(Capability::GetRates);
        if !availability && !rates {
            tracing::debug!(connection_id = cx.connection.id, kind = %cx.kind, "Adapter has no calendar capabilities");
            return Ok(());
        }

        let rooms: Vec<RoomTarget> = self
            .store
            .staged_rooms(cx.connection.id)
            .await
            .map_err(Halt::Fatal)?
            .into_iter()
            .filter_map(RoomTarget::from_staged)
            .collect();
        let today = Utc::now().date_naive();
        let range = DateRange::for_horizon(today, cx.kind.horizon_days(&self.config.horizons));
        let request = json!({ "from": range.start, "to": range.end, "rooms": rooms.len() });

        if availability {
            let mut batch = cx.batch(Category::Availability);
            batch.log = batch.log.request(request.clone());
            for room in &rooms {
                let observed_at = Utc::now();
                match cx
                    .adapter
                    .get_availability(&room.property_external_id, &room.room_external_id, range)
                    .await
                {
                    Ok(days) => {
                        for day in days.iter().filter(|d| range.contains(d.day)) {
                            batch.record(
                                cx.engine
                                    .reconcile_availability_day(room, day, observed_at)
                                    .await,
                            );
                        }
                    }
                    Err(e) => {
                        if batch.fetch_failed(e) {
                            break;
                        }
                    }
                }
            }
            self.close(batch, totals).await?;
        }

        if rates {
            let mut batch = cx.batch(Category::Rate);
            batch.log = batch.log.request(request);
            for room in &rooms {
                let observed_at = Utc::now();
                match cx
                    .adapter
                    .get_rates(&room.property_external_id, &room.room_external_id, range)
                    .await
                {
                    Ok(days) => {
                        for day in days.iter().filter(|d| range.contains(d.day)) {
                            batch.record(cx.engine.reconcile_rate_day(room, day, observed_at).await);
                        }
                    }
                    Err(e) => {
                        if batch.fetch_failed(e) {
                            break;
                        }
                    }
                }
            }
            self.close(batch, totals).await?;
        }
        Ok(())
    }

    async fn sync_reservations(&self, cx: &RunContext<'_>, totals: &mut RunTotals) -> Result<(), Halt> {
        if !cx.adapter.supports(Capability::ListReservations) {
            return Ok(());
        }
        let filter = ReservationFilter {
            modified_since: match cx.kind {
                SyncKind::Incremental => cx.connection.last_sync_at,
                _ => None,
            },
            ..Default::default()
        };

        let mut batch = cx.batch(Category::Reservation);
        batch.log = batch.log.request(json!({ "modified_since": filter.modified_since }));
        match cx.adapter.list_reservations(&filter).await {
            Ok(reservations) => {
                for reservation in &reservations {
                    batch.record(cx.engine.reconcile_reservation(reservation).await);
                }
            }
            Err(e) => {
                batch.fetch_failed(e);
            }
        }
        self.close(batch, totals).await
    }

    /// Write a category's Sync Log entry and fold it into the run totals.
    async fn close(&self, batch: Batch, totals: &mut RunTotals) -> Result<(), Halt> {
        totals.counts.merge(&batch.counts);
        let entry = match &batch.fetch_error {
            Some(err) => batch.log.failed(batch.counts, err),
            None => batch.log.completed(batch.counts, batch.last_error.as_ref()),
        };
        self.append_log(&entry).await;

        let Some(err) = batch.fetch_error else {
            return Ok(());
        };
        tracing::warn!(
            connection_id = entry.connection_id,
            entity = %entry.entity_type,
            error = %err,
            "Category fetch failed",
        );
        if err.kind == SyncErrorKind::AuthFailed {
            return Err(Halt::Fatal(err));
        }
        if totals.fetch_error.is_none() {
            totals.fetch_error = Some(err);
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Completion
    // -----------------------------------------------------------------------

    async fn finish(
        &self,
        connection: &Connection,
        kind: SyncKind,
        run_id: Uuid,
        started_at: Timestamp,
        totals: RunTotals,
        result: Result<(), Halt>,
    ) -> RunOutcome {
        let summary_log = SyncLogBuilder::inbound(run_id, connection.id, ENTITY_RUN, kind.as_str())
            .kind(kind)
            .started_at(started_at);
        let advance = matches!(kind, SyncKind::FullImport | SyncKind::Incremental);
        let now = Utc::now();
        let current = connection.status();

        let (error, refresh_failed) = match result {
            Ok(()) => (totals.fetch_error, false),
            Err(Halt::Fatal(e)) => (Some(e), false),
            Err(Halt::Refresh(e)) => (
                Some(SyncError::auth_failed(format!("Token refresh failed: {}", e.message))),
                true,
            ),
        };

        let (entry, status) = match &error {
            None => (summary_log.completed(totals.counts, None), current.after_success()),
            Some(e) => (summary_log.failed(totals.counts, e), current.after_failure(e.kind)),
        };
        self.append_log(&entry).await;

        let recorded = match &error {
            None => self.store.record_success(connection.id, status, now, advance).await,
            Some(e) => {
                self.store
                    .record_failure(connection.id, status, &e.to_string(), now, advance && !refresh_failed)
                    .await
            }
        };
        if let Err(e) = recorded {
            tracing::error!(connection_id = connection.id, error = %e, "Failed to record run outcome");
        }

        if status != current {
            tracing::info!(
                connection_id = connection.id,
                from = %current,
                to = %status,
                "Connection status changed",
            );
        }
        match &error {
            None => tracing::info!(
                connection_id = connection.id,
                run_id = %run_id,
                kind = %kind,
                processed = totals.counts.processed,
                created = totals.counts.created,
                updated = totals.counts.updated,
                failed = totals.counts.failed,
                duration_ms = entry.duration_ms(),
                "Sync run finished",
            ),
            Some(e) if e.is_retryable() => tracing::warn!(
                connection_id = connection.id,
                run_id = %run_id,
                kind = %kind,
                error = %e,
                "Sync run failed",
            ),
            Some(e) => tracing::error!(
                connection_id = connection.id,
                run_id = %run_id,
                kind = %kind,
                error = %e,
                "Sync run failed",
            ),
        }

        if refresh_failed {
            return RunOutcome::Skipped(SkipReason::TokenRefreshFailed);
        }
        RunOutcome::Completed(RunSummary {
            run_id,
            connection_id: connection.id,
            kind,
            status: entry.status,
            counts: totals.counts,
            error,
        })
    }

    async fn append_log(&self, entry: &NewSyncLogEntry) {
        if let Err(e) = self.store.append_sync_log(entry).await {
            tracing::error!(connection_id = entry.connection_id, error = %e, "Failed to write sync log");
        }
    }
}

/// Disabled connections never run. Scheduled kinds also skip connections
/// waiting on the user; a full import is the user's way to retry.
fn runnable(connection: &Connection, kind: SyncKind) -> bool {
    match kind {
        SyncKind::FullImport => connection.status() != ConnectionStatus::Disabled,
        _ => connection.is_schedulable(),
    }
}
