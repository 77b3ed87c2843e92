//! Sync Log entry construction.
//!
//! A [`SyncLogBuilder`] is opened when an operation starts and closed with
//! its outcome, producing an append-only [`NewSyncLogEntry`].

use chrono::Utc;
use serde_json::{json, Value};
use staysync_core::cadence::SyncKind;
use staysync_core::reconcile::SyncCounts;
use staysync_core::sync_error::{truncate, SyncError};
use staysync_core::types::{DbId, Timestamp};
use staysync_db::models::sync_log::{Direction, NewSyncLogEntry, SyncLogStatus};
use uuid::Uuid;

/// Largest serialized snapshot stored verbatim on an entry.
pub const SNAPSHOT_LIMIT: usize = 16 * 1024;

/// Entity type used for run-level summary entries.
pub const ENTITY_RUN: &str = "run";
/// Entity type used for webhook entries.
pub const ENTITY_WEBHOOK: &str = "webhook";

#[derive(Debug, Clone)]
pub struct SyncLogBuilder {
    run_id: Uuid,
    connection_id: DbId,
    direction: Direction,
    sync_kind: Option<SyncKind>,
    entity_type: String,
    action: String,
    started_at: Timestamp,
    request_snapshot: Option<Value>,
}

impl SyncLogBuilder {
    /// Start an inbound entry now.
    pub fn inbound(
        run_id: Uuid,
        connection_id: DbId,
        entity_type: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            run_id,
            connection_id,
            direction: Direction::Inbound,
            sync_kind: None,
            entity_type: entity_type.into(),
            action: action.into(),
            started_at: Utc::now(),
            request_snapshot: None,
        }
    }

    pub fn kind(mut self, kind: SyncKind) -> Self {
        self.sync_kind = Some(kind);
        self
    }

    pub fn started_at(mut self, at: Timestamp) -> Self {
        self.started_at = at;
        self
    }

    pub fn request(mut self, snapshot: Value) -> Self {
        self.request_snapshot = Some(bounded_snapshot(snapshot));
        self
    }

    /// Close with the counters of a completed batch. `error` is the last
    /// record-level failure, kept for diagnosis.
    pub fn completed(self, counts: SyncCounts, error: Option<&SyncError>) -> NewSyncLogEntry {
        let status = SyncLogStatus::from_counts(&counts);
        self.finish(status, counts, error)
    }

    /// Close as failed: the operation itself could not run.
    pub fn failed(self, counts: SyncCounts, error: &SyncError) -> NewSyncLogEntry {
        self.finish(SyncLogStatus::Failed, counts, Some(error))
    }

    /// Close as skipped with a reason.
    pub fn skipped(self, reason: &str) -> NewSyncLogEntry {
        let mut entry = self.finish(SyncLogStatus::Skipped, SyncCounts::default(), None);
        entry.error_message = Some(reason.to_string());
        entry
    }

    fn finish(
        self,
        status: SyncLogStatus,
        counts: SyncCounts,
        error: Option<&SyncError>,
    ) -> NewSyncLogEntry {
        NewSyncLogEntry {
            run_id: self.run_id,
            connection_id: self.connection_id,
            direction: self.direction,
            sync_kind: self.sync_kind.map(|k| k.as_str().to_string()),
            entity_type: self.entity_type,
            action: self.action,
            status,
            counts,
            error_kind: error.map(|e| e.kind.as_str().to_string()),
            error_message: error.map(|e| e.message.clone()),
            request_snapshot: self.request_snapshot,
            response_snapshot: error.and_then(|e| e.snapshot.clone()).map(bounded_snapshot),
            started_at: self.started_at,
            finished_at: Utc::now(),
        }
    }
}

/// Keep small snapshots as-is; replace large ones with a truncated preview.
pub fn bounded_snapshot(snapshot: Value) -> Value {
    let text = snapshot.to_string();
    if text.len() <= SNAPSHOT_LIMIT {
        return snapshot;
    }
    json!({
        "truncated": true,
        "size": text.len(),
        "preview": truncate(&text, SNAPSHOT_LIMIT),
    })
}

#[cfg(test)]
mod tests {
    use staysync_core::reconcile::RecordOutcome;

    use super::*;

    fn builder() -> SyncLogBuilder {
        SyncLogBuilder::inbound(Uuid::new_v4(), 3, "availability", "fetch")
            .kind(SyncKind::AvailabilityBackup)
    }

    #[test]
    fn completed_status_follows_counts() {
        let mut counts = SyncCounts::default();
        counts.record(RecordOutcome::Created);
        let entry = builder().completed(counts, None);
        assert_eq!(entry.status, SyncLogStatus::Success);
        assert_eq!(entry.sync_kind.as_deref(), Some("availability_backup"));

        counts.record_failure();
        let err = SyncError::validation("bad day");
        let entry = builder().completed(counts, Some(&err));
        assert_eq!(entry.status, SyncLogStatus::Partial);
        assert_eq!(entry.error_kind.as_deref(), Some("VALIDATION"));
    }

    #[test]
    fn failed_keeps_provider_snapshot() {
        let err = SyncError::from_http_status(503, "maintenance");
        let entry = builder().failed(SyncCounts::default(), &err);
        assert_eq!(entry.status, SyncLogStatus::Failed);
        assert_eq!(entry.response_snapshot.unwrap()["status"], 503);
    }

    #[test]
    fn oversized_snapshot_is_truncated() {
        let big = json!({ "body": "x".repeat(SNAPSHOT_LIMIT * 2) });
        let bounded = bounded_snapshot(big);
        assert_eq!(bounded["truncated"], true);
    }
}
