//! Staging-hash reconcile decisions and run counters.
//!
//! For each fetched record the engine compares the new content hash against
//! the hash stored in staging and consults the external↔canonical mapping.
//! [`decide`] turns those inputs into one [`ReconcileAction`].

use serde::Serialize;

use crate::types::DbId;

/// Existing mapping for a staged record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappingRef {
    pub canonical_id: DbId,
    pub auto_sync: bool,
}

/// What to do with the canonical store for one fetched record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileAction {
    /// Same content as last sync; only `synced_at` moves.
    Unchanged { canonical_id: DbId },
    /// No mapping yet: create the canonical entity and record the mapping.
    Create,
    /// Mapped with `auto_sync`: update the canonical entity in place.
    Update { canonical_id: DbId },
    /// Mapped but detached by the user: staging moves, canonical does not.
    Detached { canonical_id: DbId },
}

/// Decide the canonical action for a record.
///
/// An unchanged hash is only a no-op when a mapping exists; otherwise an
/// earlier canonical write never completed and the record must be created.
pub fn decide(
    previous_hash: Option<&str>,
    new_hash: &str,
    mapping: Option<MappingRef>,
) -> ReconcileAction {
    match mapping {
        None => ReconcileAction::Create,
        Some(m) if previous_hash == Some(new_hash) => ReconcileAction::Unchanged {
            canonical_id: m.canonical_id,
        },
        Some(m) if !m.auto_sync => ReconcileAction::Detached {
            canonical_id: m.canonical_id,
        },
        Some(m) => ReconcileAction::Update {
            canonical_id: m.canonical_id,
        },
    }
}

/// Result of reconciling a single record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Created,
    Updated,
    Unchanged,
    /// Not written: detached mapping, missing parent, or superseded by a newer write.
    Skipped,
    Deleted,
}

impl From<ReconcileAction> for RecordOutcome {
    fn from(action: ReconcileAction) -> Self {
        match action {
            ReconcileAction::Unchanged { .. } => Self::Unchanged,
            ReconcileAction::Create => Self::Created,
            ReconcileAction::Update { .. } => Self::Updated,
            ReconcileAction::Detached { .. } => Self::Skipped,
        }
    }
}

/// Per-entity counters for a run, written to the Sync Log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncCounts {
    pub processed: i32,
    pub created: i32,
    pub updated: i32,
    pub unchanged: i32,
    pub skipped: i32,
    pub deleted: i32,
    pub failed: i32,
}

impl SyncCounts {
    /// Count one processed record.
    pub fn record(&mut self, outcome: RecordOutcome) {
        self.processed += 1;
        match outcome {
            RecordOutcome::Created => self.created += 1,
            RecordOutcome::Updated => self.updated += 1,
            RecordOutcome::Unchanged => self.unchanged += 1,
            RecordOutcome::Skipped => self.skipped += 1,
            RecordOutcome::Deleted => self.deleted += 1,
        }
    }

    /// Count one record that failed to reconcile.
    pub fn record_failure(&mut self) {
        self.processed += 1;
        self.failed += 1;
    }

    /// Count records retired because the provider no longer returns them.
    pub fn record_deleted(&mut self, count: i32) {
        self.deleted += count;
    }

    pub fn merge(&mut self, other: &SyncCounts) {
        self.processed += other.processed;
        self.created += other.created;
        self.updated += other.updated;
        self.unchanged += other.unchanged;
        self.skipped += other.skipped;
        self.deleted += other.deleted;
        self.failed += other.failed;
    }

    /// Whether anything reached the canonical store.
    pub fn has_changes(&self) -> bool {
        self.created + self.updated + self.deleted > 0
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    const MAPPED: MappingRef = MappingRef {
        canonical_id: 7,
        auto_sync: true,
    };

    #[test]
    fn unmapped_record_is_created() {
        assert_eq!(decide(None, "h1", None), ReconcileAction::Create);
        // Even with an unchanged hash: the canonical write never happened.
        assert_eq!(decide(Some("h1"), "h1", None), ReconcileAction::Create);
    }

    #[test]
    fn unchanged_hash_is_noop() {
        assert_matches!(
            decide(Some("h1"), "h1", Some(MAPPED)),
            ReconcileAction::Unchanged { canonical_id: 7 }
        );
    }

    #[test]
    fn changed_hash_updates_mapped_entity() {
        assert_matches!(
            decide(Some("h1"), "h2", Some(MAPPED)),
            ReconcileAction::Update { canonical_id: 7 }
        );
    }

    #[test]
    fn detached_mapping_skips_canonical_write() {
        let detached = MappingRef {
            canonical_id: 7,
            auto_sync: false,
        };
        assert_matches!(
            decide(Some("h1"), "h2", Some(detached)),
            ReconcileAction::Detached { canonical_id: 7 }
        );
    }

    #[test]
    fn counts_track_outcomes() {
        let mut counts = SyncCounts::default();
        counts.record(RecordOutcome::Created);
        counts.record(RecordOutcome::Unchanged);
        counts.record(ReconcileAction::Update { canonical_id: 1 }.into());
        counts.record_failure();
        assert_eq!(counts.processed, 4);
        assert_eq!(counts.created, 1);
        assert_eq!(counts.updated, 1);
        assert_eq!(counts.unchanged, 1);
        assert_eq!(counts.failed, 1);
        assert!(counts.has_changes());
    }

    #[test]
    fn unchanged_only_run_has_no_changes() {
        let mut counts = SyncCounts::default();
        counts.record(RecordOutcome::Unchanged);
        counts.record(RecordOutcome::Skipped);
        assert!(!counts.has_changes());
    }

    #[test]
    fn merge_adds_fields() {
        let mut a = SyncCounts {
            processed: 2,
            created: 1,
            ..Default::default()
        };
        let b = SyncCounts {
            processed: 3,
            failed: 1,
            deleted: 1,
            ..Default::default()
        };
        a.merge(&b);
        assert_eq!(a.processed, 5);
        assert_eq!(a.created, 1);
        assert_eq!(a.failed, 1);
        assert_eq!(a.deleted, 1);
    }
}
