//! Append-only Sync Log models.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use staysync_core::error::CoreError;
use staysync_core::reconcile::SyncCounts;
use staysync_core::types::{DbId, Timestamp};
use uuid::Uuid;

/// Direction of a logged operation relative to the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Inbound,
    Outbound,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Inbound => "inbound",
            Self::Outbound => "outbound",
        }
    }
}

/// Outcome recorded on a Sync Log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncLogStatus {
    Success,
    /// Some records failed while others were applied.
    Partial,
    Failed,
    /// Nothing was attempted (lock held, duplicate webhook, detached mapping).
    Skipped,
}

impl SyncLogStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Partial => "partial",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }

    /// Status implied by a run's counters.
    pub fn from_counts(counts: &SyncCounts) -> Self {
        match (counts.failed, counts.processed) {
            (0, _) => Self::Success,
            (f, p) if f >= p => Self::Failed,
            _ => Self::Partial,
        }
    }
}

impl FromStr for SyncLogStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(Self::Success),
            "partial" => Ok(Self::Partial),
            "failed" => Ok(Self::Failed),
            "skipped" => Ok(Self::Skipped),
            other => Err(CoreError::Validation(format!(
                "Unknown sync log status: {other}"
            ))),
        }
    }
}

/// A row from the `sync_logs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SyncLogEntry {
    pub id: DbId,
    pub run_id: Uuid,
    pub connection_id: DbId,
    pub direction: String,
    pub sync_kind: Option<String>,
    pub entity_type: String,
    pub action: String,
    pub status: String,
    pub processed: i32,
    pub created: i32,
    pub updated: i32,
    pub unchanged: i32,
    pub skipped: i32,
    pub deleted: i32,
    pub failed: i32,
    pub error_kind: Option<String>,
    pub error_message: Option<String>,
    pub request_snapshot: Option<serde_json::Value>,
    pub response_snapshot: Option<serde_json::Value>,
    pub started_at: Timestamp,
    pub finished_at: Timestamp,
    pub duration_ms: i64,
    pub created_at: Timestamp,
}

/// DTO for appending a Sync Log entry.
#[derive(Debug, Clone)]
pub struct NewSyncLogEntry {
    pub run_id: Uuid,
    pub connection_id: DbId,
    pub direction: Direction,
    /// `None` for webhook-driven entries.
    pub sync_kind: Option<String>,
    pub entity_type: String,
    pub action: String,
    pub status: SyncLogStatus,
    pub counts: SyncCounts,
    pub error_kind: Option<String>,
    pub error_message: Option<String>,
    pub request_snapshot: Option<serde_json::Value>,
    pub response_snapshot: Option<serde_json::Value>,
    pub started_at: Timestamp,
    pub finished_at: Timestamp,
}

impl NewSyncLogEntry {
    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds().max(0)
    }
}

/// Filters for querying the Sync Log.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SyncLogQuery {
    pub connection_id: Option<DbId>,
    pub status: Option<String>,
    pub from: Option<Timestamp>,
    pub to: Option<Timestamp>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
