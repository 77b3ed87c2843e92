//! Staging (buffer) table models.
//!
//! Staging rows hold provider payloads verbatim with a content hash, one row
//! per `(connection_id, external_id)`, so canonical tables stay isolated
//! from provider-specific fields.

use serde::Serialize;
use sqlx::FromRow;
use staysync_core::cadence::Category;
use staysync_core::types::{DbId, Timestamp};

/// Which staging table a record lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StagingKind {
    Property,
    RoomType,
    Reservation,
    Availability,
    Rate,
}

impl StagingKind {
    pub fn table(self) -> &'static str {
        match self {
            Self::Property => "staging_properties",
            Self::RoomType => "staging_room_types",
            Self::Reservation => "staging_reservations",
            Self::Availability => "staging_availability",
            Self::Rate => "staging_rates",
        }
    }

    pub fn category(self) -> Category {
        match self {
            Self::Property => Category::Property,
            Self::RoomType => Category::RoomType,
            Self::Reservation => Category::Reservation,
            Self::Availability => Category::Availability,
            Self::Rate => Category::Rate,
        }
    }
}

/// A row from one of the `staging_*` tables.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StagingRecord {
    pub id: DbId,
    pub connection_id: DbId,
    pub external_id: String,
    pub parent_external_id: Option<String>,
    pub payload: serde_json::Value,
    pub sync_hash: String,
    pub canonical_id: Option<DbId>,
    pub synced_at: Timestamp,
    pub removed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Input for a staging upsert.
#[derive(Debug, Clone)]
pub struct StageInput<'a> {
    pub connection_id: DbId,
    pub external_id: &'a str,
    pub parent_external_id: Option<&'a str>,
    pub payload: &'a serde_json::Value,
    pub sync_hash: &'a str,
}

/// What the staging upsert found before writing.
#[derive(Debug, Clone, FromRow, PartialEq, Eq)]
pub struct StagedUpsert {
    /// Hash stored before this upsert; `None` for a first sighting.
    pub previous_hash: Option<String>,
    pub canonical_id: Option<DbId>,
}

/// A staged room type with its canonical unit (if mapped).
#[derive(Debug, Clone, FromRow, PartialEq, Eq)]
pub struct StagedRoom {
    pub property_external_id: Option<String>,
    pub room_external_id: String,
    pub unit_id: Option<DbId>,
    pub auto_sync: Option<bool>,
}
