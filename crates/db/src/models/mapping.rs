//! External ↔ canonical mapping models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use staysync_core::reconcile::MappingRef;
use staysync_core::types::{DbId, Timestamp};

use crate::models::inventory::{BookingWrite, PropertyWrite, UnitWrite};
use crate::models::staging::StagingKind;

/// External entity type stored in `mappings.external_type`.
pub const EXTERNAL_PROPERTY: &str = "property";
pub const EXTERNAL_ROOM_TYPE: &str = "room_type";
pub const EXTERNAL_RESERVATION: &str = "reservation";

/// Canonical entity type stored in `mappings.canonical_type`.
pub const CANONICAL_PROPERTY: &str = "property";
pub const CANONICAL_UNIT: &str = "unit";
pub const CANONICAL_BOOKING: &str = "booking";

/// A row from the `mappings` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Mapping {
    pub id: DbId,
    pub connection_id: DbId,
    pub external_type: String,
    pub external_id: String,
    pub canonical_type: String,
    pub canonical_id: DbId,
    /// `false` when the user pinned/detached this record from automatic sync.
    pub auto_sync: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Mapping {
    pub fn as_ref(&self) -> MappingRef {
        MappingRef {
            canonical_id: self.canonical_id,
            auto_sync: self.auto_sync,
        }
    }
}

/// DTO for recording a new mapping.
#[derive(Debug, Clone, Deserialize)]
pub struct NewMapping {
    pub connection_id: DbId,
    pub external_type: String,
    pub external_id: String,
    pub canonical_type: String,
    pub canonical_id: DbId,
}

/// A fetched record with no mapping yet.
#[derive(Debug, Clone, Copy)]
pub struct UnmappedRecord<'a> {
    pub kind: StagingKind,
    pub connection_id: DbId,
    pub external_type: &'a str,
    pub external_id: &'a str,
}

/// The canonical row created together with an [`UnmappedRecord`]'s mapping.
#[derive(Debug, Clone, Copy)]
pub enum CanonicalInsert<'a> {
    Property {
        account_id: DbId,
        input: &'a PropertyWrite,
    },
    Unit {
        property_id: DbId,
        input: &'a UnitWrite,
    },
    Booking {
        input: &'a BookingWrite,
    },
}

impl CanonicalInsert<'_> {
    pub fn canonical_type(&self) -> &'static str {
        match self {
            Self::Property { .. } => CANONICAL_PROPERTY,
            Self::Unit { .. } => CANONICAL_UNIT,
            Self::Booking { .. } => CANONICAL_BOOKING,
        }
    }
}
