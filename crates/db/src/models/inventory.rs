//! Canonical inventory models: properties, units, bookings, availability.
//!
//! These are the platform's own tables. Provider-specific fields never land
//! here; the mapping engine translates staged payloads into the write DTOs.

use serde::Serialize;
use sqlx::FromRow;
use staysync_core::availability::AvailabilitySource;
use staysync_core::types::{DbId, Day, Timestamp};

// ---------------------------------------------------------------------------
// Property
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Property {
    pub id: DbId,
    pub account_id: DbId,
    pub connection_id: DbId,
    pub name: String,
    pub description: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub country_code: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub currency: Option<String>,
    pub timezone: Option<String>,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Canonical property fields written by the mapping engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PropertyWrite {
    pub name: String,
    pub description: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub country_code: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub currency: Option<String>,
    pub timezone: Option<String>,
}

// ---------------------------------------------------------------------------
// Unit
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Unit {
    pub id: DbId,
    pub property_id: DbId,
    pub name: String,
    pub max_occupancy: Option<i32>,
    pub bedrooms: Option<i32>,
    pub bathrooms: Option<f64>,
    pub bed_configuration: serde_json::Value,
    pub quantity: i32,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UnitWrite {
    pub name: String,
    pub max_occupancy: Option<i32>,
    pub bedrooms: Option<i32>,
    pub bathrooms: Option<f64>,
    pub bed_configuration: Option<serde_json::Value>,
    pub quantity: i32,
}

// ---------------------------------------------------------------------------
// Booking
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Booking {
    pub id: DbId,
    pub connection_id: DbId,
    pub unit_id: Option<DbId>,
    pub external_reference: String,
    pub status: String,
    pub arrival: Day,
    pub departure: Day,
    pub guest_name: Option<String>,
    pub adults: Option<i32>,
    pub children: Option<i32>,
    pub total_price: Option<f64>,
    pub currency: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookingWrite {
    pub unit_id: Option<DbId>,
    pub external_reference: String,
    pub status: String,
    pub arrival: Day,
    pub departure: Day,
    pub guest_name: Option<String>,
    pub adults: Option<i32>,
    pub children: Option<i32>,
    pub total_price: Option<f64>,
    pub currency: Option<String>,
}

// ---------------------------------------------------------------------------
// Availability
// ---------------------------------------------------------------------------

/// One `(unit, day)` row. `source`/`source_at` record the last writer.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AvailabilityDay {
    pub id: DbId,
    pub unit_id: DbId,
    pub day: Day,
    pub available: bool,
    pub units_available: Option<i32>,
    pub source: String,
    pub source_at: Timestamp,
    pub price: Option<f64>,
    pub min_stay: Option<i32>,
    pub rates_synced_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl AvailabilityDay {
    pub fn source(&self) -> Option<AvailabilitySource> {
        self.source.parse().ok()
    }
}

/// An availability write tagged with its writer and observation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvailabilityWrite {
    pub day: Day,
    pub available: bool,
    pub units_available: Option<i32>,
    pub source: AvailabilitySource,
    pub source_at: Timestamp,
}

/// A nightly price/min-stay write from a rate sync.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateWrite {
    pub day: Day,
    pub price: Option<f64>,
    pub min_stay: Option<i32>,
    pub synced_at: Timestamp,
}
