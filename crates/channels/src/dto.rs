//! Canonical DTOs produced by every adapter.
//!
//! Entity DTOs carry the provider object verbatim in `raw`. `raw` is skipped
//! when serializing, so hashing a DTO covers only the normalized fields and a
//! provider adding an unrelated field does not register as a content change.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use staysync_core::availability::BookingStatus;
use staysync_core::hashing::content_hash;
use staysync_core::types::{Day, Timestamp};

/// Content hash over the normalized fields of a DTO.
pub fn sync_hash<T: Serialize>(dto: &T) -> String {
    content_hash(dto)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyDto {
    pub external_id: String,
    pub name: String,
    pub description: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub country_code: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub currency: Option<String>,
    pub timezone: Option<String>,
    /// Room types embedded in the property listing, when the provider sends them.
    #[serde(skip)]
    pub room_types: Vec<RoomTypeDto>,
    #[serde(skip)]
    pub raw: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoomTypeDto {
    pub external_id: String,
    pub property_external_id: String,
    pub name: String,
    pub max_occupancy: Option<i32>,
    pub bedrooms: Option<i32>,
    pub bathrooms: Option<f64>,
    pub bed_configuration: Option<Value>,
    pub quantity: i32,
    #[serde(skip)]
    pub raw: Value,
}

/// Availability of one room type on one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayDto {
    pub day: Day,
    pub available: bool,
    pub units_available: Option<i32>,
    #[serde(skip)]
    pub raw: Value,
}

/// Price and stay restriction of one room type on one night.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateDto {
    pub day: Day,
    pub price: Option<f64>,
    pub min_stay: Option<i32>,
    pub currency: Option<String>,
    #[serde(skip)]
    pub raw: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservationDto {
    pub external_id: String,
    pub property_external_id: Option<String>,
    pub room_external_id: Option<String>,
    pub status: BookingStatus,
    pub arrival: Day,
    pub departure: Day,
    pub guest_name: Option<String>,
    pub adults: Option<i32>,
    pub children: Option<i32>,
    pub total_price: Option<f64>,
    pub currency: Option<String>,
    #[serde(skip)]
    pub raw: Value,
}

/// Outbound reservation write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservationRequest {
    pub property_external_id: String,
    pub room_external_id: String,
    pub arrival: Day,
    pub departure: Day,
    pub guest_name: Option<String>,
    pub adults: Option<i32>,
    pub children: Option<i32>,
    pub total_price: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReservationFilter {
    pub property_external_id: Option<String>,
    pub modified_since: Option<Timestamp>,
    pub arrival_from: Option<Day>,
    pub arrival_to: Option<Day>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// 1-based page number.
    pub page: u32,
    pub per_page: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 100,
        }
    }
}

impl Pagination {
    pub fn next(self) -> Self {
        Self {
            page: self.page + 1,
            ..self
        }
    }
}

/// One page of results plus the cursor for the following page, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next: Option<Pagination>,
}

/// Result of a token refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub access_token: String,
    /// Present when the provider rotates refresh tokens.
    pub refresh_token: Option<String>,
    pub expires_at: Option<Timestamp>,
}

/// A provider webhook reduced to what the availability fast path needs.
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookNotice {
    /// Provider-assigned event id, if the payload carries one.
    pub event_id: Option<String>,
    pub event_type: Option<String>,
    pub booking_external_id: Option<String>,
    pub room_external_id: String,
    pub status: BookingStatus,
    pub arrival: Day,
    pub departure: Day,
    pub raw: Value,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn villa(raw: Value) -> PropertyDto {
        PropertyDto {
            external_id: "P1".into(),
            name: "Beach Villa".into(),
            raw,
            ..Default::default()
        }
    }

    #[test]
    fn hash_ignores_raw_payload() {
        let a = villa(json!({"name": "Beach Villa"}));
        let b = villa(json!({"name": "Beach Villa", "newProviderField": 1}));
        assert_eq!(sync_hash(&a), sync_hash(&b));
    }

    #[test]
    fn hash_tracks_normalized_fields() {
        let a = villa(Value::Null);
        let mut b = villa(Value::Null);
        b.city = Some("Split".into());
        assert_ne!(sync_hash(&a), sync_hash(&b));
    }

    #[test]
    fn pagination_advances() {
        let page = Pagination::default().next();
        assert_eq!(page.page, 2);
        assert_eq!(page.per_page, 100);
    }
}
