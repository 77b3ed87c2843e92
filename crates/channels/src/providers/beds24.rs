//! Beds24 (API v2) direct integration.
//!
//! Token auth: a long-lived refresh token is exchanged for a 24 h access
//! token sent in the `token` header. Properties embed their room types.
//! Availability has two URL shapes across API environments, so it goes
//! through endpoint-variant fallback.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use reqwest::RequestBuilder;
use serde_json::{json, Value};
use staysync_core::availability::BookingStatus;
use staysync_core::cadence::DateRange;
use staysync_core::sync_error::{SyncError, SyncResult};
use staysync_core::types::Day;
use tracing::warn;

use crate::adapter::ChannelAdapter;
use crate::capability::{Capabilities, Capability};
use crate::dto::{
    DayDto, Page, Pagination, PropertyDto, RateDto, ReservationDto, ReservationFilter,
    ReservationRequest, RoomTypeDto, TokenGrant,
};
use crate::http::{ConnectionContext, EndpointVariant};
use crate::normalize::{
    as_bool, as_date, bed_configuration, coordinates, list_items, occupancy, parse_each,
    pick, pick_bool, pick_date, pick_f64, pick_i32, pick_str,
};

pub const PROVIDER: &str = "beds24";
pub const DEFAULT_BASE_URL: &str = "https://api.beds24.com/v2";

/// Upper bound on booking pages fetched in one listing.
const MAX_BOOKING_PAGES: u32 = 50;

const CAPABILITIES: Capabilities = Capabilities::empty()
    .with(Capability::Authenticate)
    .with(Capability::RefreshToken)
    .with(Capability::ListProperties)
    .with(Capability::GetProperty)
    .with(Capability::ListRoomTypes)
    .with(Capability::GetAvailability)
    .with(Capability::GetRates)
    .with(Capability::ListReservations)
    .with(Capability::CreateReservation)
    .with(Capability::UpdateReservation)
    .with(Capability::CancelReservation);

pub struct Beds24Adapter {
    ctx: ConnectionContext,
}

impl Beds24Adapter {
    pub fn new(ctx: ConnectionContext) -> Self {
        Self { ctx }
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.authorized(self.ctx.client.get(self.ctx.url(path)))
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.authorized(self.ctx.client.post(self.ctx.url(path)))
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.ctx.access_token {
            Some(token) => request.header("token", token),
            None => request,
        }
    }

    /// POST a one-element booking array and return the first result.
    async fn write_booking(&self, booking: Value) -> SyncResult<Value> {
        let body = self
            .ctx
            .send(self.post("/bookings").json(&json!([booking])))
            .await?;
        let result = list_items(&body, &["data"])
            .first()
            .cloned()
            .unwrap_or_else(|| body.clone());
        if pick_bool(&result, &["success"]) == Some(false) {
            return Err(SyncError::validation("Beds24 rejected the booking write")
                .with_snapshot(result));
        }
        Ok(result)
    }
}

#[async_trait]
impl ChannelAdapter for Beds24Adapter {
    fn provider(&self) -> &'static str {
        PROVIDER
    }

    fn capabilities(&self) -> Capabilities {
        CAPABILITIES
    }

    async fn authenticate(&self) -> SyncResult<()> {
        let body = self.ctx.send(self.get("/authentication/details")).await?;
        match pick_bool(&body, &["validToken"]) {
            Some(false) => Err(SyncError::auth_failed("Beds24 token is not valid")),
            _ => Ok(()),
        }
    }

    async fn refresh_token(&self, refresh_token: &str) -> SyncResult<TokenGrant> {
        let request = self
            .ctx
            .client
            .get(self.ctx.url("/authentication/token"))
            .header("refreshToken", refresh_token);
        let body = self.ctx.send(request).await?;
        let access_token = pick_str(&body, &["token"])
            .ok_or_else(|| SyncError::auth_failed("Beds24 token refresh returned no token"))?;
        let expires_at = pick_i32(&body, &["expiresIn"])
            .map(|secs| Utc::now() + Duration::seconds(i64::from(secs)));
        Ok(TokenGrant {
            access_token,
            refresh_token: pick_str(&body, &["refreshToken"]),
            expires_at,
        })
    }

    async fn list_properties(&self, page: Pagination) -> SyncResult<Page<PropertyDto>> {
        let request = self.get("/properties").query(&[
            ("includeAllRooms", "true".to_string()),
            ("page", page.page.to_string()),
        ]);
        let body = self.ctx.send(request).await?;
        let items = parse_each(list_items(&body, &["data"]), "beds24 property", parse_property);
        Ok(Page {
            items,
            next: next_page_exists(&body).then(|| page.next()),
        })
    }

    async fn get_property(&self, external_id: &str) -> SyncResult<PropertyDto> {
        let request = self
            .get("/properties")
            .query(&[("id", external_id), ("includeAllRooms", "true")]);
        let body = self.ctx.send(request).await?;
        let item = list_items(&body, &["data"])
            .first()
            .ok_or_else(|| SyncError::not_found(format!("Beds24 property {external_id}")))?;
        parse_property(item)
    }

    async fn list_room_types(&self, property_external_id: &str) -> SyncResult<Vec<RoomTypeDto>> {
        Ok(self.get_property(property_external_id).await?.room_types)
    }

    async fn get_availability(
        &self,
        _property_external_id: &str,
        room_external_id: &str,
        range: DateRange,
    ) -> SyncResult<Vec<DayDto>> {
        if range.is_empty() {
            return Ok(Vec::new());
        }
        let variants = [
            EndpointVariant::new("/inventory/rooms/availability")
                .param("roomId", room_external_id)
                .param("startDate", range.start)
                .param("endDate", range.last_day()),
            EndpointVariant::new("/inventory/rooms/calendar")
                .param("roomId", room_external_id)
                .param("startDate", range.start)
                .param("endDate", range.last_day())
                .param("includeNumAvail", "true"),
        ];
        let body = self
            .ctx
            .send_with_variants("availability", &variants, |v| {
                self.get(&v.path).query(&v.query)
            })
            .await?;
        let room = room_entry(&body, room_external_id);
        Ok(parse_availability(room, range))
    }

    async fn get_rates(
        &self,
        _property_external_id: &str,
        room_external_id: &str,
        range: DateRange,
    ) -> SyncResult<Vec<RateDto>> {
        if range.is_empty() {
            return Ok(Vec::new());
        }
        let request = self.get("/inventory/rooms/calendar").query(&[
            ("roomId", room_external_id.to_string()),
            ("startDate", range.start.to_string()),
            ("endDate", range.last_day().to_string()),
            ("includePrices", "true".to_string()),
            ("includeMinStay", "true".to_string()),
        ]);
        let body = self.ctx.send(request).await?;
        let room = room_entry(&body, room_external_id);
        Ok(parse_rates(room, range))
    }

    async fn list_reservations(
        &self,
        filter: &ReservationFilter,
    ) -> SyncResult<Vec<ReservationDto>> {
        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(property) = &filter.property_external_id {
            query.push(("propertyId", property.clone()));
        }
        if let Some(since) = filter.modified_since {
            query.push(("modifiedFrom", since.to_rfc3339()));
        }
        if let Some(from) = filter.arrival_from {
            query.push(("arrivalFrom", from.to_string()));
        }
        if let Some(to) = filter.arrival_to {
            query.push(("arrivalTo", to.to_string()));
        }

        let mut reservations = Vec::new();
        for page in 1..=MAX_BOOKING_PAGES {
            let request = self
                .get("/bookings")
                .query(&query)
                .query(&[("page", page.to_string())]);
            let body = self.ctx.send(request).await?;
            reservations.extend(parse_each(
                list_items(&body, &["data"]),
                "beds24 booking",
                parse_reservation,
            ));
            if !next_page_exists(&body) {
                break;
            }
        }
        Ok(reservations)
    }

    async fn create_reservation(&self, request: &ReservationRequest) -> SyncResult<ReservationDto> {
        let mut booking = booking_body(request);
        booking["status"] = json!("confirmed");
        let result = self.write_booking(booking).await?;
        let id = result
            .get("new")
            .and_then(|n| pick_str(n, &["id"]))
            .or_else(|| pick_str(&result, &["id", "bookId"]))
            .ok_or_else(|| SyncError::validation("Beds24 create returned no booking id"))?;
        Ok(reservation_from_request(id, request, result))
    }

    async fn update_reservation(
        &self,
        external_id: &str,
        request: &ReservationRequest,
    ) -> SyncResult<ReservationDto> {
        let mut booking = booking_body(request);
        booking["id"] = json!(external_id);
        let result = self.write_booking(booking).await?;
        Ok(reservation_from_request(
            external_id.to_string(),
            request,
            result,
        ))
    }

    async fn cancel_reservation(&self, external_id: &str) -> SyncResult<()> {
        self.write_booking(json!({ "id": external_id, "status": "cancelled" }))
            .await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Payload parsing
// ---------------------------------------------------------------------------

fn next_page_exists(body: &Value) -> bool {
    body.get("pages")
        .and_then(|p| pick_bool(p, &["nextPageExists"]))
        .unwrap_or(false)
}

static NULL: Value = Value::Null;

/// The `data[]` entry for one room, or the first entry.
fn room_entry<'a>(body: &'a Value, room_external_id: &str) -> &'a Value {
    let items = list_items(body, &["data"]);
    items
        .iter()
        .find(|item| pick_str(item, &["roomId", "id"]).as_deref() == Some(room_external_id))
        .or_else(|| items.first())
        .unwrap_or(&NULL)
}

pub(crate) fn parse_property(v: &Value) -> SyncResult<PropertyDto> {
    let external_id = pick_str(v, &["id", "propId", "propertyId"])
        .ok_or_else(|| SyncError::validation("Beds24 property without id"))?;
    let (latitude, longitude) = coordinates(v);
    let room_types = pick(v, &["roomTypes", "rooms"])
        .and_then(Value::as_array)
        .map(|rooms| {
            let scope = format!("beds24 room type of property {external_id}");
            parse_each(rooms, &scope, |r| parse_room_type(r, &external_id))
        })
        .unwrap_or_default();
    Ok(PropertyDto {
        name: pick_str(v, &["name", "propName"]).unwrap_or_default(),
        description: pick_str(v, &["description"]),
        address: pick_str(v, &["address"]),
        city: pick_str(v, &["city"]),
        country_code: pick_str(v, &["countryCode", "country"]),
        latitude,
        longitude,
        currency: pick_str(v, &["currency"]),
        timezone: pick_str(v, &["timeZone", "timezone"]),
        room_types,
        raw: v.clone(),
        external_id,
    })
}

fn parse_room_type(v: &Value, property_external_id: &str) -> SyncResult<RoomTypeDto> {
    let external_id = pick_str(v, &["id", "roomId"])
        .ok_or_else(|| SyncError::validation("Beds24 room type without id"))?;
    Ok(RoomTypeDto {
        property_external_id: property_external_id.to_string(),
        name: pick_str(v, &["name", "roomName"]).unwrap_or_default(),
        max_occupancy: occupancy(v),
        bedrooms: pick_i32(v, &["bedrooms", "numBedrooms"]),
        bathrooms: pick_f64(v, &["bathrooms", "numBathrooms"]),
        bed_configuration: bed_configuration(v),
        quantity: pick_i32(v, &["qty", "quantity", "units"]).unwrap_or(1),
        raw: v.clone(),
        external_id,
    })
}

/// Availability from either shape: a `{date: bool}` map or calendar ranges.
fn parse_availability(room: &Value, range: DateRange) -> Vec<DayDto> {
    if let Some(map) = room.get("availability").and_then(Value::as_object) {
        let mut days: Vec<DayDto> = map
            .iter()
            .filter_map(|(date, open)| {
                let day = as_date(&Value::String(date.clone()))?;
                let mut raw = serde_json::Map::new();
                raw.insert(date.clone(), open.clone());
                Some(DayDto {
                    day,
                    available: as_bool(open)?,
                    units_available: None,
                    raw: Value::Object(raw),
                })
            })
            .filter(|d| range.contains(d.day))
            .collect();
        days.sort_by_key(|d| d.day);
        return days;
    }
    expand_calendar(room, range, |entry, day| {
        let units = pick_i32(entry, &["numAvail", "numAvailable"]);
        Some(DayDto {
            day,
            available: units.map(|u| u > 0)?,
            units_available: units,
            raw: entry.clone(),
        })
    })
}

fn parse_rates(room: &Value, range: DateRange) -> Vec<RateDto> {
    expand_calendar(room, range, |entry, day| {
        Some(RateDto {
            day,
            price: pick_f64(entry, &["price1", "price"]),
            min_stay: pick_i32(entry, &["minStay"]),
            currency: None,
            raw: entry.clone(),
        })
    })
}

/// Expand `calendar[{from, to, ...}]` (inclusive ranges) into per-day items.
///
/// Each entry is clipped to `range` before expansion, so an open-ended entry
/// (`to` years out) costs no more than the requested window.
fn expand_calendar<T>(
    room: &Value,
    range: DateRange,
    mut build: impl FnMut(&Value, Day) -> Option<T>,
) -> Vec<T> {
    let mut out = Vec::new();
    if range.is_empty() {
        return out;
    }
    for entry in list_items(room, &["calendar"]) {
        let Some(from) = pick_date(entry, &["from", "date"]) else {
            warn!(entry = %entry, "Skipping Beds24 calendar entry without start date");
            continue;
        };
        let to = pick_date(entry, &["to"]).unwrap_or(from);
        let first = from.max(range.start);
        let last = to.min(range.last_day());
        for day in first.iter_days().take_while(|d| *d <= last) {
            if let Some(item) = build(entry, day) {
                out.push(item);
            }
        }
    }
    out
}

pub(crate) fn parse_reservation(v: &Value) -> SyncResult<ReservationDto> {
    let external_id = pick_str(v, &["id", "bookId", "bookingId"])
        .ok_or_else(|| SyncError::validation("Beds24 booking without id"))?;
    let arrival = pick_date(v, &["arrival", "firstNight"])
        .ok_or_else(|| SyncError::validation(format!("Beds24 booking {external_id} without arrival")))?;
    let departure = pick_date(v, &["departure"])
        .ok_or_else(|| SyncError::validation(format!("Beds24 booking {external_id} without departure")))?;
    let status = match pick_str(v, &["status"]) {
        None => BookingStatus::Confirmed,
        Some(raw) => BookingStatus::from_alias(&raw).ok_or_else(|| {
            SyncError::validation(format!("Beds24 booking {external_id} has unknown status {raw}"))
        })?,
    };
    let guest_name = [pick_str(v, &["firstName"]), pick_str(v, &["lastName"])]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");
    Ok(ReservationDto {
        property_external_id: pick_str(v, &["propertyId", "propId"]),
        room_external_id: pick_str(v, &["roomId"]),
        status,
        arrival,
        departure,
        guest_name: (!guest_name.is_empty()).then_some(guest_name),
        adults: pick_i32(v, &["numAdult", "adults"]),
        children: pick_i32(v, &["numChild", "children"]),
        total_price: pick_f64(v, &["price", "totalPrice"]),
        currency: pick_str(v, &["currency"]),
        raw: v.clone(),
        external_id,
    })
}

fn booking_body(request: &ReservationRequest) -> Value {
    json!({
        "propertyId": request.property_external_id,
        "roomId": request.room_external_id,
        "arrival": request.arrival,
        "departure": request.departure,
        "lastName": request.guest_name,
        "numAdult": request.adults,
        "numChild": request.children,
        "price": request.total_price,
    })
}

fn reservation_from_request(id: String, request: &ReservationRequest, raw: Value) -> ReservationDto {
    ReservationDto {
        external_id: id,
        property_external_id: Some(request.property_external_id.clone()),
        room_external_id: Some(request.room_external_id.clone()),
        status: BookingStatus::Confirmed,
        arrival: request.arrival,
        departure: request.departure,
        guest_name: request.guest_name.clone(),
        adults: request.adults,
        children: request.children,
        total_price: request.total_price,
        currency: None,
        raw,
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use staysync_core::sync_error::SyncErrorKind;

    use super::*;

    fn range(start: &str, end: &str) -> DateRange {
        DateRange::new(start.parse().unwrap(), end.parse().unwrap()).unwrap()
    }

    #[test]
    fn property_with_embedded_rooms() {
        let v = json!({
            "id": 4521,
            "name": "Beach Villa",
            "countryCode": "HR",
            "latitude": "43.51",
            "longitude": 16.44,
            "roomTypes": [
                {"id": 10919, "name": "Double", "maxPeople": 2, "qty": 3, "extraField": "kept"}
            ]
        });
        let p = parse_property(&v).unwrap();
        assert_eq!(p.external_id, "4521");
        assert_eq!(p.latitude, Some(43.51));
        assert_eq!(p.room_types.len(), 1);
        let room = &p.room_types[0];
        assert_eq!(room.external_id, "10919");
        assert_eq!(room.property_external_id, "4521");
        assert_eq!(room.max_occupancy, Some(2));
        assert_eq!(room.quantity, 3);
        assert_eq!(room.raw["extraField"], "kept");
    }

    #[test]
    fn property_without_id_is_validation_error() {
        let err = parse_property(&json!({"name": "x"})).unwrap_err();
        assert_matches!(err.kind, SyncErrorKind::Validation);
    }

    #[test]
    fn availability_map_shape_is_clipped_to_range() {
        let room = json!({"roomId": 1, "availability": {
            "2025-12-29": true, "2025-12-30": false, "2025-12-31": true
        }});
        let days = parse_availability(&room, range("2025-12-30", "2026-01-01"));
        assert_eq!(days.len(), 2);
        assert!(!days[0].available);
        assert!(days[1].available);
    }

    #[test]
    fn calendar_ranges_expand_per_day() {
        let room = json!({"roomId": 1, "calendar": [
            {"from": "2025-12-30", "to": "2026-01-01", "numAvail": 0, "price1": 120, "minStay": 2}
        ]});
        let r = range("2025-12-30", "2026-01-02");
        let days = parse_availability(&room, r);
        assert_eq!(days.len(), 3);
        assert!(days.iter().all(|d| !d.available && d.units_available == Some(0)));

        let rates = parse_rates(&room, r);
        assert_eq!(rates.len(), 3);
        assert_eq!(rates[0].price, Some(120.0));
        assert_eq!(rates[0].min_stay, Some(2));
    }

    #[test]
    fn calendar_entries_are_clipped_to_the_window() {
        let room = json!({"roomId": 1, "calendar": [
            {"from": "2020-01-01", "to": "2999-12-31", "numAvail": 2, "price1": 80},
            {"from": "2026-01-05", "to": "2026-01-09", "numAvail": 1}
        ]});
        let r = range("2025-12-30", "2026-01-02");
        let days = parse_availability(&room, r);
        let expected: Vec<Day> = r.days().collect();
        assert_eq!(days.iter().map(|d| d.day).collect::<Vec<_>>(), expected);
        assert!(days.iter().all(|d| d.units_available == Some(2)));

        let rates = parse_rates(&room, r);
        assert_eq!(rates.len(), 3);
        assert_eq!(rates.last().map(|r| r.day), Some(r.last_day()));
    }

    #[test]
    fn malformed_embedded_room_is_skipped() {
        let p = parse_property(&json!({
            "id": 4521,
            "roomTypes": [{"name": "no id"}, {"id": 10919, "name": "Double"}]
        }))
        .unwrap();
        assert_eq!(p.room_types.len(), 1);
        assert_eq!(p.room_types[0].external_id, "10919");
    }

    #[test]
    fn reservation_fields() {
        let v = json!({
            "id": 77, "propertyId": 4521, "roomId": 10919, "status": "cancelled",
            "arrival": "2025-12-30", "departure": "2025-12-31",
            "firstName": "Ana", "lastName": "Horvat", "numAdult": 2, "price": "240.00"
        });
        let r = parse_reservation(&v).unwrap();
        assert_eq!(r.external_id, "77");
        assert_eq!(r.status, BookingStatus::Cancelled);
        assert_eq!(r.guest_name.as_deref(), Some("Ana Horvat"));
        assert_eq!(r.adults, Some(2));
        assert_eq!(r.total_price, Some(240.0));
    }
}
