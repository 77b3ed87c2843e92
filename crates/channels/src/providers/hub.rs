//! Meta-integration: one vendor API fronting many PMS backends.
//!
//! Requests carry the account API key plus the code of the PMS backend the
//! vendor should route to. Backends expose different URL shapes for the
//! same resource, so listing, room types, availability and rates all go
//! through endpoint-variant fallback. Reservation writes are not offered.

use async_trait::async_trait;
use reqwest::RequestBuilder;
use serde_json::Value;
use staysync_core::availability::BookingStatus;
use staysync_core::cadence::DateRange;
use staysync_core::sync_error::{SyncError, SyncResult};

use crate::adapter::ChannelAdapter;
use crate::capability::{Capabilities, Capability};
use crate::dto::{
    DayDto, Page, Pagination, PropertyDto, RateDto, ReservationDto, ReservationFilter,
    RoomTypeDto,
};
use crate::http::{ConnectionContext, EndpointVariant};
use crate::normalize::{
    bed_configuration, coordinates, list_items, occupancy, parse_each, pick, pick_bool, pick_date,
    pick_f64, pick_i32, pick_str,
};

pub const PROVIDER: &str = "hub";

pub const API_KEY_HEADER: &str = "X-Api-Key";
pub const BACKEND_HEADER: &str = "X-Pms-Code";

const ITEM_CONTAINERS: &[&str] = &[
    "data",
    "results",
    "items",
    "properties",
    "listings",
    "room_types",
    "roomTypes",
    "units",
    "availability",
    "rates",
    "reservations",
];

const CAPABILITIES: Capabilities = Capabilities::empty()
    .with(Capability::Authenticate)
    .with(Capability::ListProperties)
    .with(Capability::GetProperty)
    .with(Capability::ListRoomTypes)
    .with(Capability::GetAvailability)
    .with(Capability::GetRates)
    .with(Capability::ListReservations);

pub struct HubAdapter {
    ctx: ConnectionContext,
}

impl HubAdapter {
    pub fn new(ctx: ConnectionContext) -> Self {
        Self { ctx }
    }

    fn api_key(&self) -> SyncResult<&str> {
        self.ctx
            .credential("api_key")
            .ok_or_else(|| SyncError::auth_failed("Missing api_key credential"))
    }

    fn request(&self, api_key: &str, variant: &EndpointVariant) -> RequestBuilder {
        let mut request = self
            .ctx
            .client
            .get(self.ctx.url(&variant.path))
            .header(API_KEY_HEADER, api_key)
            .query(&variant.query);
        if let Some(backend) = self.ctx.credential("backend_code") {
            request = request.header(BACKEND_HEADER, backend);
        }
        request
    }

    async fn fetch(&self, operation: &str, variants: &[EndpointVariant]) -> SyncResult<Value> {
        let api_key = self.api_key()?;
        self.ctx
            .send_with_variants(operation, variants, |v| self.request(api_key, v))
            .await
    }
}

#[async_trait]
impl ChannelAdapter for HubAdapter {
    fn provider(&self) -> &'static str {
        PROVIDER
    }

    fn capabilities(&self) -> Capabilities {
        CAPABILITIES
    }

    async fn authenticate(&self) -> SyncResult<()> {
        self.fetch("account", &[EndpointVariant::new("/v1/account")])
            .await
            .map(|_| ())
    }

    async fn list_properties(&self, page: Pagination) -> SyncResult<Page<PropertyDto>> {
        let variants = ["/v1/properties", "/v1/listings"].map(|path| {
            EndpointVariant::new(path)
                .param("page", page.page)
                .param("per_page", page.per_page)
        });
        let body = self.fetch("list_properties", &variants).await?;
        let items = parse_each(list_items(&body, ITEM_CONTAINERS), "hub property", parse_property);
        Ok(Page {
            items,
            next: has_next_page(&body).then(|| page.next()),
        })
    }

    async fn get_property(&self, external_id: &str) -> SyncResult<PropertyDto> {
        let variants = [
            EndpointVariant::new(format!("/v1/properties/{external_id}")),
            EndpointVariant::new(format!("/v1/listings/{external_id}")),
        ];
        let body = self.fetch("get_property", &variants).await?;
        parse_property(body.get("data").unwrap_or(&body))
    }

    async fn list_room_types(&self, property_external_id: &str) -> SyncResult<Vec<RoomTypeDto>> {
        let variants = [
            EndpointVariant::new(format!("/v1/properties/{property_external_id}/room-types")),
            EndpointVariant::new(format!("/v1/properties/{property_external_id}/units")),
        ];
        let body = self.fetch("list_room_types", &variants).await?;
        let scope = format!("hub room type of property {property_external_id}");
        Ok(parse_each(list_items(&body, ITEM_CONTAINERS), &scope, |v| {
            parse_room_type(v, property_external_id)
        }))
    }

    async fn get_availability(
        &self,
        property_external_id: &str,
        room_external_id: &str,
        range: DateRange,
    ) -> SyncResult<Vec<DayDto>> {
        let variants = [
            EndpointVariant::new(format!(
                "/v1/properties/{property_external_id}/room-types/{room_external_id}/availability"
            ))
            .param("from", range.start)
            .param("to", range.end),
            EndpointVariant::new("/v1/availability")
                .param("property_id", property_external_id)
                .param("room_type_id", room_external_id)
                .param("start_date", range.start)
                .param("end_date", range.last_day()),
        ];
        let body = self.fetch("availability", &variants).await?;
        let scope = format!("hub availability of room type {room_external_id}");
        Ok(parse_each(list_items(&body, ITEM_CONTAINERS), &scope, parse_day)
            .into_iter()
            .filter(|d| range.contains(d.day))
            .collect())
    }

    async fn get_rates(
        &self,
        property_external_id: &str,
        room_external_id: &str,
        range: DateRange,
    ) -> SyncResult<Vec<RateDto>> {
        let variants = [
            EndpointVariant::new(format!(
                "/v1/properties/{property_external_id}/room-types/{room_external_id}/rates"
            ))
            .param("from", range.start)
            .param("to", range.end),
            EndpointVariant::new("/v1/rates")
                .param("property_id", property_external_id)
                .param("room_type_id", room_external_id)
                .param("start_date", range.start)
                .param("end_date", range.last_day()),
        ];
        let body = self.fetch("rates", &variants).await?;
        let scope = format!("hub rates of room type {room_external_id}");
        Ok(parse_each(list_items(&body, ITEM_CONTAINERS), &scope, parse_rate)
            .into_iter()
            .filter(|r| range.contains(r.day))
            .collect())
    }

    async fn list_reservations(
        &self,
        filter: &ReservationFilter,
    ) -> SyncResult<Vec<ReservationDto>> {
        let mut variant = EndpointVariant::new("/v1/reservations");
        if let Some(property) = &filter.property_external_id {
            variant = variant.param("property_id", property);
        }
        if let Some(since) = filter.modified_since {
            variant = variant.param("updated_since", since.to_rfc3339());
        }
        if let Some(from) = filter.arrival_from {
            variant = variant.param("arrival_from", from);
        }
        if let Some(to) = filter.arrival_to {
            variant = variant.param("arrival_to", to);
        }
        let body = self.fetch("list_reservations", &[variant]).await?;
        Ok(parse_each(
            list_items(&body, ITEM_CONTAINERS),
            "hub reservation",
            parse_reservation,
        ))
    }
}

// ---------------------------------------------------------------------------
// Payload parsing
// ---------------------------------------------------------------------------

fn has_next_page(body: &Value) -> bool {
    let meta = pick(body, &["meta", "pagination"]).unwrap_or(body);
    pick_i32(meta, &["next_page", "nextPage"]).is_some()
        || pick_bool(meta, &["has_more", "hasMore"]).unwrap_or(false)
}

fn parse_property(v: &Value) -> SyncResult<PropertyDto> {
    let external_id = pick_str(v, &["id", "property_id", "propertyId", "listing_id"])
        .ok_or_else(|| SyncError::validation("Hub property without id"))?;
    let (latitude, longitude) = coordinates(v);
    let address = v.get("address");
    let address_line = match address {
        Some(Value::Object(_)) => address.and_then(|a| pick_str(a, &["line1", "street"])),
        _ => pick_str(v, &["address", "street"]),
    };
    let nested = address.filter(|a| a.is_object()).unwrap_or(v);
    Ok(PropertyDto {
        name: pick_str(v, &["name", "title", "property_name"]).unwrap_or_default(),
        description: pick_str(v, &["description", "summary"]),
        address: address_line,
        city: pick_str(nested, &["city", "town"]),
        country_code: pick_str(nested, &["country_code", "countryCode", "country"]),
        latitude,
        longitude,
        currency: pick_str(v, &["currency", "currency_code"]),
        timezone: pick_str(v, &["timezone", "time_zone"]),
        room_types: Vec::new(),
        raw: v.clone(),
        external_id,
    })
}

fn parse_room_type(v: &Value, property_external_id: &str) -> SyncResult<RoomTypeDto> {
    let external_id = pick_str(v, &["id", "room_type_id", "roomTypeId", "unit_id"])
        .ok_or_else(|| SyncError::validation("Hub room type without id"))?;
    Ok(RoomTypeDto {
        property_external_id: property_external_id.to_string(),
        name: pick_str(v, &["name", "title"]).unwrap_or_default(),
        max_occupancy: occupancy(v),
        bedrooms: pick_i32(v, &["bedrooms", "bedroom_count"]),
        bathrooms: pick_f64(v, &["bathrooms", "bathroom_count"]),
        bed_configuration: bed_configuration(v),
        quantity: pick_i32(v, &["quantity", "count", "units", "inventory"]).unwrap_or(1),
        raw: v.clone(),
        external_id,
    })
}

/// One availability item; it needs a date and either a flag or a unit count.
fn parse_day(v: &Value) -> SyncResult<DayDto> {
    let day = pick_date(v, &["date", "day"])
        .ok_or_else(|| SyncError::validation("Hub availability item without date"))?;
    let units = pick_i32(v, &["units_available", "available_units", "availableUnits"]);
    let available = pick_bool(v, &["available", "is_available", "isAvailable", "open"])
        .or(units.map(|u| u > 0))
        .ok_or_else(|| SyncError::validation(format!("Hub availability for {day} without status")))?;
    Ok(DayDto {
        day,
        available,
        units_available: units,
        raw: v.clone(),
    })
}

fn parse_rate(v: &Value) -> SyncResult<RateDto> {
    Ok(RateDto {
        day: pick_date(v, &["date", "day"])
            .ok_or_else(|| SyncError::validation("Hub rate item without date"))?,
        price: pick_f64(v, &["price", "rate", "amount", "nightly_rate"]),
        min_stay: pick_i32(v, &["min_stay", "minStay", "minimum_stay"]),
        currency: pick_str(v, &["currency", "currency_code"]),
        raw: v.clone(),
    })
}

fn parse_reservation(v: &Value) -> SyncResult<ReservationDto> {
    let external_id = pick_str(v, &["id", "reservation_id", "booking_id"])
        .ok_or_else(|| SyncError::validation("Hub reservation without id"))?;
    let arrival = pick_date(v, &["arrival", "check_in", "checkin", "start_date"])
        .ok_or_else(|| SyncError::validation(format!("Hub reservation {external_id} without arrival")))?;
    let departure = pick_date(v, &["departure", "check_out", "checkout", "end_date"])
        .ok_or_else(|| SyncError::validation(format!("Hub reservation {external_id} without departure")))?;
    let status = pick_str(v, &["status", "state"])
        .and_then(|s| BookingStatus::from_alias(&s))
        .unwrap_or(BookingStatus::Confirmed);
    let guest = v.get("guest").unwrap_or(v);
    Ok(ReservationDto {
        property_external_id: pick_str(v, &["property_id", "propertyId", "listing_id"]),
        room_external_id: pick_str(v, &["room_type_id", "roomTypeId", "unit_id"]),
        status,
        arrival,
        departure,
        guest_name: pick_str(guest, &["guest_name", "name", "full_name"]),
        adults: pick_i32(v, &["adults", "number_of_adults"]),
        children: pick_i32(v, &["children", "number_of_children"]),
        total_price: pick_f64(v, &["total_price", "total", "amount"]),
        currency: pick_str(v, &["currency", "currency_code"]),
        raw: v.clone(),
        external_id,
    })
}
