//! Provider webhook payload parsing.
//!
//! Providers push booking create/modify/cancel events in their own shapes.
//! [`parse_webhook`] reduces them to a [`WebhookNotice`]: which room, which
//! nights, and whether inventory should be blocked or released.

use serde_json::Value;
use staysync_core::availability::BookingStatus;
use staysync_core::sync_error::{SyncError, SyncResult};

use crate::dto::WebhookNotice;
use crate::normalize::{pick, pick_date, pick_str};
use crate::registry::Provider;

const BOOKING_CONTAINERS: &[&str] = &["booking", "reservation", "data", "payload"];
const BOOKING_ID_ALIASES: &[&str] = &[
    "bookingId",
    "booking_id",
    "bookId",
    "reservationId",
    "reservation_id",
];
const ROOM_ALIASES: &[&str] = &[
    "roomExternalId",
    "roomId",
    "room_id",
    "roomTypeId",
    "room_type_id",
    "unitId",
    "unit_id",
];
const STATUS_ALIASES: &[&str] = &["status", "bookingStatus", "booking_status", "state"];
const EVENT_TYPE_ALIASES: &[&str] = &["event", "eventType", "event_type", "action", "type"];
const ARRIVAL_ALIASES: &[&str] = &["arrival", "checkIn", "check_in", "checkin", "firstNight", "start_date"];
const DEPARTURE_ALIASES: &[&str] = &["departure", "checkOut", "check_out", "checkout", "end_date"];

/// Top-level keys holding the provider's own event id.
fn event_id_aliases(provider: Provider) -> &'static [&'static str] {
    match provider {
        Provider::Beds24 => &["eventId", "webhookId", "notificationId"],
        Provider::Hub => &["event_id", "eventId", "id"],
    }
}

/// Parse a webhook body. A missing room, date or status is a `VALIDATION` error.
pub fn parse_webhook(provider: Provider, payload: &Value) -> SyncResult<WebhookNotice> {
    if !payload.is_object() {
        return Err(SyncError::validation("Webhook body is not a JSON object"));
    }
    let booking = pick(payload, BOOKING_CONTAINERS)
        .filter(|b| b.is_object())
        .unwrap_or(payload);
    let field = |aliases: &[&str]| pick_str(booking, aliases).or_else(|| pick_str(payload, aliases));

    let event_type = pick_str(payload, EVENT_TYPE_ALIASES);
    let status = field(STATUS_ALIASES)
        .and_then(|s| BookingStatus::from_alias(&s))
        .or_else(|| event_type.as_deref().and_then(status_from_event_type))
        .ok_or_else(|| SyncError::validation("Webhook carries no recognizable booking status"))?;

    let room_external_id =
        field(ROOM_ALIASES).ok_or_else(|| SyncError::validation("Webhook carries no room id"))?;
    let arrival = pick_date(booking, ARRIVAL_ALIASES)
        .or_else(|| pick_date(payload, ARRIVAL_ALIASES))
        .ok_or_else(|| SyncError::validation("Webhook carries no arrival date"))?;
    let departure = pick_date(booking, DEPARTURE_ALIASES)
        .or_else(|| pick_date(payload, DEPARTURE_ALIASES))
        .ok_or_else(|| SyncError::validation("Webhook carries no departure date"))?;
    if departure < arrival {
        return Err(SyncError::validation(format!(
            "Webhook departure {departure} is before arrival {arrival}"
        )));
    }

    let booking_external_id = field(BOOKING_ID_ALIASES).or_else(|| {
        // A nested booking object's own `id` is the booking id.
        (!std::ptr::eq(booking, payload))
            .then(|| pick_str(booking, &["id"]))
            .flatten()
    });

    Ok(WebhookNotice {
        event_id: pick_str(payload, event_id_aliases(provider)),
        event_type,
        booking_external_id,
        room_external_id,
        status,
        arrival,
        departure,
        raw: payload.clone(),
    })
}

/// Status implied by dotted/underscored event names such as `booking.cancelled`.
fn status_from_event_type(event_type: &str) -> Option<BookingStatus> {
    let lower = event_type.to_ascii_lowercase();
    if lower.contains("cancel") || lower.contains("delete") {
        Some(BookingStatus::Cancelled)
    } else if ["new", "create", "confirm", "modif", "update"]
        .iter()
        .any(|k| lower.contains(k))
    {
        Some(BookingStatus::Confirmed)
    } else if ["request", "inquiry", "enquiry"].iter().any(|k| lower.contains(k)) {
        Some(BookingStatus::Tentative)
    } else {
        None
    }
}
