//! Integration tests for `POST /webhooks/{provider}` and event replay.

mod common;

use axum::http::StatusCode;
use chrono::NaiveDate;
use common::{body_json, map_room, post_empty, post_json, post_raw, UNIT};
use serde_json::{json, Value};
use staysync_core::availability::AvailabilitySource;

fn booking(event_id: &str, status: &str) -> Value {
    json!({
        "eventId": event_id,
        "roomExternalId": "10919",
        "status": status,
        "arrival": "2026-03-10",
        "departure": "2026-03-12",
    })
}

fn uri(provider: &str, connection_id: i64) -> String {
    format!("/webhooks/{provider}?connectionId={connection_id}")
}

#[tokio::test]
async fn confirmed_booking_blocks_nights_and_redelivery_dedupes() {
    let t = common::build_test_app();
    map_room(&t.store, &t.connection);

    let response = post_json(&t.app, &uri("beds24", t.connection.id), &booking("evt-1", "confirmed")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["received"], true);
    assert_eq!(json["status"], "processed");
    assert!(json["event_id"].is_i64());

    let night = NaiveDate::from_ymd_opt(2026, 3, 11).unwrap();
    let row = t.store.availability_day(UNIT, night).unwrap();
    assert!(!row.available);
    assert_eq!(row.source(), Some(AvailabilitySource::Webhook));

    let again = post_json(&t.app, &uri("beds24", t.connection.id), &booking("evt-1", "confirmed")).await;
    assert_eq!(again.status(), StatusCode::OK);
    assert_eq!(body_json(again).await["status"], "duplicate");
    assert_eq!(t.store.webhook_events().len(), 1);
}

#[tokio::test]
async fn unmapped_room_is_acknowledged_as_ignored() {
    let t = common::build_test_app();

    let response = post_json(&t.app, &uri("beds24", t.connection.id), &booking("evt-2", "confirmed")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "ignored");
    assert_eq!(t.store.availability_rows(), 0);
}

#[tokio::test]
async fn unparseable_body_is_recorded_as_failed_with_200() {
    let t = common::build_test_app();

    let response = post_raw(&t.app, &uri("beds24", t.connection.id), "not json at all").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["received"], true);
    assert_eq!(json["status"], "failed");

    let events = t.store.webhook_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].status, "failed");
}

#[tokio::test]
async fn store_outage_on_lookup_is_acknowledged_not_5xx() {
    let t = common::build_test_app();
    t.store.fail_connection_lookups(true);

    let response = post_json(&t.app, &uri("beds24", t.connection.id), &booking("evt-5", "confirmed")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["received"], true);
    assert_eq!(json["status"], "failed");
}

#[tokio::test]
async fn store_outage_on_event_insert_is_acknowledged_not_5xx() {
    let t = common::build_test_app();
    map_room(&t.store, &t.connection);
    t.store.fail_webhook_inserts(true);

    let response = post_json(&t.app, &uri("beds24", t.connection.id), &booking("evt-6", "confirmed")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "failed");
    assert!(t.store.webhook_events().is_empty());
    assert_eq!(t.store.availability_rows(), 0);
}

#[tokio::test]
async fn unknown_connection_returns_404() {
    let t = common::build_test_app();

    let response = post_json(&t.app, &uri("beds24", 999_999), &booking("evt-3", "confirmed")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "NOT_FOUND");
    assert!(t.store.webhook_events().is_empty());
}

#[tokio::test]
async fn provider_mismatch_returns_404() {
    let t = common::build_test_app();

    let response = post_json(&t.app, &uri("hub", t.connection.id), &booking("evt-4", "confirmed")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = post_json(&t.app, &uri("smoobu", t.connection.id), &booking("evt-4", "confirmed")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(t.store.webhook_events().is_empty());
}

#[tokio::test]
async fn missing_connection_id_is_rejected() {
    let t = common::build_test_app();

    let response = post_json(&t.app, "/webhooks/beds24", &booking("evt-5", "confirmed")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn replaying_a_failed_event_bumps_its_retry_count() {
    let t = common::build_test_app();
    let mut payload = booking("evt-6", "confirmed");
    payload.as_object_mut().unwrap().remove("arrival");
    let first = body_json(post_json(&t.app, &uri("beds24", t.connection.id), &payload).await).await;
    assert_eq!(first["status"], "failed");
    let event_id = first["event_id"].as_i64().unwrap();

    let response = post_empty(&t.app, &format!("/api/v1/webhook-events/{event_id}/replay")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["outcome"], "failed");

    let event = t.store.webhook_events().into_iter().find(|e| e.id == event_id).unwrap();
    assert_eq!(event.retry_count, 1);
}

#[tokio::test]
async fn replaying_unknown_event_returns_404() {
    let t = common::build_test_app();

    let response = post_empty(&t.app, "/api/v1/webhook-events/424242/replay").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
