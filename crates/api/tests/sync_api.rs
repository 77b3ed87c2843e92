//! Integration tests for the operator endpoints: Sync Log query, connection
//! status and on-demand full import.

mod common;

use std::time::Duration;

use axum::http::StatusCode;
use chrono::Utc;
use common::{body_json, get, map_room, post_empty, post_json};
use serde_json::json;
use staysync_core::cadence::SyncKind;
use staysync_core::connection::ConnectionStatus;
use staysync_core::sync_error::SyncError;
use staysync_sync::SyncStore;

async fn deliver(t: &common::TestApp, event_id: &str, status: &str) {
    let body = json!({
        "eventId": event_id,
        "roomExternalId": "10919",
        "status": status,
        "arrival": "2026-05-01",
        "departure": "2026-05-03",
    });
    let uri = format!("/webhooks/beds24?connectionId={}", t.connection.id);
    assert_eq!(post_json(&t.app, &uri, &body).await.status(), StatusCode::OK);
}

// ---------------------------------------------------------------------------
// Sync Log
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sync_logs_filter_by_connection_and_status() {
    let t = common::build_test_app();
    map_room(&t.store, &t.connection);
    deliver(&t, "evt-1", "confirmed").await;
    deliver(&t, "evt-1", "confirmed").await;

    let all = body_json(get(&t.app, &format!("/api/v1/sync-logs?connection_id={}", t.connection.id)).await).await;
    assert_eq!(all["data"].as_array().unwrap().len(), 2);

    let skipped = body_json(
        get(
            &t.app,
            &format!("/api/v1/sync-logs?connection_id={}&status=skipped", t.connection.id),
        )
        .await,
    )
    .await;
    let entries = skipped["data"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["entity_type"], "webhook");

    let other = body_json(get(&t.app, "/api/v1/sync-logs?connection_id=999999").await).await;
    assert!(other["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn sync_logs_paginate_newest_first() {
    let t = common::build_test_app();
    map_room(&t.store, &t.connection);
    deliver(&t, "evt-1", "confirmed").await;
    deliver(&t, "evt-2", "cancelled").await;

    let page = body_json(get(&t.app, "/api/v1/sync-logs?limit=1").await).await;
    let entries = page["data"].as_array().unwrap();
    assert_eq!(entries.len(), 1);

    let next = body_json(get(&t.app, "/api/v1/sync-logs?limit=1&offset=1").await).await;
    let older = next["data"].as_array().unwrap();
    assert_eq!(older.len(), 1);
    assert!(entries[0]["id"].as_i64() > older[0]["id"].as_i64());
}

#[tokio::test]
async fn sync_logs_reject_bad_filters() {
    let t = common::build_test_app();

    let response = get(&t.app, "/api/v1/sync-logs?status=done").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");

    let response = get(&t.app, "/api/v1/sync-logs?from=last-week").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = get(&t.app, "/api/v1/sync-logs?from=2026-02-01&to=2026-01-01").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Connection status
// ---------------------------------------------------------------------------

#[tokio::test]
async fn connection_status_exposes_last_error() {
    let t = common::build_test_app();
    let error = SyncError::auth_failed("Token revoked");
    t.store
        .record_failure(
            t.connection.id,
            ConnectionStatus::NeedsAttention,
            &error.to_string(),
            Utc::now(),
            false,
        )
        .await
        .unwrap();

    let response = get(&t.app, &format!("/api/v1/connections/{}/status", t.connection.id)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let data = &json["data"];
    assert_eq!(data["id"], t.connection.id);
    assert_eq!(data["provider"], "beds24");
    assert_eq!(data["status"], "needs_attention");
    assert!(data["last_error"].as_str().unwrap().contains("Token revoked"));
    assert!(data["last_error_at"].is_string());
}

#[tokio::test]
async fn unknown_connection_status_returns_404() {
    let t = common::build_test_app();

    let response = get(&t.app, "/api/v1/connections/999999/status").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// On-demand full import
// ---------------------------------------------------------------------------

#[tokio::test]
async fn trigger_sync_starts_a_full_import() {
    let t = common::build_test_app();

    let response = post_empty(&t.app, &format!("/api/v1/connections/{}/sync", t.connection.id)).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let json = body_json(response).await;
    let data = &json["data"];
    assert_eq!(data["status"], "started");
    assert!(data["run_id"].is_string());
}

#[tokio::test]
async fn trigger_sync_while_locked_reports_already_running() {
    let t = common::build_test_app();
    assert!(t
        .store
        .try_lock(t.connection.id, SyncKind::FullImport, Duration::from_secs(60))
        .await
        .unwrap());

    let response = post_empty(&t.app, &format!("/api/v1/connections/{}/sync", t.connection.id)).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["data"]["status"], "already_running");
}

#[tokio::test]
async fn trigger_sync_on_disabled_connection_is_rejected() {
    let t = common::build_test_app();
    t.store
        .update_connection(t.connection.id, |c| c.status = "disabled".into());

    let response = post_empty(&t.app, &format!("/api/v1/connections/{}/sync", t.connection.id)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn trigger_sync_for_unknown_connection_returns_404() {
    let t = common::build_test_app();

    let response = post_empty(&t.app, "/api/v1/connections/999999/sync").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
