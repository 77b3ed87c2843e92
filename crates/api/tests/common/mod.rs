#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use staysync_api::config::ServerConfig;
use staysync_api::router::build_app_router;
use staysync_api::state::AppState;
use staysync_db::models::connection::Connection;
use staysync_db::models::mapping::{NewMapping, CANONICAL_UNIT, EXTERNAL_ROOM_TYPE};
use staysync_sync::store::MemoryStore;
use staysync_sync::testing::{ScriptedAdapter, ScriptedSource};
use staysync_sync::{EngineConfig, SyncRunner, SyncStore, WebhookProcessor};
use tower::ServiceExt;

/// Canonical unit the scripted room `10919` is mapped to.
pub const UNIT: i64 = 900;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        webhook_timeout_ms: 1000,
    }
}

/// The application router over an in-memory store, plus handles the tests
/// use to arrange and inspect state.
pub struct TestApp {
    pub app: Router,
    pub store: Arc<MemoryStore>,
    pub adapter: Arc<ScriptedAdapter>,
    pub connection: Connection,
}

/// Build the full application router with the production middleware stack
/// and one `beds24` connection.
pub fn build_test_app() -> TestApp {
    let config = test_config();
    let store = Arc::new(MemoryStore::new());
    let connection = store.add_connection("beds24", serde_json::json!({}));
    let adapter = Arc::new(ScriptedAdapter::new());
    let source = Arc::new(ScriptedSource::new(Arc::clone(&adapter)));

    let runner = Arc::new(SyncRunner::new(
        store.clone(),
        source,
        EngineConfig::default(),
    ));
    let webhooks = Arc::new(WebhookProcessor::new(
        store.clone(),
        Duration::from_millis(config.webhook_timeout_ms),
    ));
    let state = AppState {
        store: store.clone(),
        runner,
        webhooks,
        config: Arc::new(config.clone()),
    };

    TestApp {
        app: build_app_router(state, &config),
        store,
        adapter,
        connection,
    }
}

/// Map the provider room `10919` of `connection` to [`UNIT`].
pub fn map_room(store: &MemoryStore, connection: &Connection) {
    store.add_mapping(&NewMapping {
        connection_id: connection.id,
        external_type: EXTERNAL_ROOM_TYPE.into(),
        external_id: "10919".into(),
        canonical_type: CANONICAL_UNIT.into(),
        canonical_id: UNIT,
    });
}

pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, Body::empty()).await
}

pub async fn post_json(app: &Router, uri: &str, body: &Value) -> Response<Body> {
    send(app, Method::POST, uri, Body::from(body.to_string())).await
}

pub async fn post_raw(app: &Router, uri: &str, body: &'static str) -> Response<Body> {
    send(app, Method::POST, uri, Body::from(body)).await
}

pub async fn post_empty(app: &Router, uri: &str) -> Response<Body> {
    send(app, Method::POST, uri, Body::empty()).await
}

async fn send(app: &Router, method: Method, uri: &str, body: Body) -> Response<Body> {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body)
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
