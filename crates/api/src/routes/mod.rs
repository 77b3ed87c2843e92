pub mod connections;
pub mod health;
pub mod sync_logs;
pub mod webhook_events;
pub mod webhooks;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /sync-logs                              query the Sync Log (GET)
///
/// /connections/{id}/status                connection health (GET)
/// /connections/{id}/sync                  trigger a full import (POST)
///
/// /webhook-events/{id}/replay             reprocess a stored event (POST)
/// ```
///
/// Provider webhooks (`/webhooks/{provider}`) and `/health` are mounted at
/// the root by [`crate::router::build_app_router`].
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/sync-logs", sync_logs::router())
        .nest("/connections", connections::router())
        .nest("/webhook-events", webhook_events::router())
}
