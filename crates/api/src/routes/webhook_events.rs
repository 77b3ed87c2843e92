use axum::routing::post;
use axum::Router;

use crate::handlers::webhook_events;
use crate::state::AppState;

/// Routes mounted at `/webhook-events`.
///
/// ```text
/// POST   /{id}/replay    -> replay_event
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/{id}/replay", post(webhook_events::replay_event))
}
