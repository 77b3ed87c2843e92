//! Route definitions for provider webhook deliveries.

use axum::routing::post;
use axum::Router;

use crate::handlers::webhooks;
use crate::state::AppState;

/// Routes mounted at `/webhooks`.
///
/// ```text
/// POST   /{provider}?connectionId={id}   -> receive
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/{provider}", post(webhooks::receive))
}
