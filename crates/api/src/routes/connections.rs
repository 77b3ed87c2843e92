//! Route definitions for the `/connections` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::connections;
use crate::state::AppState;

/// Routes mounted at `/connections`.
///
/// ```text
/// GET    /{id}/status    -> get_status
/// POST   /{id}/sync      -> trigger_sync
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}/status", get(connections::get_status))
        .route("/{id}/sync", post(connections::trigger_sync))
}
