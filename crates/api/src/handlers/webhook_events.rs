use axum::extract::{Path, State};
use axum::Json;
use staysync_core::types::DbId;
use staysync_sync::WebhookReceipt;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/webhook-events/{id}/replay
///
/// Reprocesses a stored event from its original payload and bumps its
/// retry count.
pub async fn replay_event(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<WebhookReceipt>>> {
    let receipt = state.webhooks.replay(id).await?;
    tracing::info!(event_id = id, outcome = receipt.outcome.as_str(), "Webhook event replayed");
    Ok(Json(DataResponse { data: receipt }))
}
