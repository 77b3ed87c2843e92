//! Handlers for the `/connections` resource.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use staysync_core::cadence::SyncKind;
use staysync_core::error::CoreError;
use staysync_core::types::DbId;
use staysync_db::models::connection::ConnectionStatusView;
use staysync_sync::StartOutcome;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// GET /api/v1/connections/{id}/status
///
/// The connection's lifecycle status together with its last error, which is
/// the only place a failed sync becomes visible to the property manager.
pub async fn get_status(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<ConnectionStatusView>>> {
    let connection = state
        .store
        .connection(id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Connection",
            id,
        }))?;

    Ok(Json(DataResponse {
        data: ConnectionStatusView::from(&connection),
    }))
}

// ---------------------------------------------------------------------------
// On-demand sync
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct SyncTriggered {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<Uuid>,
}

/// POST /api/v1/connections/{id}/sync
///
/// Starts a full import in the background. Returns 202 with the run id, or
/// 409 with `already_running` while a full import of the connection is in flight.
pub async fn trigger_sync(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let response = match state.runner.start(id, SyncKind::FullImport).await? {
        StartOutcome::Started { run_id } => {
            tracing::info!(connection_id = id, %run_id, "Full import triggered");
            (
                StatusCode::ACCEPTED,
                Json(DataResponse {
                    data: SyncTriggered {
                        status: "started",
                        run_id: Some(run_id),
                    },
                }),
            )
        }
        StartOutcome::AlreadyRunning => {
            tracing::info!(connection_id = id, "Full import requested while one is running");
            (
                StatusCode::CONFLICT,
                Json(DataResponse {
                    data: SyncTriggered {
                        status: "already_running",
                        run_id: None,
                    },
                }),
            )
        }
    };

    Ok(response)
}
