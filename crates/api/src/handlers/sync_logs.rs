use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use staysync_core::types::DbId;
use staysync_db::models::sync_log::{SyncLogEntry, SyncLogQuery, SyncLogStatus};

use crate::error::{AppError, AppResult};
use crate::query::parse_timestamp;
use crate::response::DataResponse;
use crate::state::AppState;

/// Query parameters for `GET /sync-logs`.
#[derive(Debug, Deserialize)]
pub struct SyncLogParams {
    pub connection_id: Option<DbId>,
    pub status: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// GET /api/v1/sync-logs
///
/// Newest entries first. `from` is inclusive and `to` exclusive.
pub async fn list_sync_logs(
    State(state): State<AppState>,
    Query(params): Query<SyncLogParams>,
) -> AppResult<Json<DataResponse<Vec<SyncLogEntry>>>> {
    let status = params
        .status
        .as_deref()
        .map(str::parse::<SyncLogStatus>)
        .transpose()?;

    let query = SyncLogQuery {
        connection_id: params.connection_id,
        status: status.map(|s| s.as_str().to_string()),
        from: parse_timestamp("from", params.from.as_deref())?,
        to: parse_timestamp("to", params.to.as_deref())?,
        limit: params.limit,
        offset: params.offset,
    };
    if let (Some(from), Some(to)) = (query.from, query.to) {
        if from > to {
            return Err(AppError::BadRequest("from must not be after to".into()));
        }
    }

    let entries = state.store.query_sync_logs(&query).await?;
    Ok(Json(DataResponse { data: entries }))
}
