use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use staysync_core::error::CoreError;
use staysync_core::sync_error::{SyncError, SyncErrorKind};

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and [`SyncError`] for failures
/// surfaced by the engine and its store. Implements [`IntoResponse`] to
/// produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `staysync_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// An engine or store error.
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} with id {id} not found"),
                ),
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
                CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal core error");
                    internal()
                }
            },

            // --- Engine errors ---
            AppError::Sync(err) => classify_sync_error(err),

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                internal()
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

fn internal() -> (StatusCode, &'static str, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}

/// Classify an engine error into an HTTP status, error code, and message.
///
/// - `NOT_FOUND` maps to 404 and `VALIDATION` to 400, keeping the message.
/// - Transient store failures (`TIMEOUT`, `NETWORK`) map to 503.
/// - Everything else maps to 500 with a sanitized message.
fn classify_sync_error(err: &SyncError) -> (StatusCode, &'static str, String) {
    match err.kind {
        SyncErrorKind::NotFound => (StatusCode::NOT_FOUND, "NOT_FOUND", err.message.clone()),
        SyncErrorKind::Validation => {
            (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", err.message.clone())
        }
        SyncErrorKind::Timeout | SyncErrorKind::Network => {
            tracing::warn!(error = %err, "Store unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "UNAVAILABLE",
                "The service is temporarily unavailable".to_string(),
            )
        }
        _ => {
            tracing::error!(error = %err, "Engine error");
            internal()
        }
    }
}
