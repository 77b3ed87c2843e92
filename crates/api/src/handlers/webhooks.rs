//! Handler for provider webhook deliveries.
//!
//! Unless the target connection is unknown the provider always gets a `200`
//! acknowledgement, store outages included. Processing failures are recorded
//! on the stored event and in the Sync Log; the next reconciliation sweep
//! corrects whatever a failed delivery missed.

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use staysync_channels::registry::Provider;
use staysync_core::error::CoreError;
use staysync_core::types::DbId;
use staysync_sync::WebhookOutcome;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct WebhookParams {
    #[serde(rename = "connectionId", alias = "connection_id")]
    pub connection_id: DbId,
}

/// Flat acknowledgement returned to the provider.
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
    pub status: WebhookOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<DbId>,
}

/// POST /webhooks/{provider}?connectionId={id}
///
/// Returns 404 when the provider is unknown, the connection does not exist
/// or belongs to a different provider. Never answers with a 5xx.
pub async fn receive(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(params): Query<WebhookParams>,
    body: Bytes,
) -> AppResult<Json<WebhookAck>> {
    let connection_id = params.connection_id;
    let not_found = move || {
        AppError::Core(CoreError::NotFound {
            entity: "Connection",
            id: connection_id,
        })
    };

    let provider: Provider = provider.parse().map_err(|_| not_found())?;
    let connection = match state.store.connection(connection_id).await {
        Ok(found) => found.ok_or_else(not_found)?,
        Err(e) => {
            tracing::error!(
                connection_id,
                provider = %provider,
                error = %e,
                "Webhook connection lookup failed",
            );
            return Ok(Json(failed_ack()));
        }
    };
    if connection.provider.parse::<Provider>().ok() != Some(provider) {
        tracing::warn!(
            connection_id = connection.id,
            provider = %provider,
            connection_provider = %connection.provider,
            "Webhook provider does not match connection",
        );
        return Err(not_found());
    }

    // A body that is not JSON is still recorded; parsing then fails and the
    // event is stored as failed.
    let payload = serde_json::from_slice::<Value>(&body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body).into_owned()));

    let ack = match state.webhooks.ingest(&connection, provider, payload).await {
        Ok(receipt) => {
            tracing::info!(
                connection_id = connection.id,
                provider = %provider,
                event_id = ?receipt.event_id,
                outcome = receipt.outcome.as_str(),
                "Webhook received",
            );
            WebhookAck {
                received: true,
                status: receipt.outcome,
                event_id: receipt.event_id,
            }
        }
        Err(e) => {
            tracing::error!(
                connection_id = connection.id,
                provider = %provider,
                error = %e,
                "Webhook could not be recorded",
            );
            failed_ack()
        }
    };

    Ok(Json(ack))
}

fn failed_ack() -> WebhookAck {
    WebhookAck {
        received: true,
        status: WebhookOutcome::Failed,
        event_id: None,
    }
}
