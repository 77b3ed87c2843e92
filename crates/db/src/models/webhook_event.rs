//! Inbound webhook event models.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use sqlx::FromRow;
use staysync_core::error::CoreError;
use staysync_core::types::{DbId, Timestamp};

/// Processing status of a stored webhook event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookEventStatus {
    Received,
    Processed,
    Failed,
    /// Valid but carried nothing to apply (unmapped room, tentative booking).
    Ignored,
}

impl WebhookEventStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Processed => "processed",
            Self::Failed => "failed",
            Self::Ignored => "ignored",
        }
    }
}

impl fmt::Display for WebhookEventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WebhookEventStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "received" => Ok(Self::Received),
            "processed" => Ok(Self::Processed),
            "failed" => Ok(Self::Failed),
            "ignored" => Ok(Self::Ignored),
            other => Err(CoreError::Validation(format!(
                "Unknown webhook event status: {other}"
            ))),
        }
    }
}

/// A row from the `webhook_events` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct WebhookEvent {
    pub id: DbId,
    pub connection_id: DbId,
    pub provider: String,
    pub provider_event_id: String,
    pub event_type: Option<String>,
    pub payload: serde_json::Value,
    pub status: String,
    pub error: Option<String>,
    pub retry_count: i32,
    pub received_at: Timestamp,
    pub processed_at: Option<Timestamp>,
    pub updated_at: Timestamp,
}

/// DTO for recording an inbound webhook.
#[derive(Debug, Clone)]
pub struct NewWebhookEvent {
    pub connection_id: DbId,
    pub provider: String,
    pub provider_event_id: String,
    pub event_type: Option<String>,
    pub payload: serde_json::Value,
}
