//! Provider connection models.

use serde::Serialize;
use sqlx::FromRow;
use staysync_core::connection::ConnectionStatus;
use staysync_core::types::{DbId, Timestamp};

/// A row from the `connections` table.
///
/// Credentials and tokens are never serialized to responses.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Connection {
    pub id: DbId,
    pub account_id: DbId,
    pub provider: String,
    pub display_name: Option<String>,
    #[serde(skip_serializing)]
    pub credentials: serde_json::Value,
    #[serde(skip_serializing)]
    pub access_token: Option<String>,
    #[serde(skip_serializing)]
    pub refresh_token: Option<String>,
    pub token_expires_at: Option<Timestamp>,
    pub status: String,
    pub sync_enabled: bool,
    pub sync_interval_secs: i32,
    pub requests_per_minute: Option<i32>,
    pub last_sync_at: Option<Timestamp>,
    pub next_sync_at: Option<Timestamp>,
    pub last_error: Option<String>,
    pub last_error_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Connection {
    /// Parsed lifecycle status. Unknown values are treated as `error`.
    pub fn status(&self) -> ConnectionStatus {
        self.status.parse().unwrap_or(ConnectionStatus::Error)
    }

    /// Whether the scheduler may start a run for this connection.
    pub fn is_schedulable(&self) -> bool {
        self.sync_enabled && self.status().is_schedulable()
    }

    /// Whether the stored access token is missing or expires within `skew`.
    pub fn token_needs_refresh(&self, now: Timestamp, skew: chrono::Duration) -> bool {
        if self.refresh_token.is_none() {
            return false;
        }
        match (&self.access_token, self.token_expires_at) {
            (None, _) => true,
            (Some(_), Some(expires_at)) => expires_at <= now + skew,
            (Some(_), None) => false,
        }
    }
}

/// Status view exposed to the admin UI: the single user-visible failure surface.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionStatusView {
    pub id: DbId,
    pub provider: String,
    pub status: String,
    pub sync_enabled: bool,
    pub last_sync_at: Option<Timestamp>,
    pub next_sync_at: Option<Timestamp>,
    pub last_error: Option<String>,
    pub last_error_at: Option<Timestamp>,
}

impl From<&Connection> for ConnectionStatusView {
    fn from(c: &Connection) -> Self {
        Self {
            id: c.id,
            provider: c.provider.clone(),
            status: c.status.clone(),
            sync_enabled: c.sync_enabled,
            last_sync_at: c.last_sync_at,
            next_sync_at: c.next_sync_at,
            last_error: c.last_error.clone(),
            last_error_at: c.last_error_at,
        }
    }
}

/// Fresh tokens returned by a provider token refresh.
#[derive(Debug, Clone)]
pub struct TokenUpdate {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<Timestamp>,
}
