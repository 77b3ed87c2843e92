//! Availability sources, booking statuses, and write precedence.
//!
//! Every availability row records who wrote it last (`source`) and when that
//! writer observed the state (`source_at`). Writes are most-recent-wins on
//! `source_at`: a webhook mutation is provisional until a scheduled sync that
//! fetched provider state *after* the webhook arrived replaces it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// AvailabilitySource
// ---------------------------------------------------------------------------

/// Last writer of an availability row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AvailabilitySource {
    /// Scheduled or on-demand reconciliation against the provider.
    Sync,
    /// Block applied from a create/confirm webhook.
    Webhook,
    /// Unblock applied from a cancellation webhook.
    WebhookCancel,
}

impl AvailabilitySource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sync => "sync",
            Self::Webhook => "webhook",
            Self::WebhookCancel => "webhook_cancel",
        }
    }

    /// Provisional rows need re-confirmation by the next reconciliation sweep.
    pub fn is_provisional(self) -> bool {
        !matches!(self, Self::Sync)
    }
}

impl fmt::Display for AvailabilitySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AvailabilitySource {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sync" => Ok(Self::Sync),
            "webhook" => Ok(Self::Webhook),
            "webhook_cancel" => Ok(Self::WebhookCancel),
            other => Err(CoreError::Validation(format!(
                "Unknown availability source: {other}"
            ))),
        }
    }
}

/// Whether a write observed at `incoming_at` may replace a row observed at
/// `existing_at`. Ties go to the incoming writer.
pub fn supersedes(existing_at: Timestamp, incoming_at: Timestamp) -> bool {
    incoming_at >= existing_at
}

// ---------------------------------------------------------------------------
// BookingStatus
// ---------------------------------------------------------------------------

/// Normalized booking status across providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Confirmed,
    /// Request or inquiry not yet holding inventory.
    Tentative,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::Tentative => "tentative",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parse the many spellings providers use for a booking status or event
    /// action. Returns `None` for values that carry no status meaning.
    pub fn from_alias(raw: &str) -> Option<Self> {
        let normalized: String = raw
            .trim()
            .to_ascii_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        match normalized.as_str() {
            "confirmed" | "confirm" | "new" | "newreservation" | "created" | "create"
            | "booked" | "booking" | "reservationcreated" | "reservationconfirmed"
            | "modified" | "modify" | "updated" | "update" | "updatereservation"
            | "reservationmodified" | "reservationupdated" | "blocked" | "1" => {
                Some(Self::Confirmed)
            }
            "request" | "inquiry" | "enquiry" | "tentative" | "pending" | "option" => {
                Some(Self::Tentative)
            }
            "cancelled" | "canceled" | "cancel" | "cancellation" | "cancelreservation"
            | "reservationcancelled" | "reservationcanceled" | "deleted" | "0" => {
                Some(Self::Cancelled)
            }
            _ => None,
        }
    }

    /// Availability mutation implied by this status: `Some(false)` blocks the
    /// stay, `Some(true)` releases it, `None` leaves inventory untouched.
    pub fn availability_effect(self) -> Option<bool> {
        match self {
            Self::Confirmed => Some(false),
            Self::Cancelled => Some(true),
            Self::Tentative => None,
        }
    }

    /// Source tag written alongside a webhook mutation for this status.
    pub fn webhook_source(self) -> AvailabilitySource {
        match self {
            Self::Cancelled => AvailabilitySource::WebhookCancel,
            _ => AvailabilitySource::Webhook,
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;

    #[test]
    fn status_aliases() {
        assert_eq!(BookingStatus::from_alias("confirmed"), Some(BookingStatus::Confirmed));
        assert_eq!(BookingStatus::from_alias("newReservation"), Some(BookingStatus::Confirmed));
        assert_eq!(
            BookingStatus::from_alias("reservation.created"),
            Some(BookingStatus::Confirmed)
        );
        assert_eq!(BookingStatus::from_alias("Canceled"), Some(BookingStatus::Cancelled));
        assert_eq!(
            BookingStatus::from_alias("cancel_reservation"),
            Some(BookingStatus::Cancelled)
        );
        assert_eq!(BookingStatus::from_alias("inquiry"), Some(BookingStatus::Tentative));
        assert_eq!(BookingStatus::from_alias("whatever"), None);
    }

    #[test]
    fn effects() {
        assert_eq!(BookingStatus::Confirmed.availability_effect(), Some(false));
        assert_eq!(BookingStatus::Cancelled.availability_effect(), Some(true));
        assert_eq!(BookingStatus::Tentative.availability_effect(), None);
    }

    #[test]
    fn webhook_sources() {
        assert_eq!(
            BookingStatus::Confirmed.webhook_source(),
            AvailabilitySource::Webhook
        );
        assert_eq!(
            BookingStatus::Cancelled.webhook_source(),
            AvailabilitySource::WebhookCancel
        );
        assert_eq!(AvailabilitySource::WebhookCancel.as_str(), "webhook_cancel");
    }

    #[test]
    fn provisional_sources() {
        assert!(!AvailabilitySource::Sync.is_provisional());
        assert!(AvailabilitySource::Webhook.is_provisional());
        assert!(AvailabilitySource::WebhookCancel.is_provisional());
    }

    #[test]
    fn newer_write_supersedes() {
        let webhook_at = Utc::now();
        let earlier_fetch = webhook_at - Duration::seconds(30);
        let later_fetch = webhook_at + Duration::seconds(30);
        assert!(!supersedes(webhook_at, earlier_fetch));
        assert!(supersedes(webhook_at, later_fetch));
        assert!(supersedes(webhook_at, webhook_at));
    }

    #[test]
    fn source_round_trip() {
        for source in [
            AvailabilitySource::Sync,
            AvailabilitySource::Webhook,
            AvailabilitySource::WebhookCancel,
        ] {
            assert_eq!(source.as_str().parse::<AvailabilitySource>().unwrap(), source);
        }
    }
}
