//! Structured error taxonomy for provider calls and sync operations.
//!
//! Adapters and the reconciliation engine never panic or bubble opaque
//! errors into the scheduler or webhook handler. Every fallible operation
//! returns a [`SyncResult`] whose error side carries a [`SyncErrorKind`]
//! and a `retryable` classification callers can branch on.

use std::fmt;

use serde::Serialize;

// ---------------------------------------------------------------------------
// Kind
// ---------------------------------------------------------------------------

/// Classification of a failed provider or engine operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncErrorKind {
    /// Credentials rejected or expired. Requires user re-authentication.
    AuthFailed,
    /// Provider throttled the request.
    RateLimit,
    /// Resource or endpoint does not exist. Triggers endpoint-variant fallback.
    NotFound,
    /// The call exceeded its deadline.
    Timeout,
    /// Connection-level transport failure.
    Network,
    /// Malformed payload or unsupported operation.
    Validation,
    /// Anything else.
    Unknown,
}

impl SyncErrorKind {
    /// Wire/storage representation (`AUTH_FAILED`, `RATE_LIMIT`, ...).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AuthFailed => "AUTH_FAILED",
            Self::RateLimit => "RATE_LIMIT",
            Self::NotFound => "NOT_FOUND",
            Self::Timeout => "TIMEOUT",
            Self::Network => "NETWORK",
            Self::Validation => "VALIDATION",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// `RATE_LIMIT`, `TIMEOUT` and `NETWORK` are transient; everything else is not.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::RateLimit | Self::Timeout | Self::Network)
    }

    /// Map an HTTP status code returned by a provider to an error kind.
    pub fn from_http_status(status: u16) -> Self {
        match status {
            401 | 403 => Self::AuthFailed,
            404 | 405 | 410 => Self::NotFound,
            408 | 504 => Self::Timeout,
            429 => Self::RateLimit,
            400 | 409 | 422 => Self::Validation,
            502 | 503 => Self::Network,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for SyncErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// A failed sync operation.
///
/// `snapshot` holds whatever part of the provider request/response is useful
/// to diagnose the failure later from the Sync Log without re-querying the
/// provider.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct SyncError {
    pub kind: SyncErrorKind,
    pub message: String,
    /// HTTP status returned by the provider, if any.
    pub status: Option<u16>,
    pub snapshot: Option<serde_json::Value>,
}

/// Result type returned by every adapter and mapping operation.
pub type SyncResult<T> = Result<T, SyncError>;

impl SyncError {
    pub fn new(kind: SyncErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            snapshot: None,
        }
    }

    pub fn auth_failed(message: impl Into<String>) -> Self {
        Self::new(SyncErrorKind::AuthFailed, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(SyncErrorKind::RateLimit, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(SyncErrorKind::NotFound, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(SyncErrorKind::Timeout, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(SyncErrorKind::Network, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(SyncErrorKind::Validation, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(SyncErrorKind::Unknown, message)
    }

    /// Build an error from a non-2xx provider response.
    pub fn from_http_status(status: u16, body: &str) -> Self {
        let kind = SyncErrorKind::from_http_status(status);
        Self {
            kind,
            message: format!("provider returned HTTP {status}"),
            status: Some(status),
            snapshot: Some(serde_json::json!({
                "status": status,
                "body": truncate(body, SNAPSHOT_BODY_LIMIT),
            })),
        }
    }

    /// Attach a diagnostic snapshot.
    pub fn with_snapshot(mut self, snapshot: serde_json::Value) -> Self {
        self.snapshot = Some(snapshot);
        self
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

/// Maximum number of characters of a provider body kept in a snapshot.
pub const SNAPSHOT_BODY_LIMIT: usize = 2048;

/// Truncate `text` to at most `max_chars` characters, marking the cut.
pub fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push_str("…[truncated]");
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_kinds() {
        assert!(SyncErrorKind::RateLimit.is_retryable());
        assert!(SyncErrorKind::Timeout.is_retryable());
        assert!(SyncErrorKind::Network.is_retryable());
        assert!(!SyncErrorKind::AuthFailed.is_retryable());
        assert!(!SyncErrorKind::NotFound.is_retryable());
        assert!(!SyncErrorKind::Validation.is_retryable());
        assert!(!SyncErrorKind::Unknown.is_retryable());
    }

    #[test]
    fn http_status_classification() {
        assert_eq!(SyncErrorKind::from_http_status(401), SyncErrorKind::AuthFailed);
        assert_eq!(SyncErrorKind::from_http_status(403), SyncErrorKind::AuthFailed);
        assert_eq!(SyncErrorKind::from_http_status(404), SyncErrorKind::NotFound);
        assert_eq!(SyncErrorKind::from_http_status(429), SyncErrorKind::RateLimit);
        assert_eq!(SyncErrorKind::from_http_status(504), SyncErrorKind::Timeout);
        assert_eq!(SyncErrorKind::from_http_status(503), SyncErrorKind::Network);
        assert_eq!(SyncErrorKind::from_http_status(422), SyncErrorKind::Validation);
        assert_eq!(SyncErrorKind::from_http_status(500), SyncErrorKind::Unknown);
    }

    #[test]
    fn from_http_status_keeps_snapshot() {
        let err = SyncError::from_http_status(404, "no such route");
        assert_eq!(err.kind, SyncErrorKind::NotFound);
        assert_eq!(err.status, Some(404));
        let snapshot = err.snapshot.expect("snapshot");
        assert_eq!(snapshot["body"], "no such route");
    }

    #[test]
    fn display_includes_kind() {
        let err = SyncError::auth_failed("token expired");
        assert_eq!(err.to_string(), "AUTH_FAILED: token expired");
    }

    #[test]
    fn kind_serializes_screaming_snake() {
        let json = serde_json::to_value(SyncErrorKind::RateLimit).unwrap();
        assert_eq!(json, "RATE_LIMIT");
    }

    #[test]
    fn truncate_marks_cut() {
        assert_eq!(truncate("abc", 5), "abc");
        assert_eq!(truncate("abcdef", 3), "abc…[truncated]");
    }
}
