//! Connection lifecycle state machine.
//!
//! A connection is one (account, provider) pairing. Its `status` is the only
//! failure surface shown to users; per-record failures live in the Sync Log.
//!
//! ```text
//! pending ──► active ◄──► error / needs_attention
//!    │           │               │
//!    └───────────┴───► disabled ◄┘
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::sync_error::SyncErrorKind;

/// Lifecycle status of a provider connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    /// Created, not yet validated by a successful sync.
    Pending,
    /// At least one successful sync.
    Active,
    /// Marked failed outside the engine; runs still scheduled and a success clears it.
    Error,
    /// Credentials expired or were rejected; requires the user to re-authenticate.
    NeedsAttention,
    /// Stopped by the user or the system; never scheduled.
    Disabled,
}

impl ConnectionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Error => "error",
            Self::NeedsAttention => "needs_attention",
            Self::Disabled => "disabled",
        }
    }

    /// Whether the scheduler may start runs for a connection in this status.
    ///
    /// `needs_attention` connections are skipped until the user re-authenticates.
    pub fn is_schedulable(self) -> bool {
        matches!(self, Self::Pending | Self::Active | Self::Error)
    }

    /// Valid target statuses reachable from `self`.
    pub fn valid_transitions(self) -> &'static [ConnectionStatus] {
        use ConnectionStatus::*;
        match self {
            Pending => &[Active, Error, NeedsAttention, Disabled],
            Active => &[Active, Error, NeedsAttention, Disabled],
            Error => &[Active, Error, NeedsAttention, Disabled],
            NeedsAttention => &[Active, NeedsAttention, Disabled],
            // Re-enabling requires validation again.
            Disabled => &[Pending],
        }
    }

    pub fn can_transition(self, to: ConnectionStatus) -> bool {
        self.valid_transitions().contains(&to)
    }

    /// Validate a state transition, returning an error for invalid ones.
    pub fn validate_transition(self, to: ConnectionStatus) -> Result<(), CoreError> {
        if self.can_transition(to) {
            Ok(())
        } else {
            Err(CoreError::Validation(format!(
                "Invalid connection transition: {self} -> {to}"
            )))
        }
    }

    /// Status after a successful run.
    pub fn after_success(self) -> ConnectionStatus {
        match self {
            Self::Disabled => Self::Disabled,
            _ => Self::Active,
        }
    }

    /// Status after a run failed with `kind`.
    ///
    /// Only an authentication failure moves the connection (to
    /// `needs_attention`); every other failure is recorded in `last_error`
    /// and the Sync Log with the status left as it was.
    pub fn after_failure(self, kind: SyncErrorKind) -> ConnectionStatus {
        match (self, kind) {
            (Self::Disabled, _) => self,
            (_, SyncErrorKind::AuthFailed) => Self::NeedsAttention,
            _ => self,
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConnectionStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "active" => Ok(Self::Active),
            "error" => Ok(Self::Error),
            "needs_attention" => Ok(Self::NeedsAttention),
            "disabled" => Ok(Self::Disabled),
            other => Err(CoreError::Validation(format!(
                "Unknown connection status: {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ConnectionStatus::*;
    use super::*;

    #[test]
    fn pending_becomes_active_after_success() {
        assert_eq!(Pending.after_success(), Active);
        assert!(Pending.can_transition(Active));
    }

    #[test]
    fn auth_failure_needs_attention() {
        assert_eq!(Active.after_failure(SyncErrorKind::AuthFailed), NeedsAttention);
        assert_eq!(Pending.after_failure(SyncErrorKind::AuthFailed), NeedsAttention);
    }

    #[test]
    fn retryable_failure_keeps_status() {
        assert_eq!(Active.after_failure(SyncErrorKind::Timeout), Active);
        assert_eq!(Pending.after_failure(SyncErrorKind::RateLimit), Pending);
    }

    #[test]
    fn only_auth_failure_changes_status() {
        for kind in [
            SyncErrorKind::Validation,
            SyncErrorKind::Unknown,
            SyncErrorKind::NotFound,
            SyncErrorKind::Network,
        ] {
            assert_eq!(Active.after_failure(kind), Active);
            assert_eq!(Pending.after_failure(kind), Pending);
            assert_eq!(NeedsAttention.after_failure(kind), NeedsAttention);
        }
    }

    #[test]
    fn error_recovers_to_active() {
        assert!(Error.can_transition(Active));
        assert_eq!(Error.after_success(), Active);
    }

    #[test]
    fn disabled_is_sticky_for_runs() {
        assert_eq!(Disabled.after_success(), Disabled);
        assert_eq!(Disabled.after_failure(SyncErrorKind::AuthFailed), Disabled);
        assert!(!Disabled.can_transition(Active));
        assert!(Disabled.can_transition(Pending));
    }

    #[test]
    fn schedulable_statuses() {
        assert!(Pending.is_schedulable());
        assert!(Active.is_schedulable());
        assert!(Error.is_schedulable());
        assert!(!NeedsAttention.is_schedulable());
        assert!(!Disabled.is_schedulable());
    }

    #[test]
    fn invalid_transition_message() {
        let err = NeedsAttention.validate_transition(Error).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Validation failed: Invalid connection transition: needs_attention -> error"
        );
    }

    #[test]
    fn string_round_trip() {
        for status in [Pending, Active, Error, NeedsAttention, Disabled] {
            assert_eq!(status.as_str().parse::<ConnectionStatus>().unwrap(), status);
        }
        assert!("paused".parse::<ConnectionStatus>().is_err());
    }
}
