//! Conversion of persistence failures into the structured sync error.

use staysync_core::sync_error::SyncError;

/// Classify a database error: pool exhaustion is a timeout, socket failures
/// are network errors, and everything else is unknown.
pub fn store_error(err: sqlx::Error) -> SyncError {
    match &err {
        sqlx::Error::PoolTimedOut => SyncError::timeout(format!("Database pool timed out: {err}")),
        sqlx::Error::Io(_) | sqlx::Error::PoolClosed => {
            SyncError::network(format!("Database unreachable: {err}"))
        }
        _ => SyncError::unknown(format!("Database error: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use staysync_core::sync_error::SyncErrorKind;

    use super::*;

    #[test]
    fn pool_timeout_is_retryable() {
        let err = store_error(sqlx::Error::PoolTimedOut);
        assert_matches!(err.kind, SyncErrorKind::Timeout);
        assert!(err.is_retryable());
    }

    #[test]
    fn row_not_found_is_unknown() {
        let err = store_error(sqlx::Error::RowNotFound);
        assert_matches!(err.kind, SyncErrorKind::Unknown);
    }
}
