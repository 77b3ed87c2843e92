//! Shared query parameter parsing for API handlers.

use chrono::{DateTime, NaiveDate, Utc};
use staysync_core::types::Timestamp;

use crate::error::AppError;

/// Parse an optional timestamp query parameter.
///
/// Accepts RFC 3339 (`2025-06-01T12:00:00Z`) or a bare date, which is read
/// as midnight UTC.
pub fn parse_timestamp(name: &str, raw: Option<&str>) -> Result<Option<Timestamp>, AppError> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(Some(ts.with_timezone(&Utc)));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| Some(dt.and_utc()))
        .ok_or_else(|| AppError::BadRequest(format!("{name} must be an RFC 3339 timestamp or a date")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_rfc3339_and_dates() {
        let ts = parse_timestamp("from", Some("2025-06-01T12:30:00+02:00")).unwrap().unwrap();
        assert_eq!(ts.to_rfc3339(), "2025-06-01T10:30:00+00:00");

        let day = parse_timestamp("from", Some("2025-06-01")).unwrap().unwrap();
        assert_eq!(day.to_rfc3339(), "2025-06-01T00:00:00+00:00");
    }

    #[test]
    fn blank_is_absent_and_garbage_is_rejected() {
        assert!(parse_timestamp("to", None).unwrap().is_none());
        assert!(parse_timestamp("to", Some("  ")).unwrap().is_none());
        assert!(matches!(
            parse_timestamp("to", Some("yesterday")),
            Err(AppError::BadRequest(_))
        ));
    }
}
