//! Shared utilities for CLI commands.

use chrono::{DateTime, NaiveDate, Utc};

/// Parse a datetime string as either RFC 3339 or a plain date.
///
/// Supports:
/// - RFC 3339: "2026-01-15T10:30:00Z"
/// - Date only: "2026-01-15" (midnight UTC)
pub fn parse_datetime(s: &str) -> anyhow::Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(date.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc());
    }

    anyhow::bail!(
        "Invalid datetime: {s}. Use RFC 3339 (e.g., 2026-01-15T10:30:00Z) or a date (e.g., 2026-01-15)"
    );
}

/// Parse a billing cycle start date (YYYY-MM-DD).
pub fn parse_date(s: &str) -> anyhow::Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| anyhow::anyhow!("Invalid date: {s}. Use YYYY-MM-DD"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_rfc3339() {
        let parsed = parse_datetime("2026-01-15T10:30:00Z").unwrap();
        let expected = Utc.with_ymd_and_hms(2026, 1, 15, 10, 30, 0).unwrap();
        assert_eq!(parsed, expected);
    }

    #[test]
    fn parses_plain_date_as_midnight_utc() {
        let parsed = parse_datetime("2026-01-15").unwrap();
        let expected = Utc.with_ymd_and_hms(2026, 1, 15, 0, 0, 0).unwrap();
        assert_eq!(parsed, expected);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_datetime("yesterday").is_err());
        assert!(parse_date("2026/01/15").is_err());
    }
}
