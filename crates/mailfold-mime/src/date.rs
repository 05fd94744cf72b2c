//! Lenient parsing of message `Date` headers.

use chrono::{DateTime, Utc};

/// Parses an RFC 2822 date, tolerating common deviations.
///
/// Trailing comments such as `(UTC)` or `(PDT)` are stripped, and RFC 3339
/// timestamps (as some servers emit for INTERNALDATE-like values) are
/// accepted too. Returns `None` for anything else.
#[must_use]
pub fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    let without_comment = value
        .find('(')
        .map_or(value, |idx| value[..idx].trim_end());

    DateTime::parse_from_rfc2822(without_comment)
        .or_else(|_| DateTime::parse_from_rfc3339(without_comment))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_rfc2822() {
        let dt = parse_date("Sat, 24 Jan 2026 10:00:00 +0000").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2026, 1, 24, 10, 0, 0).unwrap());
    }

    #[test]
    fn test_offset_normalized_to_utc() {
        let dt = parse_date("Sat, 24 Jan 2026 12:00:00 +0200").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2026, 1, 24, 10, 0, 0).unwrap());
    }

    #[test]
    fn test_trailing_comment() {
        assert!(parse_date("Tue, 3 Feb 2026 08:15:00 +0000 (UTC)").is_some());
    }

    #[test]
    fn test_rfc3339() {
        assert!(parse_date("2026-02-03T08:15:00Z").is_some());
    }

    #[test]
    fn test_garbage() {
        assert!(parse_date("").is_none());
        assert!(parse_date("yesterday-ish").is_none());
    }
}
