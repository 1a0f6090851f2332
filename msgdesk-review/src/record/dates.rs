//! Timestamp parsing for date-like columns and filter bounds
//!
//! All timestamps are timezone-naive. Offsets in RFC 3339 input are
//! dropped and the wall-clock time kept.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde_json::Value;
use thiserror::Error;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

const OFFSET_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%z"];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

/// A non-null value that is not a recognisable timestamp
#[derive(Debug, Clone, Error, PartialEq)]
#[error("unparsable timestamp: {0}")]
pub struct TimestampError(pub String);

/// Parse a timestamp string
///
/// Returns `None` for blank or unrecognised input.
pub fn parse_timestamp_str(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }

    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt);
        }
    }

    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, format) {
            return Some(dt.naive_local());
        }
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, format) {
            return Some(date.and_time(NaiveTime::MIN));
        }
    }

    None
}

/// Parse a raw JSON cell of a date-like column
///
/// Null and blank strings are absent (`Ok(None)`). Integers are epoch
/// milliseconds, the encoding dataframe exporters use for JSON dates.
pub fn parse_timestamp_value(value: &Value) -> Result<Option<NaiveDateTime>, TimestampError> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => parse_timestamp_str(s)
            .map(Some)
            .ok_or_else(|| TimestampError(s.clone())),
        Value::Number(n) => n
            .as_i64()
            .and_then(DateTime::from_timestamp_millis)
            .map(|dt| Some(dt.naive_utc()))
            .ok_or_else(|| TimestampError(n.to_string())),
        other => Err(TimestampError(other.to_string())),
    }
}

/// Parse a filter bound into a calendar date, ignoring any time-of-day
pub fn parse_date_bound(raw: &str) -> Option<NaiveDate> {
    parse_timestamp_str(raw).map(|dt| dt.date())
}

/// Persisted timestamp form: `YYYY-MM-DDTHH:MM:SS`, with a fractional
/// part only when one is present
pub fn format_timestamp(dt: &NaiveDateTime) -> String {
    if dt.nanosecond() == 0 {
        dt.format("%Y-%m-%dT%H:%M:%S").to_string()
    } else {
        dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ymd_hms(y: i32, m: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[test]
    fn test_parse_date_only() {
        assert_eq!(
            parse_timestamp_str("2024-01-03"),
            Some(ymd_hms(2024, 1, 3, 0, 0, 0))
        );
        assert_eq!(
            parse_timestamp_str("2024/01/03"),
            Some(ymd_hms(2024, 1, 3, 0, 0, 0))
        );
    }

    #[test]
    fn test_parse_naive_datetimes() {
        assert_eq!(
            parse_timestamp_str("2024-01-03T10:30:00"),
            Some(ymd_hms(2024, 1, 3, 10, 30, 0))
        );
        assert_eq!(
            parse_timestamp_str("2024-01-03 10:30:00"),
            Some(ymd_hms(2024, 1, 3, 10, 30, 0))
        );
        assert_eq!(
            parse_timestamp_str("2024-01-03 10:30"),
            Some(ymd_hms(2024, 1, 3, 10, 30, 0))
        );
    }

    #[test]
    fn test_offset_dropped_wall_clock_kept() {
        assert_eq!(
            parse_timestamp_str("2024-01-03T23:30:00+05:00"),
            Some(ymd_hms(2024, 1, 3, 23, 30, 0))
        );
        assert_eq!(
            parse_timestamp_str("2024-01-03 23:30:00+00:00"),
            Some(ymd_hms(2024, 1, 3, 23, 30, 0))
        );
        assert_eq!(
            parse_timestamp_str("2024-01-03T23:30:00Z"),
            Some(ymd_hms(2024, 1, 3, 23, 30, 0))
        );
    }

    #[test]
    fn test_unparsable_strings() {
        assert_eq!(parse_timestamp_str(""), None);
        assert_eq!(parse_timestamp_str("yesterday"), None);
        assert_eq!(parse_timestamp_str("2024-13-45"), None);
    }

    #[test]
    fn test_parse_value_variants() {
        assert_eq!(parse_timestamp_value(&Value::Null), Ok(None));
        assert_eq!(parse_timestamp_value(&json!("")), Ok(None));
        assert_eq!(
            parse_timestamp_value(&json!(1_704_067_200_000i64)),
            Ok(Some(ymd_hms(2024, 1, 1, 0, 0, 0)))
        );
        assert!(parse_timestamp_value(&json!("soon")).is_err());
        assert!(parse_timestamp_value(&json!(true)).is_err());
    }

    #[test]
    fn test_parse_date_bound_ignores_time() {
        assert_eq!(
            parse_date_bound("2024-01-02T18:00:00"),
            NaiveDate::from_ymd_opt(2024, 1, 2)
        );
        assert_eq!(parse_date_bound("not a date"), None);
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(
            format_timestamp(&ymd_hms(2024, 1, 3, 10, 30, 0)),
            "2024-01-03T10:30:00"
        );
        let with_millis = ymd_hms(2024, 1, 3, 10, 30, 0)
            .with_nanosecond(250_000_000)
            .unwrap();
        assert_eq!(format_timestamp(&with_millis), "2024-01-03T10:30:00.250");
    }
}
