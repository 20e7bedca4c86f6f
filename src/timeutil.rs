use std::fmt;
use std::fmt::Formatter;
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::Deserialize;

/// Textual fallback formats accepted for time bounds; both are taken as UTC.
const FALLBACK_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d"];

#[derive(Debug)]
pub struct TimeParseError(pub String);

impl fmt::Display for TimeParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "TimeParseError: {}", self.0)
    }
}

/// A time bound as accepted on the wire: UNIX seconds or a datetime string.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum TimeInput {
    Unix(f64),
    Text(String),
}

impl From<DateTime<Utc>> for TimeInput {
    fn from(dt: DateTime<Utc>) -> Self {
        TimeInput::Unix(dt.timestamp() as f64)
    }
}

/// Normalizes a time bound to UNIX seconds.
///
/// Strings are tried as ISO8601 first (a trailing `Z` means UTC), then as
/// `YYYY-MM-DD HH:MM:SS` and `YYYY-MM-DD`. Anything without an explicit
/// offset is assumed UTC.
pub fn to_unix_seconds(value: &TimeInput) -> Result<i64, TimeParseError> {
    match value {
        TimeInput::Unix(seconds) => Ok(*seconds as i64),
        TimeInput::Text(text) => parse_text(text.trim()),
    }
}

fn parse_text(text: &str) -> Result<i64, TimeParseError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.timestamp());
    }

    // ISO8601 without an offset, e.g. 2025-03-01T00:00:00
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S") {
        return Ok(naive.and_utc().timestamp());
    }

    for format in FALLBACK_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(naive.and_utc().timestamp());
        }
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return Ok(date.and_hms_opt(0, 0, 0).unwrap().and_utc().timestamp());
        }
    }

    Err(TimeParseError(format!("unrecognized datetime string: {}", text)))
}

/// Formats UNIX seconds as the `YYYY-MM-DDTHH:MM:SS` shape the PRISM API
/// expects for its start/end parameters.
pub fn unix_to_query(unix: i64) -> String {
    DateTime::from_timestamp(unix, 0).unwrap()
        .format("%Y-%m-%dT%H:%M:%S")
        .to_string()
}

/// Formats UNIX seconds as ISO8601 UTC for emitted series points.
pub fn unix_to_iso(unix: i64) -> String {
    DateTime::from_timestamp(unix, 0).unwrap()
        .to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// UNIX seconds as a naive UTC datetime, the form the historian link binds.
pub fn unix_to_naive(unix: i64) -> NaiveDateTime {
    DateTime::from_timestamp(unix, 0).unwrap().naive_utc()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unix_input_passes_through() {
        assert_eq!(to_unix_seconds(&TimeInput::Unix(1748304000.0)).unwrap(), 1748304000);
        assert_eq!(to_unix_seconds(&TimeInput::Unix(1748304000.7)).unwrap(), 1748304000);
    }

    #[test]
    fn iso8601_with_z_is_utc() {
        let t = to_unix_seconds(&TimeInput::Text("2025-09-01T00:00:00Z".to_string())).unwrap();
        assert_eq!(t, 1756684800);
    }

    #[test]
    fn iso8601_without_offset_is_utc() {
        let with_z = to_unix_seconds(&TimeInput::Text("2025-03-01T00:00:00Z".to_string())).unwrap();
        let bare = to_unix_seconds(&TimeInput::Text("2025-03-01T00:00:00".to_string())).unwrap();
        assert_eq!(with_z, bare);
    }

    #[test]
    fn fallback_formats_are_utc() {
        let spaced = to_unix_seconds(&TimeInput::Text("2025-09-01 00:00:00".to_string())).unwrap();
        let date_only = to_unix_seconds(&TimeInput::Text("2025-09-01".to_string())).unwrap();
        assert_eq!(spaced, date_only);
        assert_eq!(spaced, 1756684800);
    }

    #[test]
    fn round_trips_within_a_second() {
        for text in ["2025-09-01T12:34:56Z", "2025-09-01 12:34:56", "2025-09-01"] {
            let t = to_unix_seconds(&TimeInput::Text(text.to_string())).unwrap();
            let reparsed = to_unix_seconds(&TimeInput::Text(unix_to_iso(t))).unwrap();
            assert!((t - reparsed).abs() <= 1);
        }
    }

    #[test]
    fn malformed_strings_are_rejected() {
        for text in ["yesterday", "2025-13-40", "09/01/2025", ""] {
            assert!(to_unix_seconds(&TimeInput::Text(text.to_string())).is_err());
        }
    }

    #[test]
    fn query_format_matches_prism_expectation() {
        let t = to_unix_seconds(&TimeInput::Text("2025-03-01T23:59:59Z".to_string())).unwrap();
        assert_eq!(unix_to_query(t), "2025-03-01T23:59:59");
    }
}
