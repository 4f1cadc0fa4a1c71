// models/src/timestamp.rs
//! Calendar parsing shared by request validation and the storage engines.
//! Dates travel as `YYYY-MM-DD`, clock times as `HH:MM:SS` (input also accepts `HH:MM`).

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use crate::errors::{ValidationError, ValidationResult};

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M:%S";
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn parse_date(raw: &str) -> ValidationResult<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .map_err(|_| ValidationError::InvalidDateFormat(raw.to_string()))
}

pub fn parse_clock_time(raw: &str) -> ValidationResult<NaiveTime> {
    let trimmed = raw.trim();
    NaiveTime::parse_from_str(trimmed, TIME_FORMAT)
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M"))
        .map_err(|_| ValidationError::InvalidTimeFormat(raw.to_string()))
}

/// Parses a `YYYY-MM-DD HH:MM:SS` column value as UTC.
pub fn parse_utc_datetime(raw: &str) -> ValidationResult<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw.trim(), DATETIME_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|_| ValidationError::InvalidDateFormat(raw.to_string()))
}

pub fn format_utc_datetime(value: &DateTime<Utc>) -> String {
    value.format(DATETIME_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn accepts_short_and_long_clock_times() {
        let short = parse_clock_time("09:00").unwrap();
        let long = parse_clock_time("09:00:00").unwrap();
        assert_eq!(short, long);
        assert_eq!(short.hour(), 9);
    }

    #[test]
    fn rejects_malformed_values() {
        assert!(parse_date("10/01/2024").is_err());
        assert!(parse_clock_time("9 o'clock").is_err());
    }

    #[test]
    fn datetime_round_trips_through_column_format() {
        let parsed = parse_utc_datetime("2024-01-10 09:30:00").unwrap();
        assert_eq!(format_utc_datetime(&parsed), "2024-01-10 09:30:00");
    }
}
