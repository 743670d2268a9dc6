//! Timestamp utilities
//!
//! Replay timestamps are unix epoch seconds. These helpers convert them for
//! display and parse user-supplied range bounds.

use crate::{Error, Result};
use chrono::{DateTime, NaiveDate, Utc};

/// Format unix seconds as `YYYY-MM-DD HH:MM:SS` (UTC)
///
/// Out-of-range values fall back to the raw number.
pub fn format_unix(seconds: i64) -> String {
    DateTime::<Utc>::from_timestamp(seconds, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| seconds.to_string())
}

/// Parse a range bound given as unix seconds, `YYYY-MM-DD`, or RFC 3339
///
/// A bare date resolves to midnight UTC when `end_of_day` is false and to
/// 23:59:59 UTC when it is true, so `--end 2024-01-31` includes that day.
pub fn parse_timestamp(input: &str, end_of_day: bool) -> Result<i64> {
    let trimmed = input.trim();

    if let Ok(seconds) = trimmed.parse::<i64>() {
        return Ok(seconds);
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        let time = if end_of_day {
            date.and_hms_opt(23, 59, 59)
        } else {
            date.and_hms_opt(0, 0, 0)
        };
        if let Some(time) = time {
            return Ok(time.and_utc().timestamp());
        }
    }

    DateTime::parse_from_rfc3339(trimmed)
        .map(|dt| dt.timestamp())
        .map_err(|_| Error::InvalidInput(format!("Unrecognized timestamp: {}", input)))
}
