//! Backup time value object
//!
//! Snapshots are addressed by the UTC instant they were taken at. The
//! command line carries that instant as `YYYY-MM-DDTHH:MM:SSZ`.

use chrono::{DateTime, NaiveDateTime, Timelike};
use std::fmt;

/// Format accepted for the `timestamp` parameter
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Creation time of a snapshot, in seconds since the Unix epoch (UTC)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BackupTime(i64);

impl BackupTime {
    /// Parses a `YYYY-MM-DDTHH:MM:SSZ` literal.
    ///
    /// The literal is read as a naive calendar time and pinned to UTC, so the
    /// host's `TZ` never takes part in the conversion. A seconds field of
    /// `60` rolls over into the next minute. Returns `None` if the value
    /// does not match the format exactly.
    pub fn parse(value: &str) -> Option<Self> {
        if value.trim() != value {
            return None;
        }
        let naive = NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT).ok()?;
        // chrono keeps `:60` as second 59 plus a full second of nanoseconds.
        let leap = i64::from(naive.nanosecond() / 1_000_000_000);
        Some(Self(naive.and_utc().timestamp() + leap))
    }

    /// Creates a backup time from epoch seconds
    pub fn from_epoch(seconds: i64) -> Self {
        Self(seconds)
    }

    /// Returns the epoch seconds
    pub fn epoch(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for BackupTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match DateTime::from_timestamp(self.0, 0) {
            Some(utc) => write!(f, "{}", utc.format(TIMESTAMP_FORMAT)),
            None => write!(f, "@{}", self.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_new_year() {
        let time = BackupTime::parse("2025-01-01T00:00:00Z").unwrap();
        assert_eq!(time.epoch(), 1_735_689_600);
    }

    #[test]
    fn test_parse_rejects_offset_suffix() {
        assert!(BackupTime::parse("2025-01-01T00:00:00+02:00").is_none());
        assert!(BackupTime::parse("2025-01-01 00:00:00").is_none());
        assert!(BackupTime::parse("2025-13-01T00:00:00Z").is_none());
        assert!(BackupTime::parse("").is_none());
    }

    #[test]
    fn test_parse_second_sixty_rolls_over() {
        let time = BackupTime::parse("2025-01-01T00:00:60Z").unwrap();
        assert_eq!(time.epoch(), 1_735_689_660);
        assert_eq!(time.to_string(), "2025-01-01T00:01:00Z");
    }

    #[test]
    fn test_parse_rejects_surrounding_whitespace() {
        assert!(BackupTime::parse(" 2025-01-01T00:00:00Z").is_none());
        assert!(BackupTime::parse("2025-01-01T00:00:00Z\n").is_none());
    }

    #[test]
    fn test_display_matches_input_format() {
        let time = BackupTime::parse("2025-06-01T12:00:00Z").unwrap();
        assert_eq!(time.to_string(), "2025-06-01T12:00:00Z");
    }
}
