//! # Temporal Types — Issue Dates and Hash Timestamps
//!
//! Two representations matter on the wire:
//!
//! - `IssueDate` renders as `dd-mm-yyyy` in hashes and XML, and as ISO
//!   `yyyy-mm-dd` in JSON documents.
//! - `HashedAt` is a second-precision instant with an explicit UTC offset,
//!   rendered `yyyy-mm-ddThh:mm:ss+hh:mm`. The offset is part of the hashed
//!   text, so it is preserved exactly as captured rather than normalized.

use chrono::{DateTime, FixedOffset, Local, NaiveDate, Timelike};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::RecordError;

const WIRE_DATE_FORMAT: &str = "%d-%m-%Y";
const WIRE_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%:z";

/// Date an invoice was issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IssueDate(NaiveDate);

impl IssueDate {
    /// Wrap a calendar date.
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    /// Build from year, month and day.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::InvalidTimestamp`] for impossible dates.
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Result<Self, RecordError> {
        NaiveDate::from_ymd_opt(year, month, day)
            .map(Self)
            .ok_or_else(|| RecordError::InvalidTimestamp(format!("{year}-{month}-{day}")))
    }

    /// Parse the `dd-mm-yyyy` wire form.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::InvalidTimestamp`] if the text does not match.
    pub fn parse_wire(s: &str) -> Result<Self, RecordError> {
        NaiveDate::parse_from_str(s.trim(), WIRE_DATE_FORMAT)
            .map(Self)
            .map_err(|e| RecordError::InvalidTimestamp(format!("{s:?}: {e}")))
    }

    /// The `dd-mm-yyyy` wire form.
    pub fn to_wire(&self) -> String {
        self.0.format(WIRE_DATE_FORMAT).to_string()
    }

    /// The underlying date.
    pub fn as_date(&self) -> NaiveDate {
        self.0
    }
}

/// Instant a record hash was computed, with its original offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HashedAt(DateTime<FixedOffset>);

impl HashedAt {
    /// The current local time, truncated to seconds.
    pub fn now() -> Self {
        Self::from_datetime(Local::now().fixed_offset())
    }

    /// Wrap an instant, truncating sub-second precision.
    pub fn from_datetime(dt: DateTime<FixedOffset>) -> Self {
        Self(dt.with_nanosecond(0).unwrap_or(dt))
    }

    /// Parse an RFC 3339 timestamp. An explicit offset is required.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::InvalidTimestamp`] if parsing fails.
    pub fn parse(s: &str) -> Result<Self, RecordError> {
        DateTime::parse_from_rfc3339(s.trim())
            .map(Self::from_datetime)
            .map_err(|e| RecordError::InvalidTimestamp(format!("{s:?}: {e}")))
    }

    /// The hashed text form, e.g. `2024-05-01T10:15:00+02:00`.
    pub fn to_iso8601(&self) -> String {
        self.0.format(WIRE_TIMESTAMP_FORMAT).to_string()
    }

    /// The underlying instant.
    pub fn as_datetime(&self) -> DateTime<FixedOffset> {
        self.0
    }
}

impl std::fmt::Display for HashedAt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_iso8601())
    }
}

impl Serialize for HashedAt {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_iso8601())
    }
}

impl<'de> Deserialize<'de> for HashedAt {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_date_wire_form() {
        let d = IssueDate::from_ymd(2024, 5, 1).unwrap();
        assert_eq!(d.to_wire(), "01-05-2024");
        assert_eq!(IssueDate::parse_wire("01-05-2024").unwrap(), d);
    }

    #[test]
    fn issue_date_json_is_iso() {
        let d = IssueDate::from_ymd(2024, 12, 31).unwrap();
        assert_eq!(serde_json::to_string(&d).unwrap(), "\"2024-12-31\"");
    }

    #[test]
    fn impossible_date_rejected() {
        assert!(IssueDate::from_ymd(2023, 2, 29).is_err());
    }

    #[test]
    fn hashed_at_keeps_offset() {
        let t = HashedAt::parse("2024-05-01T10:15:00+02:00").unwrap();
        assert_eq!(t.to_iso8601(), "2024-05-01T10:15:00+02:00");
    }

    #[test]
    fn hashed_at_utc_renders_numeric_offset() {
        let t = HashedAt::parse("2024-05-01T08:15:00Z").unwrap();
        assert_eq!(t.to_iso8601(), "2024-05-01T08:15:00+00:00");
    }

    #[test]
    fn hashed_at_truncates_fraction() {
        let t = HashedAt::parse("2024-05-01T08:15:00.987+01:00").unwrap();
        assert_eq!(t.to_iso8601(), "2024-05-01T08:15:00+01:00");
    }

    #[test]
    fn hashed_at_requires_offset() {
        assert!(HashedAt::parse("2024-05-01T08:15:00").is_err());
    }

    #[test]
    fn hashed_at_now_has_no_fraction() {
        assert_eq!(HashedAt::now().as_datetime().nanosecond(), 0);
    }
}
