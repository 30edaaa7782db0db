//! Timestamp helpers for snapshot rows
//!
//! Timestamps are stored as fixed-width UTC RFC3339 text. Queries that
//! order by time go through `julianday` since rows written by hand may use
//! another layout.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

/// Format a timestamp for storage: `2026-10-16T09:30:00.000000Z`
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored timestamp
///
/// Accepts RFC3339 with any offset, and SQLite's `YYYY-MM-DD HH:MM:SS`
/// (interpreted as UTC) for rows written by hand.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Ok(DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc));
    }
    DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc))
}
