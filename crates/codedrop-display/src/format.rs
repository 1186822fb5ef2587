//! Timestamp formatting.

use chrono::{DateTime, TimeZone};

/// Format used for snippet timestamps, e.g. `Jan 5, 2025, 03:04 PM`.
pub const TIMESTAMP_FORMAT: &str = "%b %-d, %Y, %I:%M %p";

/// Formats a timestamp in the zone it carries.
///
/// Callers convert to local time first when showing it to a person.
#[must_use]
pub fn format_timestamp<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    at.format(TIMESTAMP_FORMAT).to_string()
}
