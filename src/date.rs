//! Timestamp parsing and formatting.
//!
//! Build times, filename dates, and front-matter dates are all zone-less
//! [`NaiveDateTime`]s. A date with no time of day is midnight, so a post
//! named `2008-11-05-x.md` and one with `date: 2008-11-05 09:00` on the same
//! day still sort deterministically.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat};

/// Format used when a timestamp is exposed to templates.
pub const PAYLOAD_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// Parse a timestamp from a config value, front matter, or filename.
///
/// Accepts a bare date (`2008-11-05`, also un-padded `2008-1-5`), a date
/// with a time of day, or an RFC 3339 / zoned timestamp. Zoned inputs keep
/// their wall-clock time and drop the offset.
pub fn parse_timestamp(input: &str) -> Option<NaiveDateTime> {
    let input = input.trim();
    if let Ok(zoned) = chrono::DateTime::parse_from_rfc3339(input) {
        return Some(zoned.naive_local());
    }
    if let Ok(zoned) = chrono::DateTime::parse_from_str(input, "%Y-%m-%d %H:%M:%S %z") {
        return Some(zoned.naive_local());
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(input, format) {
            return Some(dt);
        }
    }
    parse_date(input).map(|d| d.and_time(NaiveTime::MIN))
}

/// Parse a `YYYY-MM-DD` date. Month and day may be un-padded.
pub fn parse_date(input: &str) -> Option<NaiveDate> {
    let mut parts = input.trim().splitn(3, '-');
    let year = parts.next()?.parse::<i32>().ok()?;
    let month = parts.next()?.parse::<u32>().ok()?;
    let day = parts.next()?.parse::<u32>().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Format a timestamp for the template payload.
pub fn to_payload(dt: &NaiveDateTime) -> String {
    dt.format(PAYLOAD_FORMAT).to_string()
}

/// XML Schema (RFC 3339) rendering. Timestamps carry no zone, so they are
/// rendered as UTC.
pub fn to_xmlschema(dt: &NaiveDateTime) -> String {
    dt.and_utc().to_rfc3339_opts(SecondsFormat::Secs, true)
}

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Full English month name for a 1-based month number.
pub fn month_name(month: u32) -> Option<&'static str> {
    MONTH_NAMES.get(month.checked_sub(1)? as usize).copied()
}

/// Three-letter English month abbreviation for a 1-based month number.
pub fn month_abbr(month: u32) -> Option<&'static str> {
    month_name(month).map(|name| &name[..3])
}
