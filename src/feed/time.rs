//! Publish-date parsing for RSS items.
//!
//! Feeds in the wild disagree about date formats. [`parse_rss_time`] tries an
//! ordered list of layouts and returns the first match, so when two layouts
//! could both accept a string the earlier one decides.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use thiserror::Error;

/// The raw date string matched none of the known layouts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unrecognized date format: {input:?}")]
pub struct TimeParseError {
    pub input: String,
}

/// Date layouts accepted for `pubDate`, in match priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RssDateFormat {
    /// `Mon, 02 Jan 2006 15:04:05 -0700`
    Rfc1123Z,
    /// `Mon, 02 Jan 2006 15:04:05 MST`
    Rfc1123,
    /// `2006-01-02T15:04:05Z07:00`
    Rfc3339,
    /// `02 Jan 06 15:04 -0700`; years 69-99 are 19xx, 00-68 are 20xx
    Rfc822Z,
    /// `02 Jan 06 15:04 MST`
    Rfc822,
    /// `2006-01-02T15:04:05-07:00`
    IsoOffset,
    /// `2006-01-02 15:04:05`, read as UTC
    NaiveDateTime,
    /// `2006-01-02`, midnight UTC
    DateOnly,
    /// `02 Jan 2006 15:04:05 MST`
    DayMonthYearZoneName,
    /// `02 Jan 2006 15:04:05 -0700`
    DayMonthYearNumericZone,
    /// `Mon, 2 Jan 2006 15:04:05 MST`
    Rfc1123ShortDay,
    /// `Mon, 2 Jan 2006 15:04:05 -0700`
    Rfc1123ShortDayZ,
}

/// Every supported layout, earliest wins.
pub const RSS_DATE_FORMATS: [RssDateFormat; 12] = [
    RssDateFormat::Rfc1123Z,
    RssDateFormat::Rfc1123,
    RssDateFormat::Rfc3339,
    RssDateFormat::Rfc822Z,
    RssDateFormat::Rfc822,
    RssDateFormat::IsoOffset,
    RssDateFormat::NaiveDateTime,
    RssDateFormat::DateOnly,
    RssDateFormat::DayMonthYearZoneName,
    RssDateFormat::DayMonthYearNumericZone,
    RssDateFormat::Rfc1123ShortDay,
    RssDateFormat::Rfc1123ShortDayZ,
];

const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

impl RssDateFormat {
    /// Try this single layout against an already-trimmed string.
    pub fn parse(self, s: &str) -> Option<DateTime<Utc>> {
        match self {
            Self::Rfc1123Z => {
                let rest = strip_weekday(s)?;
                two_digit_day(rest)?;
                parse_numeric_zone(rest, "%d %b %Y %H:%M:%S %z")
            }
            Self::Rfc1123 => {
                let rest = strip_weekday(s)?;
                two_digit_day(rest)?;
                parse_zone_name(rest, "%d %b %Y %H:%M:%S")
            }
            Self::Rfc3339 => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
            Self::Rfc822Z => {
                two_digit_day(s)?;
                parse_numeric_zone(&expand_short_year(s)?, "%d %b %Y %H:%M %z")
            }
            Self::Rfc822 => {
                two_digit_day(s)?;
                parse_zone_name(&expand_short_year(s)?, "%d %b %Y %H:%M")
            }
            Self::IsoOffset => parse_numeric_zone(s, "%Y-%m-%dT%H:%M:%S%:z"),
            Self::NaiveDateTime => NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|naive| naive.and_utc()),
            Self::DateOnly => NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
                .map(|naive| naive.and_utc()),
            Self::DayMonthYearZoneName => {
                two_digit_day(s)?;
                parse_zone_name(s, "%d %b %Y %H:%M:%S")
            }
            Self::DayMonthYearNumericZone => {
                two_digit_day(s)?;
                parse_numeric_zone(s, "%d %b %Y %H:%M:%S %z")
            }
            Self::Rfc1123ShortDay => parse_zone_name(strip_weekday(s)?, "%-d %b %Y %H:%M:%S"),
            Self::Rfc1123ShortDayZ => {
                parse_numeric_zone(strip_weekday(s)?, "%-d %b %Y %H:%M:%S %z")
            }
        }
    }
}

/// Parse a raw RSS date string into a UTC instant.
///
/// Surrounding whitespace is ignored. A leading weekday must be a valid
/// abbreviation but is not checked against the date.
pub fn parse_rss_time(raw: &str) -> Result<DateTime<Utc>, TimeParseError> {
    parse_rss_time_with_format(raw).map(|(instant, _)| instant)
}

/// Like [`parse_rss_time`], also reporting which layout matched.
pub fn parse_rss_time_with_format(
    raw: &str,
) -> Result<(DateTime<Utc>, RssDateFormat), TimeParseError> {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
        for format in RSS_DATE_FORMATS {
            if let Some(instant) = format.parse(trimmed) {
                return Ok((instant, format));
            }
        }
    }

    Err(TimeParseError {
        input: raw.to_string(),
    })
}

fn strip_weekday(s: &str) -> Option<&str> {
    let (day, rest) = s.split_once(", ")?;
    WEEKDAYS.contains(&day).then_some(rest)
}

fn two_digit_day(s: &str) -> Option<()> {
    let day = s.split(' ').next()?;
    (day.len() == 2 && day.bytes().all(|b| b.is_ascii_digit())).then_some(())
}

/// Rewrite the two-digit year of `02 Jan 06 ...` as four digits.
fn expand_short_year(s: &str) -> Option<String> {
    let mut parts = s.splitn(4, ' ');
    let (day, month, year, rest) = (parts.next()?, parts.next()?, parts.next()?, parts.next()?);
    if year.len() != 2 || !year.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let century = if year >= "69" { "19" } else { "20" };
    Some(format!("{day} {month} {century}{year} {rest}"))
}

fn parse_numeric_zone(s: &str, layout: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(s, layout)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn parse_zone_name(s: &str, layout: &str) -> Option<DateTime<Utc>> {
    let (local, zone) = s.rsplit_once(' ')?;
    let offset = zone_offset(zone)?;
    let naive = NaiveDateTime::parse_from_str(local, layout).ok()?;
    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Resolve a zone abbreviation. RFC 822 names get their fixed offsets, any
/// other short all-caps name is taken as UTC.
fn zone_offset(zone: &str) -> Option<FixedOffset> {
    if zone.is_empty() || zone.len() > 5 || !zone.bytes().all(|b| b.is_ascii_uppercase()) {
        return None;
    }

    let hours = match zone {
        "EST" => -5,
        "EDT" => -4,
        "CST" => -6,
        "CDT" => -5,
        "MST" => -7,
        "MDT" => -6,
        "PST" => -8,
        "PDT" => -7,
        _ => 0,
    };
    FixedOffset::east_opt(hours * 3600)
}
