//! Date normalization for archive cards, article metadata and API payloads.
//!
//! Dates reach the pipeline in many shapes: ISO-8601 attributes, legacy
//! JavaScript `Date.toString()` output, `"24 May 2025"` style labels and
//! relative labels like `"18 hrs ago"`. [`parse`] tries an ordered list of
//! parsers and returns the first success as a UTC timestamp. When nothing
//! matches, the raw string comes back unchanged so callers can keep it for
//! later inspection.
//!
//! The ISO and absolute branches are deterministic. The relative branches are
//! resolved against the `now` argument and therefore are not.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeDelta, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// Result of normalizing one date string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateValue {
    /// Successfully parsed, always UTC.
    Timestamp(DateTime<Utc>),
    /// No parser matched; the original input.
    Raw(String),
}

impl DateValue {
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            DateValue::Timestamp(ts) => Some(*ts),
            DateValue::Raw(_) => None,
        }
    }

    /// Only a parsed date can be proven older than `cutoff`.
    pub fn is_before(&self, cutoff: DateTime<Utc>) -> bool {
        self.timestamp().is_some_and(|ts| ts < cutoff)
    }

    /// Rendering used in CSV cells.
    pub fn to_csv_string(&self) -> String {
        match self {
            DateValue::Timestamp(ts) => format_iso(*ts),
            DateValue::Raw(raw) => raw.clone(),
        }
    }
}

type DateParser = fn(&str, DateTime<Utc>) -> Option<DateTime<Utc>>;

/// Tried in order; the first parser returning `Some` wins.
const PARSERS: &[(&str, DateParser)] = &[
    ("iso8601", parse_iso),
    ("js_date_string", parse_js_date_string),
    ("absolute", parse_absolute),
    ("hours_ago", parse_hours_ago),
    ("minutes_ago", parse_minutes_ago),
    ("days_ago", parse_days_ago),
    ("yesterday", parse_yesterday),
];

static TRAILING_ANNOTATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*\(.*\)\s*$").expect("valid annotation regex"));
static HOURS_AGO: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d+)\s*(?:hrs?|hours?)\s*ago").expect("valid hours regex")
});
static MINUTES_AGO: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d+)\s*(?:mins?|minutes?)\s*ago").expect("valid minutes regex")
});
static DAYS_AGO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\d+)\s*days?\s*ago").expect("valid days regex"));
static YESTERDAY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\byesterday\b").expect("valid yesterday regex"));

/// Normalize `raw` into a UTC timestamp, or hand it back unchanged.
///
/// Never panics and never fails: unrecognized input yields [`DateValue::Raw`].
pub fn parse(raw: &str, now: DateTime<Utc>) -> DateValue {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return DateValue::Raw(raw.to_string());
    }
    let candidate = TRAILING_ANNOTATION.replace(trimmed, "");

    for (name, parser) in PARSERS {
        if let Some(ts) = parser(&candidate, now) {
            debug!(raw, parser = name, parsed = %format_iso(ts), "Parsed date");
            return DateValue::Timestamp(ts);
        }
    }

    debug!(raw, "Unrecognized date format; keeping raw string");
    DateValue::Raw(raw.to_string())
}

/// Format a timestamp as ISO-8601 with a `Z` suffix, e.g. `2025-06-03T13:43:00Z`.
///
/// Fractional seconds are printed only when present, so the output parses
/// back to the identical instant.
pub fn format_iso(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Convert an epoch-seconds cell (`"1717430400.0"`) into a timestamp.
pub fn from_epoch_str(raw: &str) -> Option<DateTime<Utc>> {
    let secs: f64 = raw.trim().parse().ok()?;
    if !secs.is_finite() {
        return None;
    }
    let whole = secs.floor();
    let nanos = ((secs - whole) * 1e9).round().min(999_999_999.0) as u32;
    DateTime::from_timestamp(whole as i64, nanos)
}

fn parse_iso(s: &str, _now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(dt.with_timezone(&Utc));
    }
    // Naive timestamps are assumed to be UTC.
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// `Tue Jun 03 2025 13:18:00 GMT+0000`, the annotation already stripped.
fn parse_js_date_string(s: &str, _now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(s, "%a %b %d %Y %H:%M:%S GMT%z")
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// `24 May 2025` or `24 September 2025`, month names in any case.
fn parse_absolute(s: &str, _now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    ["%d %b %Y", "%d %B %Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn parse_hours_ago(s: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    relative(&HOURS_AGO, s, now, TimeDelta::try_hours)
}

fn parse_minutes_ago(s: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    relative(&MINUTES_AGO, s, now, TimeDelta::try_minutes)
}

fn parse_days_ago(s: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    relative(&DAYS_AGO, s, now, TimeDelta::try_days)
}

/// Noon UTC of the previous day.
fn parse_yesterday(s: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if !YESTERDAY.is_match(s) {
        return None;
    }
    let day = now.checked_sub_signed(TimeDelta::try_days(1)?)?;
    day.date_naive().and_hms_opt(12, 0, 0).map(|naive| naive.and_utc())
}

fn relative(
    pattern: &Regex,
    s: &str,
    now: DateTime<Utc>,
    unit: fn(i64) -> Option<TimeDelta>,
) -> Option<DateTime<Utc>> {
    let amount: i64 = pattern.captures(s)?.get(1)?.as_str().parse().ok()?;
    now.checked_sub_signed(unit(amount)?)
}
