//! Deadline parsing and the disqualification rule.
//!
//! Deadline fields are free text ("May 1, 2026 at 2:00 PM", "2026-05-01",
//! "Not mentioned in the document"). A value that does not parse places no
//! constraint on the RFP.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use regex::Regex;
use tracing::debug;

const MONTHS: &str = "jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?";

/// Finds a date inside free text. Shared with the analyzer heuristics.
pub static DATE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\b(?:\d{{4}}-\d{{1,2}}-\d{{1,2}}|\d{{1,2}}/\d{{1,2}}/\d{{2,4}}|(?:{months})\.?\s+\d{{1,2}}(?:st|nd|rd|th)?,?\s+\d{{4}}|\d{{1,2}}(?:st|nd|rd|th)?\s+(?:{months})\.?,?\s+\d{{4}})\b",
        months = MONTHS
    ))
    .expect("valid regex")
});

static ORDINAL_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(\d{1,2})(?:st|nd|rd|th)\b").expect("valid regex"));

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d", "%m/%d/%Y", "%m/%d/%y", "%B %d, %Y", "%B %d %Y", "%b %d, %Y", "%b %d %Y",
    "%b. %d, %Y", "%b. %d %Y", "%d %B %Y", "%d %b %Y", "%d %B, %Y", "%d %b, %Y",
];

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S"];

/// Parses a deadline into an instant. Date-only values mean the end of that day (UTC).
pub fn parse_deadline(raw: &str) -> Option<DateTime<Utc>> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Some(dt) = DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(value, f).ok())
    {
        return Some(dt.and_utc());
    }
    if let Some(date) = parse_date(value) {
        return Some(end_of_day(date));
    }

    // Date embedded in a longer phrase
    DATE_PATTERN
        .find(value)
        .and_then(|m| parse_date(m.as_str()))
        .map(end_of_day)
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    let cleaned = ORDINAL_SUFFIX.replace_all(value.trim(), "$1");
    let cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(&cleaned, f).ok())
}

fn end_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN))
        .and_utc()
}

/// True when at least one deadline parses and every parseable deadline is
/// before `now`. Unparseable values are skipped; if none parse the RFP is
/// not disqualified.
pub fn is_disqualified<'a, I>(deadlines: I, now: DateTime<Utc>) -> bool
where
    I: IntoIterator<Item = &'a str>,
{
    let mut parsed_any = false;
    for raw in deadlines {
        match parse_deadline(raw) {
            Some(deadline) if deadline >= now => return false,
            Some(_) => parsed_any = true,
            None => debug!("Deadline '{raw}' is not a date; ignoring"),
        }
    }
    parsed_any
}
