//! Free-text posted-date normalization.
//!
//! Feed cards show dates as short relative strings (`"3h"`, `"2d •"`,
//! `"1 week ago"`) or as a month and day (`"Mar 15"`, `"March 15, 2024"`).
//! [`normalize_posted_date`] turns those into absolute UTC timestamps against a
//! caller-supplied `now`, so the result is deterministic.

use std::sync::LazyLock;

use chrono::{DateTime, Datelike, NaiveDate, TimeDelta, Utc};
use regex::Regex;

static HOURS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)\s*(?:h|hr|hrs|hour|hours)\b").expect("valid regex")
});

static DAYS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\s*(?:d|day|days)\b").expect("valid regex"));

static WEEKS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)\s*(?:w|wk|wks|week|weeks)\b").expect("valid regex")
});

/// `<month> <day>` with an optional `, <year>`. The month word is validated
/// by chrono, which accepts full and three-letter names.
static MONTH_DAY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([a-z]{3,9})\.?\s+(\d{1,2})(?:\s*,?\s*(\d{4}))?\b").expect("valid regex")
});

/// Converts a posted-date string into an absolute timestamp.
///
/// Matching is case-insensitive on the trimmed text and the first matching
/// form wins:
///
/// | Text | Result |
/// |---|---|
/// | contains `just now` | `now` |
/// | `<n>h`, `<n> hr`, `<n> hours` | `now - n hours` |
/// | `<n>d`, `<n> days` | `now - n days` |
/// | `<n>w`, `<n> wks`, `<n> weeks` | `now - n weeks` |
/// | `Mar 15`, `March 15, 2024` | that date at midnight UTC |
///
/// A month-day without a year takes `now`'s year, or the previous year when
/// that would land strictly after `now`. Anything else, including counts too
/// large to subtract, returns `None`.
#[must_use]
pub fn normalize_posted_date(text: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let lower = text.trim().to_lowercase();
    if lower.is_empty() {
        return None;
    }

    if lower.contains("just now") {
        return Some(now);
    }

    if let Some(n) = leading_count(&HOURS_RE, &lower) {
        return TimeDelta::try_hours(n).and_then(|d| now.checked_sub_signed(d));
    }
    if let Some(n) = leading_count(&DAYS_RE, &lower) {
        return TimeDelta::try_days(n).and_then(|d| now.checked_sub_signed(d));
    }
    if let Some(n) = leading_count(&WEEKS_RE, &lower) {
        return TimeDelta::try_weeks(n).and_then(|d| now.checked_sub_signed(d));
    }

    month_day(&lower, now)
}

fn leading_count(pattern: &Regex, text: &str) -> Option<i64> {
    pattern
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<i64>().ok())
}

fn month_day(text: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let caps = MONTH_DAY_RE.captures(text)?;
    let month = caps.get(1)?.as_str();
    let day = caps.get(2)?.as_str();

    let date = match caps.get(3) {
        Some(year) => parse_date(month, day, year.as_str().parse().ok()?)?,
        None => {
            let this_year = parse_date(month, day, now.year())
                .map(midnight_utc)
                .filter(|candidate| *candidate <= now);
            match this_year {
                Some(found) => return Some(found),
                None => parse_date(month, day, now.year() - 1)?,
            }
        }
    };

    Some(midnight_utc(date))
}

fn parse_date(month: &str, day: &str, year: i32) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(&format!("{month} {day} {year}"), "%B %d %Y").ok()
}

fn midnight_utc(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

#[cfg(test)]
#[path = "date_test.rs"]
mod tests;
