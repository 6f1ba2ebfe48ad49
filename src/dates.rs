//! UTC calendar-day helpers.
//!
//! Reports are keyed by UTC calendar day and retained only for the current
//! UTC month, so every date the queue touches goes through these functions.
//! All of them read UTC fields only; the local time zone never matters.

use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Format the UTC calendar day of `date` as `YYYY-MM-DD`.
#[must_use]
pub fn format_iso_utc(date: &DateTime<Utc>) -> String {
    format_naive(date.date_naive())
}

/// First instant (day 1, 00:00:00 UTC) of the UTC month containing `date`.
#[must_use]
pub fn beginning_of_month_utc(date: &DateTime<Utc>) -> DateTime<Utc> {
    let day = date.date_naive();
    let first = day - Days::new(u64::from(day.day0()));
    first.and_time(NaiveTime::MIN).and_utc()
}

/// Parse a strict `YYYY-MM-DD` string into midnight UTC of that day.
///
/// Returns `None` for anything that is not exactly four digits, a dash, two
/// digits, a dash and two digits, for months outside 1-12, and for days that
/// do not exist in that month (so `2023-02-29` fails while `2024-02-29`
/// parses).
#[must_use]
pub fn parse_and_validate_iso_date(value: &str) -> Option<DateTime<Utc>> {
    parse_naive(value).map(|day| day.and_time(NaiveTime::MIN).and_utc())
}

/// Returns `true` for Gregorian leap years.
#[must_use]
pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

/// Number of days in `month` (1-12) of `year`. Returns 0 for invalid months.
#[must_use]
pub fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        2 => 28,
        _ => 0,
    }
}

fn format_naive(day: NaiveDate) -> String {
    format!("{:04}-{:02}-{:02}", day.year(), day.month(), day.day())
}

fn parse_naive(value: &str) -> Option<NaiveDate> {
    let bytes = value.as_bytes();
    if bytes.len() != 10 || bytes[4] != b'-' || bytes[7] != b'-' {
        return None;
    }
    let digits_ok = bytes
        .iter()
        .enumerate()
        .all(|(i, b)| i == 4 || i == 7 || b.is_ascii_digit());
    if !digits_ok {
        return None;
    }

    let year: i32 = value[0..4].parse().ok()?;
    let month: u32 = value[5..7].parse().ok()?;
    let day: u32 = value[8..10].parse().ok()?;

    if !(1..=12).contains(&month) {
        return None;
    }
    if day < 1 || day > days_in_month(year, month) {
        return None;
    }

    let parsed = NaiveDate::from_ymd_opt(year, month, day)?;
    // Reject anything that would not format back to the same string.
    if format_naive(parsed) != value {
        return None;
    }
    Some(parsed)
}

/// A validated UTC calendar day, serialized as `"YYYY-MM-DD"`.
///
/// Ordering is chronological, which for this format is also the lexical
/// ordering of the serialized strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IsoDate(NaiveDate);

impl IsoDate {
    /// The UTC calendar day containing `instant`.
    #[must_use]
    pub fn of(instant: &DateTime<Utc>) -> Self {
        Self(instant.date_naive())
    }

    /// Build from calendar fields. Returns `None` for impossible dates.
    #[must_use]
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self)
    }

    /// First day of this date's month.
    #[must_use]
    pub fn month_start(&self) -> Self {
        Self(self.0 - Days::new(u64::from(self.0.day0())))
    }

    /// Midnight UTC of this day.
    #[must_use]
    pub fn to_datetime(&self) -> DateTime<Utc> {
        self.0.and_time(NaiveTime::MIN).and_utc()
    }

    /// Calendar year.
    #[must_use]
    pub fn year(&self) -> i32 {
        self.0.year()
    }

    /// Zero-based month index (January = 0).
    #[must_use]
    pub fn month0(&self) -> u32 {
        self.0.month0()
    }
}

impl fmt::Display for IsoDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_naive(self.0))
    }
}

/// Error returned when a string is not a valid `YYYY-MM-DD` day.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid ISO date: {0:?}")]
pub struct InvalidIsoDate(pub String);

impl FromStr for IsoDate {
    type Err = InvalidIsoDate;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_naive(s)
            .map(Self)
            .ok_or_else(|| InvalidIsoDate(s.to_owned()))
    }
}

impl Serialize for IsoDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for IsoDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
