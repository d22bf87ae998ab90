//! Canonical date identity used as the key of every store table.
//!
//! A [`DateKey`] always renders as unpadded `year-month-day` (`2024-6-1`).
//! Callers never build key strings by hand: keys come from a
//! [`NaiveDate`], from validated path integers, or from the zero-padded
//! `YYYY-MM-DD` wire form, so padded and unpadded spellings can never end up
//! side by side in one table.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDate};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, ErrorCode, Result};

const YEAR_RANGE: std::ops::RangeInclusive<i32> = 1..=9999;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DateKey {
    date: NaiveDate,
}

impl DateKey {
    #[must_use]
    pub const fn from_date(date: NaiveDate) -> Self {
        Self { date }
    }

    /// Build a key from calendar components, rejecting impossible dates.
    ///
    /// Years are limited to `1..=9999` so every key renders in a form
    /// [`DateKey::parse_wire`] reads back.
    ///
    /// # Errors
    ///
    /// Returns a validation error when the components do not name a real day
    /// or the year falls outside `1..=9999`.
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Result<Self> {
        Some(year)
            .filter(|year| YEAR_RANGE.contains(year))
            .and_then(|year| NaiveDate::from_ymd_opt(year, month, day))
            .map(Self::from_date)
            .ok_or_else(|| {
                Error::validation(
                    ErrorCode::InvalidDate,
                    format!("{year}-{month}-{day} is not a valid calendar date"),
                )
            })
    }

    /// Parse `YYYY-MM-DD`. Zero padding is optional on every component.
    ///
    /// # Errors
    ///
    /// Returns a validation error for anything other than three dash-separated
    /// integers naming a real day.
    pub fn parse_wire(raw: &str) -> Result<Self> {
        let invalid = || {
            Error::validation(
                ErrorCode::InvalidDate,
                format!("'{raw}' is not a date in YYYY-MM-DD form"),
            )
        };

        let mut parts = raw.trim().split('-');
        let (Some(year), Some(month), Some(day), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };

        let year = year.parse::<i32>().map_err(|_| invalid())?;
        let month = month.parse::<u32>().map_err(|_| invalid())?;
        let day = day.parse::<u32>().map_err(|_| invalid())?;
        Self::from_ymd(year, month, day)
    }

    #[must_use]
    pub const fn date(&self) -> NaiveDate {
        self.date
    }
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}",
            self.date.year(),
            self.date.month(),
            self.date.day()
        )
    }
}

impl FromStr for DateKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse_wire(s)
    }
}

impl From<NaiveDate> for DateKey {
    fn from(date: NaiveDate) -> Self {
        Self::from_date(date)
    }
}

impl Serialize for DateKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DateKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse_wire(&raw).map_err(serde::de::Error::custom)
    }
}

impl ToSql for DateKey {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.to_string()))
    }
}

impl FromSql for DateKey {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let raw = value.as_str()?;
        Self::parse_wire(raw).map_err(|err| FromSqlError::Other(Box::new(err)))
    }
}

/// The Sunday on or before `date`. Weeks in the booking calendar start on Sunday.
#[must_use]
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_sunday()))
}

/// `count` consecutive days beginning at `start`.
#[must_use]
pub fn days_from(start: NaiveDate, count: u32) -> Vec<NaiveDate> {
    start.iter_days().take(count as usize).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid test date")
    }

    #[test]
    fn renders_unpadded() {
        assert_eq!(DateKey::from_date(ymd(2024, 6, 1)).to_string(), "2024-6-1");
        assert_eq!(DateKey::from_date(ymd(2024, 12, 31)).to_string(), "2024-12-31");
    }

    #[test]
    fn padded_and_unpadded_wire_forms_are_one_key() {
        let padded = DateKey::parse_wire("2024-06-10").expect("padded");
        let unpadded = DateKey::parse_wire("2024-6-10").expect("unpadded");
        assert_eq!(padded, unpadded);
        assert_eq!(padded.to_string(), "2024-6-10");
    }

    #[test]
    fn rejects_impossible_dates() {
        let err = DateKey::from_ymd(2024, 2, 30).expect_err("feb 30");
        assert_eq!(err.code(), ErrorCode::InvalidDate);
        assert!(DateKey::from_ymd(2024, 13, 1).is_err());
    }

    #[test]
    fn rejects_years_that_cannot_round_trip() {
        for year in [-1, 0, 10_000] {
            let err = DateKey::from_ymd(year, 1, 1).expect_err("out of range year");
            assert_eq!(err.code(), ErrorCode::InvalidDate, "year {year}");
        }
        for year in [1, 9999] {
            let key = DateKey::from_ymd(year, 1, 1).expect("edge year");
            assert_eq!(DateKey::parse_wire(&key.to_string()).expect("reparse"), key);
        }
    }

    #[test]
    fn rejects_malformed_wire_strings() {
        for raw in ["", "2024", "2024-06", "2024-06-10-1", "2024/06/10", "abcd-ef-gh"] {
            let err = DateKey::parse_wire(raw).expect_err(raw);
            assert_eq!(err.code(), ErrorCode::InvalidDate, "input {raw:?}");
        }
    }

    #[test]
    fn orders_by_calendar_not_by_text() {
        let sept = DateKey::parse_wire("2024-9-30").expect("sept");
        let oct = DateKey::parse_wire("2024-10-1").expect("oct");
        assert!(sept < oct);
        assert!(sept.to_string() > oct.to_string());
    }

    #[test]
    fn week_start_is_previous_or_same_sunday() {
        // 2024-06-02 is a Sunday.
        assert_eq!(week_start(ymd(2024, 6, 2)), ymd(2024, 6, 2));
        assert_eq!(week_start(ymd(2024, 6, 5)), ymd(2024, 6, 2));
        assert_eq!(week_start(ymd(2024, 6, 8)), ymd(2024, 6, 2));
        assert_eq!(week_start(ymd(2024, 6, 9)), ymd(2024, 6, 9));
    }

    #[test]
    fn days_from_crosses_month_boundaries() {
        let days = days_from(ymd(2024, 6, 29), 4);
        assert_eq!(
            days,
            vec![ymd(2024, 6, 29), ymd(2024, 6, 30), ymd(2024, 7, 1), ymd(2024, 7, 2)]
        );
    }

    #[test]
    fn serde_uses_canonical_form() {
        let key = DateKey::parse_wire("2024-06-01").expect("key");
        let json = serde_json::to_string(&key).expect("serialize");
        assert_eq!(json, "\"2024-6-1\"");
        let back: DateKey = serde_json::from_str("\"2024-06-01\"").expect("deserialize");
        assert_eq!(back, key);
    }
}
