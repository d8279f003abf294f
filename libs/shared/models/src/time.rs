//! Wire representations for the two halves of a dose event key.
//!
//! Both serialize as the plain strings the portal has always stored:
//! `"08:00"` for clock times and `"Sat Jun 01 2024"` for calendar days.
//! Days compare by date; the weekday is always rendered from the date.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate, NaiveTime};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

const CLOCK_FORMAT: &str = "%H:%M";
const DAY_FORMAT: &str = "%a %b %d %Y";
const MONTH_DAY_YEAR_FORMAT: &str = "%b %d %Y";
const ISO_DAY_FORMAT: &str = "%Y-%m-%d";

/// Minute-resolution wall clock time, e.g. a scheduled dose at `08:00`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClockTime(NaiveTime);

impl ClockTime {
    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(ClockTime)
    }

    pub fn as_naive(&self) -> NaiveTime {
        self.0
    }
}

impl From<NaiveTime> for ClockTime {
    fn from(time: NaiveTime) -> Self {
        ClockTime(time)
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(CLOCK_FORMAT))
    }
}

impl FromStr for ClockTime {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveTime::parse_from_str(s.trim(), CLOCK_FORMAT).map(ClockTime)
    }
}

impl Serialize for ClockTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ClockTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

/// A calendar day without time zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CalendarDay(NaiveDate);

impl CalendarDay {
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(CalendarDay)
    }

    pub fn as_naive(&self) -> NaiveDate {
        self.0
    }

    /// Day of week with Sunday as 0, matching `daysOfWeek` in prescriptions.
    pub fn weekday_index(&self) -> u8 {
        self.0.weekday().num_days_from_sunday() as u8
    }
}

impl From<NaiveDate> for CalendarDay {
    fn from(date: NaiveDate) -> Self {
        CalendarDay(date)
    }
}

impl fmt::Display for CalendarDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(DAY_FORMAT))
    }
}

impl FromStr for CalendarDay {
    type Err = chrono::ParseError;

    /// Accepts `"Sat Jun 01 2024"`, `"Jun 01 2024"` and `"2024-06-01"`.
    ///
    /// The leading weekday is a label only. Days written by clients with a
    /// mismatched weekday (`"Mon Jun 01 2024"`) still name June 1st.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(date) = NaiveDate::parse_from_str(s, ISO_DAY_FORMAT) {
            return Ok(CalendarDay(date));
        }

        let without_weekday = match s.split_once(' ') {
            Some((head, rest)) if head.chars().all(|c| c.is_ascii_alphabetic()) => rest,
            _ => s,
        };
        NaiveDate::parse_from_str(without_weekday.trim(), MONTH_DAY_YEAR_FORMAT)
            .or_else(|_| NaiveDate::parse_from_str(s, MONTH_DAY_YEAR_FORMAT))
            .map(CalendarDay)
    }
}

impl Serialize for CalendarDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CalendarDay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}
