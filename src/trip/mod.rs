use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use thiserror::Error;
use time::format_description::well_known::Rfc2822;
use time::{Date, Month, OffsetDateTime};

pub mod calendar;
pub mod rules;

pub use calendar::{generate_monthly_span, MonthGrid};
pub use rules::{minimum_required, minimum_required_for, FALLBACK_MINIMUM};

static DATE_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{4})[-/.](\d{1,2})[-/.](\d{1,2})(?:$|[T\s])").expect("valid date prefix regex")
});

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Intensity {
    Chill,
    #[default]
    Normal,
    Intense,
}

impl Intensity {
    /// Number of POIs targeted for each trip day.
    pub fn per_day(self) -> u32 {
        match self {
            Intensity::Chill => 1,
            Intensity::Normal => 2,
            Intensity::Intense => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TripWindowError {
    #[error("start date '{0}' is not a valid date")]
    InvalidStart(String),
    #[error("end date '{0}' is not a valid date")]
    InvalidEnd(String),
    #[error("trip ends ({end}) before it starts ({start})")]
    Inverted { start: DayKey, end: DayKey },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TripWindow {
    start: Date,
    end: Date,
    intensity: Intensity,
}

impl TripWindow {
    pub fn new(start: Date, end: Date, intensity: Intensity) -> Result<Self, TripWindowError> {
        if start > end {
            return Err(TripWindowError::Inverted {
                start: DayKey(start),
                end: DayKey(end),
            });
        }
        Ok(Self {
            start,
            end,
            intensity,
        })
    }

    pub fn parse(start: &str, end: &str, intensity: Intensity) -> Result<Self, TripWindowError> {
        let start_date = parse_calendar_date(start)
            .ok_or_else(|| TripWindowError::InvalidStart(start.to_string()))?;
        let end_date =
            parse_calendar_date(end).ok_or_else(|| TripWindowError::InvalidEnd(end.to_string()))?;
        Self::new(start_date, end_date, intensity)
    }

    pub fn start(&self) -> Date {
        self.start
    }

    pub fn end(&self) -> Date {
        self.end
    }

    pub fn intensity(&self) -> Intensity {
        self.intensity
    }

    pub fn day_count(&self) -> u32 {
        inclusive_day_count(self.start, self.end)
    }

    pub fn contains(&self, date: Date) -> bool {
        date >= self.start && date <= self.end
    }

    /// 1-based position of `date` inside the trip together with the trip length.
    pub fn day_position(&self, date: Date) -> Option<(u32, u32)> {
        if !self.contains(date) {
            return None;
        }
        Some((inclusive_day_count(self.start, date), self.day_count()))
    }

    pub fn days(&self) -> impl Iterator<Item = Date> {
        let end = self.end;
        std::iter::successors(Some(self.start), move |day| {
            day.next_day().filter(|next| *next <= end)
        })
    }
}

/// Canonical `YYYY-MM-DD` day key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DayKey(pub Date);

impl DayKey {
    pub fn parse(raw: &str) -> Option<Self> {
        parse_calendar_date(raw).map(DayKey)
    }

    pub fn date(&self) -> Date {
        self.0
    }
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02}",
            self.0.year(),
            u8::from(self.0.month()),
            self.0.day()
        )
    }
}

impl Serialize for DayKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Reads the calendar date out of the date strings the backend and the form produce.
///
/// Accepts `YYYY-MM-DD` optionally followed by a `T`/space time component,
/// slash or dot separated dates, and RFC 2822 timestamps. The date is taken
/// as written; offsets are not applied.
pub fn parse_calendar_date(raw: &str) -> Option<Date> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Some(caps) = DATE_PREFIX.captures(trimmed) {
        let year: i32 = caps[1].parse().ok()?;
        let month: u8 = caps[2].parse().ok()?;
        let day: u8 = caps[3].parse().ok()?;
        let month = Month::try_from(month).ok()?;
        return Date::from_calendar_date(year, month, day).ok();
    }
    OffsetDateTime::parse(trimmed, &Rfc2822)
        .ok()
        .or_else(|| {
            let numeric = format!("{} +0000", trimmed.strip_suffix("GMT")?.trim_end());
            OffsetDateTime::parse(&numeric, &Rfc2822).ok()
        })
        .map(|dt| dt.date())
}

pub(crate) fn inclusive_day_count(start: Date, end: Date) -> u32 {
    let whole = (end - start).whole_days();
    (whole + 1).max(1) as u32
}
