use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

pub const MINUTES_PER_DAY: u16 = 24 * 60;

static CLOCK_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2}):(\d{2})$").expect("valid clock regex"));

/// Wall-clock time of day with minute precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClockTime {
    minute_of_day: u16,
}

impl ClockTime {
    pub fn from_hm(hour: u8, minute: u8) -> Option<Self> {
        if hour > 23 || minute > 59 {
            return None;
        }
        Some(Self {
            minute_of_day: u16::from(hour) * 60 + u16::from(minute),
        })
    }

    /// Parses `HH:MM` (hour 0-23, minute 0-59). Surrounding whitespace is ignored.
    pub fn parse(raw: &str) -> Option<Self> {
        let caps = CLOCK_PATTERN.captures(raw.trim())?;
        let hour: u8 = caps[1].parse().ok()?;
        let minute: u8 = caps[2].parse().ok()?;
        Self::from_hm(hour, minute)
    }

    /// Lenient variant for text-only rendering: missing or malformed input reads as midnight.
    /// Callers report the bad value themselves.
    pub fn minute_of_day_or_zero(raw: Option<&str>) -> u16 {
        raw.and_then(Self::parse).map_or(0, |clock| clock.minute_of_day)
    }

    pub fn minute_of_day(&self) -> u16 {
        self.minute_of_day
    }

    pub fn hour(&self) -> u8 {
        (self.minute_of_day / 60) as u8
    }

    pub fn minute(&self) -> u8 {
        (self.minute_of_day % 60) as u8
    }

    pub fn from_minute_of_day(minute_of_day: u16) -> Option<Self> {
        (minute_of_day < MINUTES_PER_DAY).then_some(Self { minute_of_day })
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

/// Renders a minute count the way the time axis captions it, e.g. `1h 30m`, `45m`, `2h`.
pub fn format_duration_minutes(minutes: u16) -> String {
    let hours = minutes / 60;
    let rest = minutes % 60;
    match (hours, rest) {
        (0, m) => format!("{m}m"),
        (h, 0) => format!("{h}h"),
        (h, m) => format!("{h}h {m}m"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_times() {
        assert_eq!(ClockTime::parse("08:00").map(|c| c.minute_of_day()), Some(480));
        assert_eq!(ClockTime::parse("7:05").map(|c| c.minute_of_day()), Some(425));
        assert_eq!(ClockTime::parse(" 23:59 ").map(|c| c.minute_of_day()), Some(1439));
    }

    #[test]
    fn rejects_out_of_range_and_malformed() {
        for raw in ["24:00", "12:60", "1200", "12:5", "ab:cd", "", "12:00:00"] {
            assert_eq!(ClockTime::parse(raw), None, "{raw}");
        }
    }

    #[test]
    fn lenient_parse_defaults_to_midnight() {
        assert_eq!(ClockTime::minute_of_day_or_zero(Some("nope")), 0);
        assert_eq!(ClockTime::minute_of_day_or_zero(None), 0);
        assert_eq!(ClockTime::minute_of_day_or_zero(Some("10:30")), 630);
        assert_eq!(ClockTime::minute_of_day_or_zero(Some(" 24:00 ")), 0);
    }

    #[test]
    fn formats_durations_like_the_axis() {
        assert_eq!(format_duration_minutes(60), "1h");
        assert_eq!(format_duration_minutes(90), "1h 30m");
        assert_eq!(format_duration_minutes(45), "45m");
        assert_eq!(ClockTime::from_hm(9, 5).map(|c| c.to_string()), Some("09:05".into()));
    }
}
