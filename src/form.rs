use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;

use crate::timeline::ClockTime;
use crate::trip::{parse_calendar_date, Intensity, TripWindow, TripWindowError};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TripFlags: u8 {
        const ROUND_TRIP = 0b0001;
        const INCLUDE_HOTELS = 0b0010;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MealFlags: u8 {
        const BREAKFAST = 0b001;
        const LUNCH = 0b010;
        const DINNER = 0b100;
    }
}

impl Default for MealFlags {
    fn default() -> Self {
        MealFlags::all()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Transportation {
    Car,
    #[default]
    Public,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    #[error("departure city is required")]
    MissingOrigin,
    #[error("destination is required")]
    MissingDestination,
    #[error(transparent)]
    Dates(#[from] TripWindowError),
    #[error("traveler count must be at least 1")]
    NoTravelers,
    #[error("{field} must be HH:MM, got '{value}'")]
    InvalidClock { field: &'static str, value: String },
    #[error("return time {return_time} is not after wake-up time {wake_up_time}")]
    ReturnBeforeWake {
        wake_up_time: String,
        return_time: String,
    },
}

/// The design-form input of one trip.
#[derive(Debug, Clone, PartialEq)]
pub struct TripForm {
    pub from: String,
    pub to: String,
    pub start_date: String,
    pub end_date: String,
    pub description: String,
    pub transportation: Transportation,
    pub travelers: Option<u32>,
    pub budget: Option<String>,
    pub flags: TripFlags,
    pub meals: MealFlags,
    pub intensity: Intensity,
    pub wake_up_time: Option<String>,
    pub return_time: Option<String>,
}

impl Default for TripForm {
    fn default() -> Self {
        Self {
            from: String::new(),
            to: String::new(),
            start_date: String::new(),
            end_date: String::new(),
            description: String::new(),
            transportation: Transportation::default(),
            travelers: None,
            budget: None,
            flags: TripFlags::empty(),
            meals: MealFlags::default(),
            intensity: Intensity::default(),
            wake_up_time: None,
            return_time: None,
        }
    }
}

impl TripForm {
    /// Collects every problem so the form can show them all at once.
    pub fn validate(&self) -> Result<TripWindow, Vec<FormError>> {
        let mut errors = Vec::new();
        if self.from.trim().is_empty() {
            errors.push(FormError::MissingOrigin);
        }
        if self.to.trim().is_empty() {
            errors.push(FormError::MissingDestination);
        }
        if self.travelers == Some(0) {
            errors.push(FormError::NoTravelers);
        }
        let wake = check_clock("wake_up_time", self.wake_up_time.as_deref(), &mut errors);
        let back = check_clock("return_time", self.return_time.as_deref(), &mut errors);
        if let (Some(wake), Some(back)) = (wake, back) {
            if back <= wake {
                errors.push(FormError::ReturnBeforeWake {
                    wake_up_time: wake.to_string(),
                    return_time: back.to_string(),
                });
            }
        }
        let window = TripWindow::parse(&self.start_date, &self.end_date, self.intensity);
        match window {
            Ok(window) if errors.is_empty() => Ok(window),
            Ok(_) => Err(errors),
            Err(err) => {
                errors.push(FormError::Dates(err));
                Err(errors)
            }
        }
    }

    pub fn window(&self) -> Option<TripWindow> {
        TripWindow::parse(&self.start_date, &self.end_date, self.intensity).ok()
    }

    pub fn start(&self) -> Option<time::Date> {
        parse_calendar_date(&self.start_date)
    }
}

fn check_clock(
    field: &'static str,
    value: Option<&str>,
    errors: &mut Vec<FormError>,
) -> Option<ClockTime> {
    let raw = value.map(str::trim).filter(|v| !v.is_empty())?;
    match ClockTime::parse(raw) {
        Some(clock) => Some(clock),
        None => {
            errors.push(FormError::InvalidClock {
                field,
                value: raw.to_string(),
            });
            None
        }
    }
}
