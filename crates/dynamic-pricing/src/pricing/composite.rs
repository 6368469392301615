//! Multipliers derived from more than a single table lookup.
//!
//! Both composites take the already looked-up table multiplier (weekday or
//! weather condition) so the formulas stay pure functions of their inputs.

use chrono::{DateTime, TimeZone, Timelike};
use serde::{Deserialize, Serialize};

use super::factors::ValidationError;

pub const REFERENCE_TEMPERATURE: f64 = 20.0;
pub const TEMPERATURE_SLOPE: f64 = 0.005;

const MORNING_FACTOR: f64 = 0.98;
const AFTERNOON_FACTOR: f64 = 1.00;
const EVENING_FACTOR: f64 = 1.02;
const HAPPY_HOUR_FACTOR: f64 = 0.98;

/// Clock hour supplied by the caller; the engine never reads a clock itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct HourOfDay(u8);

impl HourOfDay {
    pub fn new(hour: u32) -> Result<Self, ValidationError> {
        if hour < 24 {
            Ok(Self(hour as u8))
        } else {
            Err(ValidationError::HourOutOfRange { hour })
        }
    }

    pub fn from_datetime<Tz: TimeZone>(moment: &DateTime<Tz>) -> Self {
        Self(moment.hour() as u8)
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u32> for HourOfDay {
    type Error = ValidationError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<HourOfDay> for u32 {
    fn from(value: HourOfDay) -> Self {
        u32::from(value.0)
    }
}

pub fn time_of_day_factor(hour: HourOfDay) -> f64 {
    match hour.get() {
        0..=11 => MORNING_FACTOR,
        12..=15 => AFTERNOON_FACTOR,
        _ => EVENING_FACTOR,
    }
}

/// Applies on top of the evening factor for 16:00-18:59.
pub fn happy_hour_factor(hour: HourOfDay) -> f64 {
    if (16..19).contains(&hour.get()) {
        HAPPY_HOUR_FACTOR
    } else {
        1.0
    }
}

pub fn time_day_markup(hour: HourOfDay, weekday_factor: f64) -> f64 {
    time_of_day_factor(hour) * weekday_factor * happy_hour_factor(hour)
}

pub fn temperature_factor(temperature: f64) -> f64 {
    1.0 + (temperature - REFERENCE_TEMPERATURE) * TEMPERATURE_SLOPE
}

pub fn weather_markup(temperature: f64, condition_factor: f64) -> f64 {
    temperature_factor(temperature) * condition_factor
}
