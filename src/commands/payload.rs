// commands/payload.rs
use chrono::{NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::Measurement;

/// The single argument handed to the executor for a parameterised command.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CommandValue {
    ClimateSchedule(Vec<DailyClimateSchedule>),
    DailyClimateSchedule(DailyClimateSchedule),
    Number(f64),
    Measurement(Measurement),
    HsbColor(HsbColor),
    RgbColor(RgbColor),
    ExplicitTeachIn(ExplicitTeachIn),
    Text(String),
}

/// Every parameter document wraps its payload as `{"value": ...}`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct Envelope<T> {
    pub value: T,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DailyClimateSchedule {
    pub week_day: Weekday,
    #[serde(default)]
    pub set_points: Vec<ClimateSetPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClimateSetPoint {
    #[serde(with = "hour_minute")]
    pub time: NaiveTime,
    pub temperature: Measurement,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct HsbColor {
    #[validate(range(min = 0.0, max = 360.0))]
    pub hue: f64,
    #[validate(range(min = 0.0, max = 100.0))]
    pub saturation: f64,
    #[validate(range(min = 0.0, max = 100.0))]
    pub brightness: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RgbColor {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

/// Pairing request for radio devices that need an explicit equipment profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ExplicitTeachIn {
    #[validate(length(min = 1))]
    pub eep: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
}

/// A JSON number, or a string that holds nothing but a number.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum NumericValue {
    Number(f64),
    Text(String),
}

impl NumericValue {
    pub fn into_f64(self) -> Option<f64> {
        let number = match self {
            NumericValue::Number(number) => number,
            NumericValue::Text(text) => text.trim().parse().ok()?,
        };
        number.is_finite().then_some(number)
    }
}

mod hour_minute {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    const FORMAT: &str = "%H:%M";

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&time.format(FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let text = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&text, FORMAT).map_err(D::Error::custom)
    }
}
