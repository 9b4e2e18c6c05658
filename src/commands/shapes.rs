// commands/shapes.rs
//! Candidate payload shapes for command parameters.
//!
//! Shapes are tried in ascending priority and the first one that parses wins.
//! Several shapes overlap on the wire, so a shape that is a more specific case
//! of another must carry a lower priority number: a plain number would
//! otherwise be read as a dimensionless measurement.

use serde::{Deserialize, de::DeserializeOwned};
use serde_json::Value;
use std::ops::Deref;
use thiserror::Error;
use validator::Validate;

use super::payload::{
    CommandValue, DailyClimateSchedule, Envelope, ExplicitTeachIn, HsbColor, NumericValue,
    RgbColor,
};
use crate::models::Measurement;

pub mod priority {
    pub const CLIMATE_SCHEDULE: u16 = 10;
    pub const DAILY_CLIMATE_SCHEDULE: u16 = 20;
    pub const NUMBER: u16 = 30;
    pub const MEASUREMENT: u16 = 40;
    pub const HSB_COLOR: u16 = 50;
    pub const RGB_COLOR: u16 = 60;
    pub const EXPLICIT_TEACH_IN: u16 = 70;
    pub const TEXT: u16 = 80;
}

#[derive(Debug, Error)]
#[error("{0}")]
pub struct ShapeMismatch(String);

impl From<serde_json::Error> for ShapeMismatch {
    fn from(err: serde_json::Error) -> Self {
        Self(err.to_string())
    }
}

impl From<validator::ValidationErrors> for ShapeMismatch {
    fn from(err: validator::ValidationErrors) -> Self {
        Self(err.to_string())
    }
}

pub type ParseFn = fn(&Value) -> Result<CommandValue, ShapeMismatch>;

#[derive(Debug, Clone, Copy)]
pub struct Shape {
    tag: &'static str,
    priority: u16,
    parse: ParseFn,
}

impl Shape {
    pub const fn new(tag: &'static str, priority: u16, parse: ParseFn) -> Self {
        Self {
            tag,
            priority,
            parse,
        }
    }

    pub fn tag(&self) -> &'static str {
        self.tag
    }

    pub fn priority(&self) -> u16 {
        self.priority
    }

    pub fn parse(&self, document: &Value) -> Result<CommandValue, ShapeMismatch> {
        (self.parse)(document)
    }
}

inventory::collect!(Shape);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ShapeSetError {
    #[error("shapes {first} and {second} share priority {priority}")]
    DuplicatePriority {
        priority: u16,
        first: &'static str,
        second: &'static str,
    },
}

/// Immutable, priority-ordered list of shapes, built once at startup.
#[derive(Debug, Clone)]
pub struct ShapeSet {
    shapes: Vec<Shape>,
}

impl ShapeSet {
    /// All shapes submitted through `inventory`, ordered by priority.
    pub fn registered() -> Result<Self, ShapeSetError> {
        Self::from_shapes(inventory::iter::<Shape>.into_iter().copied())
    }

    pub fn from_shapes(shapes: impl IntoIterator<Item = Shape>) -> Result<Self, ShapeSetError> {
        let mut shapes: Vec<Shape> = shapes.into_iter().collect();
        shapes.sort_by_key(Shape::priority);

        if let Some(pair) = shapes.windows(2).find(|pair| pair[0].priority == pair[1].priority) {
            return Err(ShapeSetError::DuplicatePriority {
                priority: pair[0].priority,
                first: pair[0].tag,
                second: pair[1].tag,
            });
        }

        Ok(Self { shapes })
    }

    pub fn tags(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.shapes.iter().map(Shape::tag)
    }
}

impl Deref for ShapeSet {
    type Target = [Shape];

    fn deref(&self) -> &Self::Target {
        &self.shapes
    }
}

fn envelope<T: DeserializeOwned>(document: &Value) -> Result<T, ShapeMismatch> {
    Ok(Envelope::<T>::deserialize(document)?.value)
}

fn parse_climate_schedule(document: &Value) -> Result<CommandValue, ShapeMismatch> {
    envelope::<Vec<DailyClimateSchedule>>(document).map(CommandValue::ClimateSchedule)
}

fn parse_daily_climate_schedule(document: &Value) -> Result<CommandValue, ShapeMismatch> {
    envelope::<DailyClimateSchedule>(document).map(CommandValue::DailyClimateSchedule)
}

fn parse_number(document: &Value) -> Result<CommandValue, ShapeMismatch> {
    envelope::<NumericValue>(document)?
        .into_f64()
        .map(CommandValue::Number)
        .ok_or_else(|| ShapeMismatch("value is not a finite number".into()))
}

fn parse_measurement(document: &Value) -> Result<CommandValue, ShapeMismatch> {
    envelope::<Measurement>(document).map(CommandValue::Measurement)
}

fn parse_hsb_color(document: &Value) -> Result<CommandValue, ShapeMismatch> {
    let color = envelope::<HsbColor>(document)?;
    color.validate()?;
    Ok(CommandValue::HsbColor(color))
}

fn parse_rgb_color(document: &Value) -> Result<CommandValue, ShapeMismatch> {
    envelope::<RgbColor>(document).map(CommandValue::RgbColor)
}

fn parse_explicit_teach_in(document: &Value) -> Result<CommandValue, ShapeMismatch> {
    let teach_in = envelope::<ExplicitTeachIn>(document)?;
    teach_in.validate()?;
    Ok(CommandValue::ExplicitTeachIn(teach_in))
}

fn parse_text(document: &Value) -> Result<CommandValue, ShapeMismatch> {
    envelope::<String>(document).map(CommandValue::Text)
}

inventory::submit! {
    Shape::new("climate-schedule", priority::CLIMATE_SCHEDULE, parse_climate_schedule)
}

inventory::submit! {
    Shape::new("daily-climate-schedule", priority::DAILY_CLIMATE_SCHEDULE, parse_daily_climate_schedule)
}

inventory::submit! {
    Shape::new("number", priority::NUMBER, parse_number)
}

inventory::submit! {
    Shape::new("measurement", priority::MEASUREMENT, parse_measurement)
}

inventory::submit! {
    Shape::new("hsb-color", priority::HSB_COLOR, parse_hsb_color)
}

inventory::submit! {
    Shape::new("rgb-color", priority::RGB_COLOR, parse_rgb_color)
}

inventory::submit! {
    Shape::new("explicit-teach-in", priority::EXPLICIT_TEACH_IN, parse_explicit_teach_in)
}

inventory::submit! {
    Shape::new("text", priority::TEXT, parse_text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn registered_shapes_follow_declared_priority() {
        let shapes = ShapeSet::registered().unwrap();
        let tags: Vec<_> = shapes.tags().collect();
        assert_eq!(
            tags,
            vec![
                "climate-schedule",
                "daily-climate-schedule",
                "number",
                "measurement",
                "hsb-color",
                "rgb-color",
                "explicit-teach-in",
                "text",
            ]
        );
    }

    #[test]
    fn number_precedes_measurement() {
        assert!(priority::NUMBER < priority::MEASUREMENT);
        assert!(priority::MEASUREMENT < priority::TEXT);
    }

    #[test]
    fn duplicate_priorities_are_rejected() {
        let result = ShapeSet::from_shapes([
            Shape::new("a", 1, parse_text),
            Shape::new("b", 1, parse_number),
        ]);
        assert_eq!(
            result.unwrap_err(),
            ShapeSetError::DuplicatePriority {
                priority: 1,
                first: "a",
                second: "b",
            }
        );
    }

    #[test]
    fn from_shapes_sorts_by_priority() {
        let shapes = ShapeSet::from_shapes([
            Shape::new("text", 9, parse_text),
            Shape::new("number", 2, parse_number),
        ])
        .unwrap();
        assert_eq!(shapes.tags().collect::<Vec<_>>(), vec!["number", "text"]);
    }

    #[test]
    fn envelope_rejects_extra_fields() {
        let document = json!({"value": 5, "unit": "W"});
        assert!(parse_number(&document).is_err());
    }

    #[test]
    fn each_shape_accepts_its_own_payload() {
        assert!(matches!(
            parse_climate_schedule(&json!({"value": [{"weekDay": "Sun", "setPoints": []}]})),
            Ok(CommandValue::ClimateSchedule(days)) if days.len() == 1
        ));
        assert!(matches!(
            parse_daily_climate_schedule(&json!({"value": {"weekDay": "Sat"}})),
            Ok(CommandValue::DailyClimateSchedule(_))
        ));
        assert!(matches!(
            parse_measurement(&json!({"value": "3 kWh"})),
            Ok(CommandValue::Measurement(_))
        ));
        assert!(matches!(
            parse_hsb_color(&json!({"value": {"hue": 120, "saturation": 50, "brightness": 80}})),
            Ok(CommandValue::HsbColor(_))
        ));
        assert!(matches!(
            parse_rgb_color(&json!({"value": {"red": 255, "green": 0, "blue": 10}})),
            Ok(CommandValue::RgbColor(RgbColor { red: 255, .. }))
        ));
        assert!(matches!(
            parse_explicit_teach_in(&json!({"value": {"eep": "A5-02-05"}})),
            Ok(CommandValue::ExplicitTeachIn(_))
        ));
        assert!(matches!(
            parse_text(&json!({"value": "heating"})),
            Ok(CommandValue::Text(text)) if text == "heating"
        ));
    }

    #[test]
    fn out_of_range_colors_do_not_match() {
        assert!(parse_hsb_color(&json!({"value": {"hue": 361, "saturation": 0, "brightness": 0}})).is_err());
        assert!(parse_rgb_color(&json!({"value": {"red": 256, "green": 0, "blue": 0}})).is_err());
    }
}
