// commands/resolver.rs
use serde_json::Value;
use std::fmt;
use thiserror::Error;
use tracing::{debug, trace};

use super::{payload::CommandValue, shapes::Shape};

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// No parameters were supplied: run the command without arguments.
    NoArgument,
    Value {
        shape: &'static str,
        value: CommandValue,
    },
}

impl Resolution {
    pub fn shape(&self) -> Option<&'static str> {
        match self {
            Resolution::NoArgument => None,
            Resolution::Value { shape, .. } => Some(*shape),
        }
    }

    pub fn into_args(self) -> Vec<CommandValue> {
        match self {
            Resolution::NoArgument => Vec::new(),
            Resolution::Value { value, .. } => vec![value],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoMatchReason {
    /// The body is not JSON at all.
    Malformed,
    NoShapeApplies,
}

impl fmt::Display for NoMatchReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoMatchReason::Malformed => f.write_str("malformed document"),
            NoMatchReason::NoShapeApplies => f.write_str("no shape applies"),
        }
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("command parameters not understood: {reason}")]
pub struct NoMatch {
    pub reason: NoMatchReason,
}

/// Resolves a command parameter document against `shapes`, in slice order.
///
/// A missing, blank or empty-object document means the command takes no
/// argument. Otherwise the first shape that parses wins.
pub fn resolve(document: Option<&[u8]>, shapes: &[Shape]) -> Result<Resolution, NoMatch> {
    let Some(raw) = document.map(<[u8]>::trim_ascii).filter(|raw| !raw.is_empty()) else {
        return Ok(Resolution::NoArgument);
    };
    if raw == b"{}" {
        return Ok(Resolution::NoArgument);
    }

    let parsed: Value = serde_json::from_slice(raw).map_err(|err| {
        debug!(error = %err, "command parameters are not valid JSON");
        NoMatch {
            reason: NoMatchReason::Malformed,
        }
    })?;
    if parsed.as_object().is_some_and(|object| object.is_empty()) {
        return Ok(Resolution::NoArgument);
    }

    for shape in shapes {
        match shape.parse(&parsed) {
            Ok(value) => {
                return Ok(Resolution::Value {
                    shape: shape.tag(),
                    value,
                });
            }
            Err(mismatch) => trace!(shape = shape.tag(), %mismatch, "shape does not apply"),
        }
    }

    Err(NoMatch {
        reason: NoMatchReason::NoShapeApplies,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        commands::{
            payload::HsbColor,
            shapes::{ShapeSet, priority},
        },
        models::Measurement,
    };

    fn shapes() -> ShapeSet {
        ShapeSet::registered().unwrap()
    }

    fn doc(text: &str) -> Option<&[u8]> {
        Some(text.as_bytes())
    }

    fn value_of(document: &str) -> CommandValue {
        match resolve(doc(document), &shapes()) {
            Ok(Resolution::Value { value, .. }) => value,
            other => panic!("unexpected resolution for {document}: {other:?}"),
        }
    }

    #[test]
    fn empty_forms_resolve_to_no_argument() {
        let shapes = shapes();
        assert_eq!(resolve(None, &shapes), Ok(Resolution::NoArgument));
        assert_eq!(resolve(doc(""), &shapes), Ok(Resolution::NoArgument));
        assert_eq!(resolve(doc("{}"), &shapes), Ok(Resolution::NoArgument));
        assert_eq!(resolve(doc("  { }\n"), &shapes), Ok(Resolution::NoArgument));
    }

    #[test]
    fn no_shapes_never_match() {
        assert_eq!(
            resolve(doc(r#"{"value": 5}"#), &[]),
            Err(NoMatch {
                reason: NoMatchReason::NoShapeApplies
            })
        );
        assert!(resolve(doc("not json"), &[]).is_err());
    }

    #[test]
    fn plain_number_is_not_a_measurement() {
        assert_eq!(value_of(r#"{"value": 5}"#), CommandValue::Number(5.0));
        assert_eq!(value_of(r#"{"value": "5"}"#), CommandValue::Number(5.0));
    }

    #[test]
    fn earliest_matching_shape_wins() {
        let resolution = resolve(doc(r#"{"value": 5}"#), &shapes()).unwrap();
        assert_eq!(resolution.shape(), Some("number"));

        // the same document matches the measurement shape when it comes first
        let measurement_first: Vec<Shape> = shapes()
            .iter()
            .copied()
            .filter(|shape| shape.priority() != priority::NUMBER)
            .collect();
        let resolution = resolve(doc(r#"{"value": 5}"#), &measurement_first).unwrap();
        assert_eq!(
            resolution,
            Resolution::Value {
                shape: "measurement",
                value: CommandValue::Measurement(Measurement::dimensionless(5.0).unwrap()),
            }
        );
    }

    #[test]
    fn unit_bearing_values_are_measurements() {
        assert_eq!(
            value_of(r#"{"value": "21.5 °C"}"#),
            CommandValue::Measurement(Measurement::new(21.5, "°C").unwrap())
        );
    }

    #[test]
    fn plain_words_fall_through_to_text() {
        assert_eq!(value_of(r#"{"value": "eco"}"#), CommandValue::Text("eco".into()));
    }

    #[test]
    fn text_starting_with_a_digit_stays_text() {
        for text in ["10:30", "1.2.3", "1st floor", "3 apples"] {
            let document = format!(r#"{{"value": "{text}"}}"#);
            let resolution = resolve(doc(&document), &shapes()).unwrap();
            assert_eq!(resolution.shape(), Some("text"), "{text}");
            assert_eq!(resolution.into_args(), vec![CommandValue::Text(text.into())]);
        }
    }

    #[test]
    fn colors_resolve_by_field_names() {
        assert_eq!(
            value_of(r#"{"value": {"hue": 30, "saturation": 100, "brightness": 40}}"#),
            CommandValue::HsbColor(HsbColor {
                hue: 30.0,
                saturation: 100.0,
                brightness: 40.0,
            })
        );
        assert!(matches!(
            value_of(r#"{"value": {"red": 1, "green": 2, "blue": 3}}"#),
            CommandValue::RgbColor(_)
        ));
    }

    #[test]
    fn schedules_resolve_before_anything_else() {
        assert!(matches!(
            value_of(r#"{"value": [{"weekDay": "Mon", "setPoints": [{"time": "07:00", "temperature": "20 °C"}]}]}"#),
            CommandValue::ClimateSchedule(_)
        ));
        assert!(matches!(
            value_of(r#"{"value": {"weekDay": "Tue", "setPoints": []}}"#),
            CommandValue::DailyClimateSchedule(_)
        ));
    }

    #[test]
    fn malformed_documents_are_no_match() {
        assert_eq!(
            resolve(doc("{value: 5"), &shapes()),
            Err(NoMatch {
                reason: NoMatchReason::Malformed
            })
        );
    }

    #[test]
    fn unknown_payloads_are_no_match() {
        assert_eq!(
            resolve(doc(r#"{"level": 5}"#), &shapes()),
            Err(NoMatch {
                reason: NoMatchReason::NoShapeApplies
            })
        );
        assert!(resolve(doc("null"), &shapes()).is_err());
    }

    #[test]
    fn no_argument_has_no_args() {
        assert!(Resolution::NoArgument.into_args().is_empty());
        assert_eq!(
            Resolution::Value {
                shape: "text",
                value: CommandValue::Text("x".into()),
            }
            .into_args()
            .len(),
            1
        );
    }
}
