// models.rs
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::{collections::BTreeMap, fmt, str::FromStr, sync::Arc};
use thiserror::Error;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    commands::{CommandExecutor, ShapeSet},
    devices::DeviceRegistry,
};

/// Static description of a device as configured in the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDescriptor {
    pub id: String,
    /// Device category, e.g. `Lamp` or `ThermostaticValve`.
    pub class: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Room or zone the device is installed in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_in: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
    /// Commands the device accepts. Empty means the device does not restrict them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<String>,
}

impl DeviceDescriptor {
    pub fn new(id: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            class: class.into(),
            description: None,
            is_in: None,
            gateway: None,
            commands: Vec::new(),
        }
    }

    pub fn accepts(&self, command: &str) -> bool {
        self.commands.is_empty()
            || self
                .commands
                .iter()
                .any(|known| known.eq_ignore_ascii_case(command))
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DeviceList {
    #[serde(rename = "device")]
    pub devices: Vec<DeviceDescriptor>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateLocationRequest {
    #[serde(rename = "isIn")]
    #[validate(length(min = 1, message = "location must not be empty"))]
    pub is_in: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateDescriptionRequest {
    #[validate(length(min = 1, message = "description must not be empty"))]
    pub description: String,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MeasurementError {
    #[error("measurement is empty")]
    Empty,
    #[error("no numeric magnitude in {0:?}")]
    MissingMagnitude(String),
    #[error("measurement magnitude must be finite")]
    NotFinite,
    #[error("invalid unit {0:?}")]
    InvalidUnit(String),
}

/// A numeric magnitude paired with a physical unit.
///
/// An empty unit denotes a dimensionless quantity. The textual form is
/// `"<magnitude> <unit>"`, e.g. `21.5 °C`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "MeasurementRepr")]
pub struct Measurement {
    value: f64,
    unit: String,
}

impl Measurement {
    pub fn new(value: f64, unit: impl Into<String>) -> Result<Self, MeasurementError> {
        if !value.is_finite() {
            return Err(MeasurementError::NotFinite);
        }
        let unit = unit.into().trim().to_string();
        if !unit.is_empty() && !is_unit(&unit) {
            return Err(MeasurementError::InvalidUnit(unit));
        }
        Ok(Self { value, unit })
    }

    pub fn dimensionless(value: f64) -> Result<Self, MeasurementError> {
        Self::new(value, "")
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn is_dimensionless(&self) -> bool {
        self.unit.is_empty()
    }
}

/// Symbols that accept an SI prefix (`kW`, `hPa`, `mA`).
const PREFIXABLE_UNITS: &[&str] = &[
    "m", "g", "s", "A", "K", "mol", "cd", "Hz", "N", "Pa", "J", "W", "Wh", "VA", "var", "VAr",
    "C", "V", "F", "Ω", "S", "Wb", "T", "H", "lx", "lm", "Bq", "Gy", "Sv", "kat", "rad", "sr",
    "L", "l", "bar", "B", "bit",
];

const PLAIN_UNITS: &[&str] = &[
    "°C", "°F", "℃", "℉", "°", "%", "‰", "ppm", "ppb", "dB", "dBm", "min", "h", "d", "lux", "ohm",
];

const SI_PREFIXES: &[&str] = &[
    "da", "Y", "Z", "E", "P", "T", "G", "M", "k", "h", "d", "c", "m", "µ", "μ", "u", "n", "p",
    "f", "a", "z", "y",
];

/// A unit is one or more known symbols joined by `/`, `·` or `*`, each with
/// an optional integer exponent (`m2`, `m^-2`, `m²`).
fn is_unit(unit: &str) -> bool {
    unit.split(['/', '·', '*'])
        .all(|factor| is_unit_symbol(strip_exponent(factor)))
}

fn strip_exponent(factor: &str) -> &str {
    if let Some(base) = factor.strip_suffix(['²', '³']) {
        return base;
    }
    let base = factor.trim_end_matches(|c: char| c.is_ascii_digit());
    if base.len() == factor.len() {
        return factor;
    }
    let base = base.strip_suffix('-').unwrap_or(base);
    base.strip_suffix('^').unwrap_or(base)
}

fn is_unit_symbol(symbol: &str) -> bool {
    PLAIN_UNITS.contains(&symbol)
        || PREFIXABLE_UNITS.contains(&symbol)
        || SI_PREFIXES.iter().any(|prefix| {
            symbol
                .strip_prefix(*prefix)
                .is_some_and(|rest| PREFIXABLE_UNITS.contains(&rest))
        })
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.unit.is_empty() {
            write!(f, "{}", self.value)
        } else {
            write!(f, "{} {}", self.value, self.unit)
        }
    }
}

impl FromStr for Measurement {
    type Err = MeasurementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        if text.is_empty() {
            return Err(MeasurementError::Empty);
        }

        // longest prefix that still reads as a number, the rest is the unit
        let mut ends: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .filter(|&i| i > 0)
            .collect();
        ends.push(text.len());

        let (end, value) = ends
            .into_iter()
            .rev()
            .find_map(|end| text[..end].parse::<f64>().ok().map(|value| (end, value)))
            .ok_or_else(|| MeasurementError::MissingMagnitude(text.to_string()))?;

        Self::new(value, &text[end..])
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MeasurementRepr {
    Number(f64),
    Text(String),
    Parts(MeasurementParts),
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct MeasurementParts {
    value: f64,
    #[serde(default)]
    unit: String,
}

impl TryFrom<MeasurementRepr> for Measurement {
    type Error = MeasurementError;

    fn try_from(repr: MeasurementRepr) -> Result<Self, Self::Error> {
        match repr {
            MeasurementRepr::Number(value) => Self::dimensionless(value),
            MeasurementRepr::Text(text) => text.parse(),
            MeasurementRepr::Parts(parts) => Self::new(parts.value, parts.unit),
        }
    }
}

/// One named feature of a state value record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Bool(bool),
    Integer(i64),
    Number(f64),
    Text(String),
    Measurement(Measurement),
}

impl FeatureValue {
    pub fn is_empty_text(&self) -> bool {
        matches!(self, FeatureValue::Text(text) if text.is_empty())
    }

    pub fn to_json(&self) -> Value {
        match self {
            FeatureValue::Bool(flag) => Value::Bool(*flag),
            FeatureValue::Integer(number) => Value::from(*number),
            FeatureValue::Number(number) => Value::from(*number),
            FeatureValue::Text(text) => Value::String(text.clone()),
            FeatureValue::Measurement(measurement) => json!({
                "value": measurement.value(),
                "unit": measurement.unit(),
            }),
        }
    }
}

impl From<&str> for FeatureValue {
    fn from(text: &str) -> Self {
        FeatureValue::Text(text.to_string())
    }
}

impl From<bool> for FeatureValue {
    fn from(flag: bool) -> Self {
        FeatureValue::Bool(flag)
    }
}

impl From<Measurement> for FeatureValue {
    fn from(measurement: Measurement) -> Self {
        FeatureValue::Measurement(measurement)
    }
}

/// Kind of a device state. The tag is the identifier published to clients.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StateKind {
    OnOff,
    Level,
    Temperature,
    Humidity,
    Color,
    OpenClose,
    ActivePower,
    ActiveEnergy,
    Occupancy,
    Other(String),
}

impl StateKind {
    pub fn tag(&self) -> &str {
        match self {
            StateKind::OnOff => "OnOffState",
            StateKind::Level => "LevelState",
            StateKind::Temperature => "TemperatureState",
            StateKind::Humidity => "HumidityMeasurementState",
            StateKind::Color => "ColorState",
            StateKind::OpenClose => "OpenCloseState",
            StateKind::ActivePower => "SinglePhaseActivePowerMeasurementState",
            StateKind::ActiveEnergy => "SinglePhaseActiveEnergyState",
            StateKind::Occupancy => "OccupancyState",
            StateKind::Other(tag) => tag,
        }
    }
}

impl From<String> for StateKind {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "OnOffState" => StateKind::OnOff,
            "LevelState" => StateKind::Level,
            "TemperatureState" => StateKind::Temperature,
            "HumidityMeasurementState" => StateKind::Humidity,
            "ColorState" => StateKind::Color,
            "OpenCloseState" => StateKind::OpenClose,
            "SinglePhaseActivePowerMeasurementState" => StateKind::ActivePower,
            "SinglePhaseActiveEnergyState" => StateKind::ActiveEnergy,
            "OccupancyState" => StateKind::Occupancy,
            _ => StateKind::Other(tag),
        }
    }
}

impl From<StateKind> for String {
    fn from(kind: StateKind) -> Self {
        kind.tag().to_string()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateValueRecord {
    pub features: BTreeMap<String, FeatureValue>,
}

impl<K: Into<String>> FromIterator<(K, FeatureValue)> for StateValueRecord {
    fn from_iter<I: IntoIterator<Item = (K, FeatureValue)>>(iter: I) -> Self {
        Self {
            features: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceState {
    pub kind: StateKind,
    pub values: Vec<StateValueRecord>,
}

impl DeviceState {
    pub fn new(kind: StateKind, values: Vec<StateValueRecord>) -> Self {
        Self { kind, values }
    }
}

/// Current published state of a device, keyed by state name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceSnapshot {
    pub states: BTreeMap<String, DeviceState>,
}

impl DeviceSnapshot {
    pub fn with_state(mut self, name: impl Into<String>, state: DeviceState) -> Self {
        self.states.insert(name.into(), state);
        self
    }
}

pub struct AppState {
    pub registry: Arc<dyn DeviceRegistry>,
    pub executor: Arc<dyn CommandExecutor>,
    pub shapes: ShapeSet,
}

impl AppState {
    pub fn new(
        registry: Arc<dyn DeviceRegistry>,
        executor: Arc<dyn CommandExecutor>,
        shapes: ShapeSet,
    ) -> Self {
        Self {
            registry,
            executor,
            shapes,
        }
    }
}
