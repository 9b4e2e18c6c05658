// status/mod.rs
//! Flattens a device's state tree into the document served by the status
//! endpoints: state tag → one flat feature map per state value record.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use utoipa::ToSchema;

use crate::{
    devices::RuntimeStatus,
    models::{DeviceSnapshot, FeatureValue, StateValueRecord},
};

/// Output key of the value slot of a record.
pub const VALUE_KEY: &str = "value";

pub type FeatureMap = Map<String, Value>;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct StatusDocument(BTreeMap<String, Vec<FeatureMap>>);

impl StatusDocument {
    pub fn get(&self, tag: &str) -> Option<&[FeatureMap]> {
        self.0.get(tag).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Status of a single device as served by `GET /{id}/status`.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct DeviceStatusResponse {
    pub id: String,
    pub active: bool,
    #[schema(value_type = Object)]
    pub status: StatusDocument,
}

impl DeviceStatusResponse {
    pub fn from_runtime(id: impl Into<String>, runtime: &RuntimeStatus) -> Self {
        Self {
            id: id.into(),
            active: runtime.active,
            status: project(runtime.snapshot.as_ref()),
        }
    }
}

pub fn project(snapshot: Option<&DeviceSnapshot>) -> StatusDocument {
    let Some(snapshot) = snapshot else {
        return StatusDocument::default();
    };

    let states = snapshot
        .states
        .values()
        .map(|state| {
            let records = state.values.iter().map(project_record).collect();
            (state.kind.tag().to_string(), records)
        })
        .collect();

    StatusDocument(states)
}

fn project_record(record: &StateValueRecord) -> FeatureMap {
    let mut features = FeatureMap::new();
    for (name, value) in &record.features {
        if is_value_slot(name) {
            features.insert(VALUE_KEY.to_string(), render_value_slot(value));
        } else if !value.is_empty_text() {
            features.insert(name.clone(), value.to_json());
        }
    }
    features
}

fn is_value_slot(name: &str) -> bool {
    name.eq_ignore_ascii_case(VALUE_KEY)
}

fn render_value_slot(value: &FeatureValue) -> Value {
    match value {
        FeatureValue::Measurement(measurement) => Value::String(measurement.to_string()),
        other => other.to_json(),
    }
}
