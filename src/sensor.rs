//! The entity surface shared by the three inverter sensors.

use crate::config::DOMAIN;
use serde_derive::Serialize;
use std::fmt;

/// The displayed value of a sensor.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum SensorValue {
    /// Nothing has been read yet.
    #[default]
    Unknown,
    Integer(i64),
    Float(f64),
    /// The last update cycle failed unexpectedly.
    Error,
}

impl fmt::Display for SensorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorValue::Unknown => write!(f, "unknown"),
            SensorValue::Integer(value) => write!(f, "{value}"),
            SensorValue::Float(value) => write!(f, "{value}"),
            SensorValue::Error => write!(f, "error"),
        }
    }
}

impl serde::Serialize for SensorValue {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            SensorValue::Unknown => serializer.serialize_none(),
            SensorValue::Integer(value) => serializer.serialize_i64(*value),
            SensorValue::Float(value) => serializer.serialize_f64(*value),
            SensorValue::Error => serializer.serialize_str("error"),
        }
    }
}

/// A state write handed to the host for publication.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorUpdate {
    pub entity_id: String,
    pub name: String,
    pub unit_of_measurement: &'static str,
    pub icon: String,
    pub state: SensorValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<serde_json::Value>,
}

/// What the host needs to register and display a sensor.
pub trait Sensor {
    fn entity_id(&self) -> &str;
    fn name(&self) -> &str;
    fn unit_of_measurement(&self) -> &'static str;
    fn icon(&self) -> &str;
    fn state(&self) -> SensorValue;

    fn extra_state_attributes(&self) -> Option<serde_json::Value> {
        None
    }

    /// Polled sensors are updated on the host's schedule, the others only
    /// when another sensor refreshes them.
    fn should_poll(&self) -> bool {
        true
    }

    fn snapshot(&self) -> SensorUpdate {
        SensorUpdate {
            entity_id: self.entity_id().to_string(),
            name: self.name().to_string(),
            unit_of_measurement: self.unit_of_measurement(),
            icon: self.icon().to_string(),
            state: self.state(),
            attributes: self.extra_state_attributes(),
        }
    }
}

/// Builds `sensor.autarco[_<kind>]_<device_id>`.
pub fn entity_id(kind: Option<&str>, device_id: &str) -> String {
    match kind {
        Some(kind) => format!("sensor.{DOMAIN}_{kind}_{device_id}"),
        None => format!("sensor.{DOMAIN}_{device_id}"),
    }
}
