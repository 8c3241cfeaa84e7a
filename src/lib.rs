//! Autarco Inverter Monitor Library
//!
//! Polls an Autarco solar inverter over its local HTTP status page and
//! exposes three sensors per inverter: instantaneous power (polled),
//! temperature and lifetime energy (both refreshed by the power sensor).

pub mod config;
pub mod dependent_sensors;
pub mod device_context;
pub mod device_state;
pub mod error;
pub mod integration;
pub mod inverter_client;
pub mod power_sensor;
pub mod response_parser;
pub mod sensor;

// Re-export commonly used types for easier access
pub use config::InverterConfig;
pub use dependent_sensors::{EnergyTotalSensor, TemperatureSensor};
pub use device_context::{DependentSensor, DeviceContext};
pub use integration::InverterIntegration;
pub use power_sensor::{CycleOutcome, PowerSensor};
pub use sensor::{Sensor, SensorUpdate, SensorValue};
