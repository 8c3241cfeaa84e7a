use crate::device_context::DeviceContext;
use crate::device_state::DeviceState;
use crate::error::{report_error, FetchError, UpdateError};
use crate::inverter_client::InverterClient;
use crate::response_parser::{self, ParsedResponse};
use crate::sensor::{entity_id, Sensor, SensorValue};
use chrono::{DateTime, Local};
use std::sync::Arc;

/// Result of one update call on the power sensor.
#[derive(Debug)]
pub enum CycleOutcome {
    /// The poll interval has not elapsed, cached state was kept.
    Skipped,
    /// A full reading was stored and the dependent sensors refreshed.
    Updated,
    /// The inverter answered without data.
    Offline,
    /// The inverter could not be reached. State is unchanged.
    Unavailable(FetchError),
    /// The cycle failed and the sensor now shows the error marker.
    Failed(UpdateError),
}

/// The polled sensor: instantaneous AC power in watts.
///
/// Owns the inverter client and the device state, and is the only writer of
/// the shared [`DeviceContext`] values.
pub struct PowerSensor {
    context: Arc<DeviceContext>,
    client: InverterClient,
    device: DeviceState,
    entity_id: String,
    state: SensorValue,
    attributes: Option<serde_json::Value>,
}

impl PowerSensor {
    pub fn new(context: Arc<DeviceContext>) -> Result<Self, FetchError> {
        let config = context.config();
        let client = InverterClient::new(config)?;
        let entity_id = entity_id(None, &config.device_id());

        tracing::debug!(
            name = %config.name,
            url = %client.endpoint_url(),
            icon = %config.icon,
            "Autarco sensor configured"
        );

        Ok(Self {
            context,
            client,
            device: DeviceState::default(),
            entity_id,
            state: SensorValue::Unknown,
            attributes: None,
        })
    }

    pub fn device_state(&self) -> &DeviceState {
        &self.device
    }

    pub async fn update(&mut self) -> CycleOutcome {
        self.update_at(Local::now()).await
    }

    /// Runs one update cycle as if called at `now`.
    ///
    /// The inverter is only contacted on the first call and once the poll
    /// interval has elapsed since the last successful reading. No failure
    /// escapes this method.
    pub async fn update_at(&mut self, now: DateTime<Local>) -> CycleOutcome {
        let outcome = if self.device.poll_due(now) {
            self.poll(now).await
        } else {
            CycleOutcome::Skipped
        };

        match &outcome {
            CycleOutcome::Failed(err) => {
                self.state = SensorValue::Error;
                report_error("updating the power sensor", err);
            }
            _ => {
                self.state = SensorValue::Integer(self.device.instant_power_watts);
                self.attributes = serde_json::to_value(self.device.attributes()).ok();
            }
        }

        outcome
    }

    async fn poll(&mut self, now: DateTime<Local>) -> CycleOutcome {
        let body = match self.client.fetch().await {
            Ok(body) => body,
            Err(err) if err.is_timeout() => {
                tracing::debug!(entity_id = %self.entity_id, "Inverter poll timed out");
                return CycleOutcome::Unavailable(err);
            }
            Err(err) => {
                report_error("polling the inverter", &err);
                return CycleOutcome::Unavailable(err);
            }
        };

        // Parse fully before touching any state
        let parsed = match response_parser::parse(&body) {
            Ok(parsed) => parsed,
            Err(err) => return CycleOutcome::Failed(err.into()),
        };

        match parsed {
            ParsedResponse::Reading(reading) => {
                let interval = self.context.config().interval;
                self.device.apply_reading(&reading, now, interval);

                // Only a complete reading reaches the dependent sensors
                self.context
                    .store(reading.temperature, reading.energy_total_kwh);
                self.context.refresh_dependents();

                tracing::debug!(
                    entity_id = %self.entity_id,
                    power = reading.instant_power_watts,
                    temperature = reading.temperature,
                    "Inverter reading stored"
                );
                CycleOutcome::Updated
            }
            ParsedResponse::Offline => {
                self.device.apply_offline(now);
                tracing::debug!(entity_id = %self.entity_id, "Inverter offline");
                CycleOutcome::Offline
            }
        }
    }
}

impl Sensor for PowerSensor {
    fn entity_id(&self) -> &str {
        &self.entity_id
    }

    fn name(&self) -> &str {
        &self.context.config().name
    }

    fn unit_of_measurement(&self) -> &'static str {
        "W"
    }

    fn icon(&self) -> &str {
        &self.context.config().icon
    }

    fn state(&self) -> SensorValue {
        self.state
    }

    fn extra_state_attributes(&self) -> Option<serde_json::Value> {
        self.attributes.clone()
    }
}
