use crate::device_context::{DependentSensor, DeviceContext};
use crate::sensor::{entity_id, Sensor, SensorValue};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};

/// Inverter temperature, filled in by the power sensor's poll.
pub struct TemperatureSensor {
    inner: StoreReader,
}

/// Lifetime energy counter, filled in by the power sensor's poll.
pub struct EnergyTotalSensor {
    inner: StoreReader,
}

struct StoreReader {
    context: Arc<DeviceContext>,
    entity_id: String,
    name: String,
    state: Mutex<SensorValue>,
}

impl StoreReader {
    fn new(context: Arc<DeviceContext>, kind: &str) -> Self {
        let config = context.config();
        Self {
            entity_id: entity_id(Some(kind), &config.device_id()),
            name: format!("{}_{kind}", config.name),
            context,
            state: Mutex::new(SensorValue::Unknown),
        }
    }

    fn adopt(&self, value: Option<f64>, label: &str) -> bool {
        match value {
            Some(value) => {
                *self.state.lock() = SensorValue::Float(value);
                true
            }
            None => {
                tracing::debug!(entity_id = %self.entity_id, "{label} sensor update failed, no value stored yet");
                false
            }
        }
    }
}

impl TemperatureSensor {
    /// Creates the sensor and registers it with the context.
    pub fn new(context: Arc<DeviceContext>) -> Arc<Self> {
        let sensor = Arc::new(Self {
            inner: StoreReader::new(context, "temp"),
        });
        let weak: Weak<TemperatureSensor> = Arc::downgrade(&sensor);
        sensor.inner.context.register_temperature_sensor(weak);
        sensor
    }
}

impl EnergyTotalSensor {
    /// Creates the sensor and registers it with the context.
    pub fn new(context: Arc<DeviceContext>) -> Arc<Self> {
        let sensor = Arc::new(Self {
            inner: StoreReader::new(context, "kwh_total"),
        });
        let weak: Weak<EnergyTotalSensor> = Arc::downgrade(&sensor);
        sensor.inner.context.register_energy_total_sensor(weak);
        sensor
    }
}

impl DependentSensor for TemperatureSensor {
    fn refresh(&self) {
        if self.inner.adopt(self.inner.context.temperature(), "temp") {
            self.inner.context.publish(self.snapshot());
        }
    }
}

impl DependentSensor for EnergyTotalSensor {
    fn refresh(&self) {
        if self.inner.adopt(self.inner.context.energy_total_kwh(), "kwh") {
            self.inner.context.publish(self.snapshot());
        }
    }
}

impl Sensor for TemperatureSensor {
    fn entity_id(&self) -> &str {
        &self.inner.entity_id
    }

    fn name(&self) -> &str {
        &self.inner.name
    }

    fn unit_of_measurement(&self) -> &'static str {
        "°C"
    }

    fn icon(&self) -> &str {
        &self.inner.context.config().icon
    }

    fn state(&self) -> SensorValue {
        *self.inner.state.lock()
    }

    fn should_poll(&self) -> bool {
        false
    }
}

impl Sensor for EnergyTotalSensor {
    fn entity_id(&self) -> &str {
        &self.inner.entity_id
    }

    fn name(&self) -> &str {
        &self.inner.name
    }

    fn unit_of_measurement(&self) -> &'static str {
        "kWh"
    }

    fn icon(&self) -> &str {
        &self.inner.context.config().icon
    }

    fn state(&self) -> SensorValue {
        *self.inner.state.lock()
    }

    fn should_poll(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InverterConfig;
    use tokio::sync::mpsc;

    fn context() -> Arc<DeviceContext> {
        let config = InverterConfig::new("192.168.1.50").with_name("roof");
        Arc::new(DeviceContext::new("entry-1", config, None))
    }

    #[test]
    fn test_identity() {
        let ctx = context();
        let temp = TemperatureSensor::new(ctx.clone());
        let energy = EnergyTotalSensor::new(ctx);

        assert_eq!(temp.entity_id(), "sensor.autarco_temp_50");
        assert_eq!(temp.name(), "roof_temp");
        assert_eq!(temp.unit_of_measurement(), "°C");
        assert!(!temp.should_poll());

        assert_eq!(energy.entity_id(), "sensor.autarco_kwh_total_50");
        assert_eq!(energy.name(), "roof_kwh_total");
        assert_eq!(energy.unit_of_measurement(), "kWh");
        assert_eq!(energy.icon(), "mdi:weather-sunny");
        assert!(!energy.should_poll());
    }

    #[test]
    fn test_refresh_before_first_poll_keeps_value() {
        let ctx = context();
        let temp = TemperatureSensor::new(ctx.clone());
        let energy = EnergyTotalSensor::new(ctx.clone());

        ctx.refresh_dependents();
        assert_eq!(temp.state(), SensorValue::Unknown);
        assert_eq!(energy.state(), SensorValue::Unknown);
    }

    #[test]
    fn test_refresh_adopts_stored_values() {
        let ctx = context();
        let temp = TemperatureSensor::new(ctx.clone());
        let energy = EnergyTotalSensor::new(ctx.clone());

        ctx.store(21.5, 1520.4);
        // Nothing changes until the writer triggers a refresh
        assert_eq!(temp.state(), SensorValue::Unknown);

        ctx.refresh_dependents();
        assert_eq!(temp.state(), SensorValue::Float(21.5));
        assert_eq!(energy.state(), SensorValue::Float(1520.4));

        ctx.store(23.0, 1521.0);
        ctx.refresh_dependents();
        assert_eq!(temp.state(), SensorValue::Float(23.0));
        assert_eq!(energy.state(), SensorValue::Float(1521.0));
    }

    #[tokio::test]
    async fn test_refresh_publishes_in_order() {
        let (tx, mut rx) = mpsc::channel(8);
        let ctx = Arc::new(DeviceContext::new(
            "entry-1",
            InverterConfig::new("192.168.1.50"),
            Some(tx),
        ));
        let _energy = EnergyTotalSensor::new(ctx.clone());
        let _temp = TemperatureSensor::new(ctx.clone());

        ctx.store(30.0, 99.5);
        ctx.refresh_dependents();

        let first = rx.recv().await.unwrap();
        assert_eq!(first.entity_id, "sensor.autarco_temp_50");
        assert_eq!(first.state, SensorValue::Float(30.0));
        let second = rx.recv().await.unwrap();
        assert_eq!(second.entity_id, "sensor.autarco_kwh_total_50");
        assert_eq!(second.state, SensorValue::Float(99.5));
        assert!(rx.try_recv().is_err());
    }
}
