use crate::config::InverterConfig;
use crate::sensor::SensorUpdate;
use parking_lot::RwLock;
use std::sync::Weak;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::Sender;

/// A sensor whose value is derived from another sensor's poll.
pub trait DependentSensor: Send + Sync {
    /// Re-reads the shared values and republishes. Must not fail.
    fn refresh(&self);
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct SharedValues {
    temperature: Option<f64>,
    energy_total_kwh: Option<f64>,
}

/// Per-entry context shared by the three sensors of one inverter.
///
/// The power sensor is the only writer. The two dependent sensors hold an
/// `Arc` to the context and register a `Weak` back-reference here so the
/// writer can refresh them right after storing new values.
pub struct DeviceContext {
    entry_id: String,
    config: InverterConfig,
    values: RwLock<SharedValues>,
    temperature_sensor: RwLock<Option<Weak<dyn DependentSensor>>>,
    energy_total_sensor: RwLock<Option<Weak<dyn DependentSensor>>>,
    publisher: Option<Sender<SensorUpdate>>,
}

impl DeviceContext {
    pub fn new(
        entry_id: impl Into<String>,
        config: InverterConfig,
        publisher: Option<Sender<SensorUpdate>>,
    ) -> Self {
        Self {
            entry_id: entry_id.into(),
            config,
            values: RwLock::new(SharedValues::default()),
            temperature_sensor: RwLock::new(None),
            energy_total_sensor: RwLock::new(None),
            publisher,
        }
    }

    pub fn entry_id(&self) -> &str {
        &self.entry_id
    }

    pub fn config(&self) -> &InverterConfig {
        &self.config
    }

    pub fn store(&self, temperature: f64, energy_total_kwh: f64) {
        let mut values = self.values.write();
        values.temperature = Some(temperature);
        values.energy_total_kwh = Some(energy_total_kwh);
    }

    /// Latest inverter temperature, `None` until the first successful poll.
    pub fn temperature(&self) -> Option<f64> {
        self.values.read().temperature
    }

    /// Latest lifetime energy counter, `None` until the first successful poll.
    pub fn energy_total_kwh(&self) -> Option<f64> {
        self.values.read().energy_total_kwh
    }

    pub fn register_temperature_sensor(&self, sensor: Weak<dyn DependentSensor>) {
        *self.temperature_sensor.write() = Some(sensor);
    }

    pub fn register_energy_total_sensor(&self, sensor: Weak<dyn DependentSensor>) {
        *self.energy_total_sensor.write() = Some(sensor);
    }

    /// Refreshes the temperature sensor, then the energy sensor.
    pub fn refresh_dependents(&self) {
        for slot in [&self.temperature_sensor, &self.energy_total_sensor] {
            // Upgrade under the lock, refresh outside of it
            let sensor = slot.read().as_ref().and_then(Weak::upgrade);
            match sensor {
                Some(sensor) => sensor.refresh(),
                None => tracing::debug!(entry_id = %self.entry_id, "Dependent sensor not registered"),
            }
        }
    }

    /// Hands a state write to the host. Dropped with a debug message if the
    /// host is not listening or is behind.
    pub fn publish(&self, update: SensorUpdate) {
        let Some(publisher) = &self.publisher else {
            return;
        };
        match publisher.try_send(update) {
            Ok(()) => {}
            Err(TrySendError::Full(update)) => {
                tracing::debug!(entity_id = %update.entity_id, "Publish queue full, dropping update");
            }
            Err(TrySendError::Closed(update)) => {
                tracing::debug!(entity_id = %update.entity_id, "Publisher closed, dropping update");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::SensorValue;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    struct RecordingSensor {
        label: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    impl DependentSensor for RecordingSensor {
        fn refresh(&self) {
            self.log.lock().push(self.label);
        }
    }

    fn context() -> DeviceContext {
        DeviceContext::new("entry-1", InverterConfig::new("192.168.1.50"), None)
    }

    #[test]
    fn test_values_unset_until_stored() {
        let ctx = context();
        assert_eq!(ctx.temperature(), None);
        assert_eq!(ctx.energy_total_kwh(), None);

        ctx.store(21.5, 1520.4);
        assert_eq!(ctx.temperature(), Some(21.5));
        assert_eq!(ctx.energy_total_kwh(), Some(1520.4));
        assert_eq!(ctx.entry_id(), "entry-1");
    }

    #[test]
    fn test_refresh_order() {
        let ctx = context();
        let log = Arc::new(Mutex::new(Vec::new()));
        let energy: Arc<dyn DependentSensor> = Arc::new(RecordingSensor {
            label: "energy",
            log: log.clone(),
        });
        let temp: Arc<dyn DependentSensor> = Arc::new(RecordingSensor {
            label: "temp",
            log: log.clone(),
        });

        // Registration order does not change refresh order
        ctx.register_energy_total_sensor(Arc::downgrade(&energy));
        ctx.register_temperature_sensor(Arc::downgrade(&temp));

        ctx.refresh_dependents();
        ctx.refresh_dependents();
        assert_eq!(*log.lock(), vec!["temp", "energy", "temp", "energy"]);
    }

    #[test]
    fn test_dropped_sensor_is_skipped() {
        let ctx = context();
        let log = Arc::new(Mutex::new(Vec::new()));
        let temp: Arc<dyn DependentSensor> = Arc::new(RecordingSensor {
            label: "temp",
            log: log.clone(),
        });
        ctx.register_temperature_sensor(Arc::downgrade(&temp));
        drop(temp);

        ctx.refresh_dependents();
        assert!(log.lock().is_empty());
    }

    #[tokio::test]
    async fn test_publish() {
        let (tx, mut rx) = mpsc::channel(4);
        let ctx = DeviceContext::new("entry-1", InverterConfig::new("192.168.1.50"), Some(tx));
        let update = SensorUpdate {
            entity_id: "sensor.autarco_50".to_string(),
            name: "autarco".to_string(),
            unit_of_measurement: "W",
            icon: "mdi:weather-sunny".to_string(),
            state: SensorValue::Integer(12),
            attributes: None,
        };
        ctx.publish(update.clone());
        assert_eq!(rx.recv().await, Some(update));
    }

    #[test]
    fn test_publish_without_listener() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let ctx = DeviceContext::new("entry-1", InverterConfig::new("192.168.1.50"), Some(tx));
        // Must not panic
        ctx.publish(SensorUpdate {
            entity_id: "sensor.autarco_50".to_string(),
            name: "autarco".to_string(),
            unit_of_measurement: "W",
            icon: String::new(),
            state: SensorValue::Unknown,
            attributes: None,
        });
    }
}
