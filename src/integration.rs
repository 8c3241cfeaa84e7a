use crate::config::InverterConfig;
use crate::dependent_sensors::{EnergyTotalSensor, TemperatureSensor};
use crate::device_context::DeviceContext;
use crate::error::{ConfigError, FetchError};
use crate::power_sensor::PowerSensor;
use crate::sensor::{Sensor, SensorUpdate};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc::Sender;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

#[derive(Debug, Error)]
pub enum SetupError {
    #[error("entry {0} is already set up")]
    DuplicateEntry(String),

    #[error("entry {0} is not set up")]
    UnknownEntry(String),

    #[error("entry {0} is already running")]
    AlreadyRunning(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Client(#[from] FetchError),
}

/// One configured inverter: its shared context and three sensors.
pub struct DeviceEntry {
    context: Arc<DeviceContext>,
    power: Option<PowerSensor>,
    temperature: Arc<TemperatureSensor>,
    energy_total: Arc<EnergyTotalSensor>,
    task: Option<JoinHandle<()>>,
}

impl DeviceEntry {
    pub fn context(&self) -> &Arc<DeviceContext> {
        &self.context
    }

    pub fn temperature(&self) -> &Arc<TemperatureSensor> {
        &self.temperature
    }

    pub fn energy_total(&self) -> &Arc<EnergyTotalSensor> {
        &self.energy_total
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

/// Keeps the configured inverters, keyed by configuration entry id, and
/// drives their power sensors.
#[derive(Default)]
pub struct InverterIntegration {
    entries: HashMap<String, DeviceEntry>,
}

impl InverterIntegration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the context and sensors for a new entry. The dependent
    /// sensors are built first so the power sensor's first poll reaches them.
    pub fn setup_entry(
        &mut self,
        entry_id: &str,
        config: InverterConfig,
        publisher: Option<Sender<SensorUpdate>>,
    ) -> Result<&DeviceEntry, SetupError> {
        if self.entries.contains_key(entry_id) {
            return Err(SetupError::DuplicateEntry(entry_id.to_string()));
        }
        config.validate()?;

        tracing::info!(entry_id, host = %config.host, name = %config.name, "Setting up Autarco inverter");

        let context = Arc::new(DeviceContext::new(entry_id, config, publisher));
        let temperature = TemperatureSensor::new(context.clone());
        let energy_total = EnergyTotalSensor::new(context.clone());
        let power = PowerSensor::new(context.clone())?;

        let entry = self
            .entries
            .entry(entry_id.to_string())
            .or_insert(DeviceEntry {
                context,
                power: Some(power),
                temperature,
                energy_total,
                task: None,
            });
        Ok(&*entry)
    }

    /// Starts the update loop of an entry. The first update runs right away,
    /// later ones every `scan_interval`. One task per entry means at most one
    /// poll in flight per inverter.
    pub fn start_entry(&mut self, entry_id: &str, scan_interval: Duration) -> Result<(), SetupError> {
        let entry = self
            .entries
            .get_mut(entry_id)
            .ok_or_else(|| SetupError::UnknownEntry(entry_id.to_string()))?;
        let power = entry
            .power
            .take()
            .ok_or_else(|| SetupError::AlreadyRunning(entry_id.to_string()))?;

        entry.task = Some(tokio::spawn(run_updates(power, entry.context.clone(), scan_interval)));
        Ok(())
    }

    /// Stops the update loop and drops the entry's context and sensors.
    pub fn remove_entry(&mut self, entry_id: &str) -> bool {
        match self.entries.remove(entry_id) {
            Some(entry) => {
                if let Some(task) = entry.task {
                    task.abort();
                }
                tracing::info!(entry_id, "Removed Autarco inverter");
                true
            }
            None => false,
        }
    }

    pub fn entry(&self, entry_id: &str) -> Option<&DeviceEntry> {
        self.entries.get(entry_id)
    }

    pub fn entry_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.entries.keys().cloned().collect();
        ids.sort();
        ids
    }
}

async fn run_updates(mut power: PowerSensor, context: Arc<DeviceContext>, scan_interval: Duration) {
    let mut ticker = interval(scan_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let outcome = power.update().await;
        tracing::trace!(entry_id = %context.entry_id(), ?outcome, "Update cycle finished");
        context.publish(power.snapshot());
    }
}
