use crate::response_parser::PollResult;
use chrono::{DateTime, Local};
use serde_derive::Serialize;
use std::time::Duration;

const PLACEHOLDER: &str = "loading";
const OFFLINE_ALERT: &str = "offline";

/// Everything the power sensor knows about its inverter between polls.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceState {
    pub firmware_version: String,
    pub inverter_model: String,
    pub serial_number: String,
    pub instant_power_watts: i64,
    /// Highest power seen since the sensor was created.
    pub max_power_watts: i64,
    pub energy_today_kwh: f64,
    pub alerts: String,
    pub last_updated: Option<DateTime<Local>>,
    pub next_poll_at: Option<DateTime<Local>>,
}

impl Default for DeviceState {
    fn default() -> Self {
        Self {
            firmware_version: PLACEHOLDER.to_string(),
            inverter_model: PLACEHOLDER.to_string(),
            serial_number: PLACEHOLDER.to_string(),
            instant_power_watts: 0,
            max_power_watts: 0,
            energy_today_kwh: 0.0,
            alerts: PLACEHOLDER.to_string(),
            last_updated: None,
            next_poll_at: None,
        }
    }
}

impl DeviceState {
    /// Whether an update call at `now` should reach the inverter.
    pub fn poll_due(&self, now: DateTime<Local>) -> bool {
        match self.next_poll_at {
            None => true,
            Some(next) => now >= next,
        }
    }

    pub fn apply_reading(&mut self, reading: &PollResult, now: DateTime<Local>, interval: Duration) {
        self.last_updated = Some(now);
        // An interval beyond the calendar range leaves the next poll due
        self.next_poll_at = chrono::Duration::from_std(interval)
            .ok()
            .and_then(|interval| now.checked_add_signed(interval));

        self.firmware_version = reading.firmware_version.clone();
        self.inverter_model = reading.inverter_model.clone();
        self.serial_number = reading.serial_number.clone();
        self.energy_today_kwh = reading.energy_today_kwh;
        self.alerts = reading.alerts.clone();
        self.instant_power_watts = reading.instant_power_watts;
        self.max_power_watts = self.max_power_watts.max(reading.instant_power_watts);
    }

    /// The inverter answered without data, which it does at night. The daily
    /// counter is cleared once the date has moved on since the last reading.
    pub fn apply_offline(&mut self, now: DateTime<Local>) {
        self.instant_power_watts = 0;
        if let Some(last) = self.last_updated {
            if now.date_naive() != last.date_naive() {
                self.energy_today_kwh = 0.0;
            }
        }
        self.alerts = OFFLINE_ALERT.to_string();
    }

    pub fn attributes(&self) -> DeviceAttributes {
        DeviceAttributes {
            firmware_version: self.firmware_version.clone(),
            inverter_model: self.inverter_model.clone(),
            serial_number: self.serial_number.clone(),
            kwh_today: self.energy_today_kwh,
            max_power: self.max_power_watts,
            alerts: self.alerts.clone(),
            last_updated: self.last_updated,
            reload_at: self.next_poll_at,
        }
    }
}

/// Extra state attributes published alongside the power reading.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceAttributes {
    pub firmware_version: String,
    pub inverter_model: String,
    pub serial_number: String,
    pub kwh_today: f64,
    pub max_power: i64,
    pub alerts: String,
    pub last_updated: Option<DateTime<Local>>,
    pub reload_at: Option<DateTime<Local>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32, hour: u32, minute: u32, second: u32) -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2024, 6, day, hour, minute, second)
            .unwrap()
    }

    fn reading(power: i64, kwh_today: f64) -> PollResult {
        PollResult {
            serial_number: "1234567890123456".to_string(),
            firmware_version: "FW1.2".to_string(),
            inverter_model: "ModelX".to_string(),
            temperature: 21.5,
            instant_power_watts: power,
            energy_today_kwh: kwh_today,
            energy_total_kwh: 1520.4,
            alerts: "none".to_string(),
        }
    }

    const INTERVAL: Duration = Duration::from_secs(20);

    #[test]
    fn test_initial_state() {
        let state = DeviceState::default();
        assert_eq!(state.firmware_version, "loading");
        assert_eq!(state.serial_number, "loading");
        assert_eq!(state.instant_power_watts, 0);
        assert!(state.next_poll_at.is_none());
        assert!(state.poll_due(at(1, 12, 0, 0)));
    }

    #[test]
    fn test_apply_reading_schedules_next_poll() {
        let mut state = DeviceState::default();
        let now = at(1, 12, 0, 0);
        state.apply_reading(&reading(306, 3.2), now, INTERVAL);

        assert_eq!(state.last_updated, Some(now));
        assert_eq!(state.next_poll_at, Some(at(1, 12, 0, 20)));
        assert_eq!(state.instant_power_watts, 306);
        assert_eq!(state.energy_today_kwh, 3.2);
        assert_eq!(state.inverter_model, "ModelX");

        assert!(!state.poll_due(at(1, 12, 0, 19)));
        assert!(state.poll_due(at(1, 12, 0, 20)));
        assert!(state.poll_due(at(1, 12, 1, 0)));
    }

    #[test]
    fn test_apply_reading_with_out_of_range_interval() {
        let mut state = DeviceState::default();
        let now = at(1, 12, 0, 0);
        state.apply_reading(&reading(306, 3.2), now, Duration::from_secs(u64::MAX));

        assert_eq!(state.last_updated, Some(now));
        assert_eq!(state.instant_power_watts, 306);
        assert!(state.next_poll_at.is_none());
        assert!(state.poll_due(at(1, 12, 0, 1)));
    }

    #[test]
    fn test_max_power_is_a_watermark() {
        let mut state = DeviceState::default();
        let powers = [120, 850, 400, 850, 0, 910, 30];
        let mut previous = 0;
        for (i, power) in powers.iter().enumerate() {
            state.apply_reading(&reading(*power, 1.0), at(1, 12, i as u32, 0), INTERVAL);
            assert!(state.max_power_watts >= previous);
            previous = state.max_power_watts;
        }
        assert_eq!(state.max_power_watts, 910);
        assert_eq!(state.instant_power_watts, 30);
    }

    #[test]
    fn test_offline_zeroes_power_same_day() {
        let mut state = DeviceState::default();
        state.apply_reading(&reading(500, 4.5), at(1, 18, 0, 0), INTERVAL);

        state.apply_offline(at(1, 22, 0, 0));
        assert_eq!(state.instant_power_watts, 0);
        assert_eq!(state.energy_today_kwh, 4.5);
        assert_eq!(state.alerts, "offline");
        assert_eq!(state.max_power_watts, 500);
    }

    #[test]
    fn test_offline_next_day_resets_daily_energy() {
        let mut state = DeviceState::default();
        state.apply_reading(&reading(500, 4.5), at(1, 18, 0, 0), INTERVAL);

        state.apply_offline(at(2, 5, 0, 0));
        assert_eq!(state.energy_today_kwh, 0.0);
        assert_eq!(state.instant_power_watts, 0);
    }

    #[test]
    fn test_offline_does_not_reschedule() {
        let mut state = DeviceState::default();
        state.apply_reading(&reading(500, 4.5), at(1, 18, 0, 0), INTERVAL);
        state.apply_offline(at(1, 18, 0, 30));

        assert_eq!(state.last_updated, Some(at(1, 18, 0, 0)));
        assert_eq!(state.next_poll_at, Some(at(1, 18, 0, 20)));
    }

    #[test]
    fn test_offline_before_first_reading() {
        let mut state = DeviceState::default();
        state.apply_offline(at(1, 3, 0, 0));
        assert_eq!(state.instant_power_watts, 0);
        assert_eq!(state.energy_today_kwh, 0.0);
        assert_eq!(state.alerts, "offline");
        assert!(state.poll_due(at(1, 3, 0, 1)));
    }

    #[test]
    fn test_attributes_serialise() {
        let mut state = DeviceState::default();
        state.apply_reading(&reading(306, 3.2), at(1, 12, 0, 0), INTERVAL);

        let value = serde_json::to_value(state.attributes()).unwrap();
        assert_eq!(value["firmware_version"], "FW1.2");
        assert_eq!(value["serial_number"], "1234567890123456");
        assert_eq!(value["kwh_today"], 3.2);
        assert_eq!(value["max_power"], 306);
        assert_eq!(value["alerts"], "none");
        assert!(value["last_updated"].is_string());
        assert!(value["reload_at"].is_string());
    }
}
