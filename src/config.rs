//! Configuration of a monitored inverter: defaults, environment variables
//! and stored configuration entries.

use crate::error::ConfigError;
use serde_derive::Deserialize;
use std::env;
use std::time::Duration;

pub const DOMAIN: &str = "autarco";
pub const ISSUE_URL: &str = "https://github.com/koljawindeler/autarco/issues";

/// How often the host asks polled entities to update. The per-device
/// interval decides whether such a call actually reaches the inverter.
pub const SCAN_INTERVAL: Duration = Duration::from_secs(5);

pub const DEFAULT_NAME: &str = "autarco";
pub const DEFAULT_ICON: &str = "mdi:weather-sunny";
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(20);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);
/// Longest accepted poll interval.
pub const MAX_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);
// Factory credentials of the inverter's web interface
pub const DEFAULT_USERNAME: &str = "admin";
pub const DEFAULT_PASSWORD: &str = "123456789";

/// Settings for one configured inverter.
#[derive(Debug, Clone, PartialEq)]
pub struct InverterConfig {
    pub name: String,
    pub host: String,
    pub icon: String,
    pub interval: Duration,
    pub username: String,
    pub password: String,
    pub timeout: Duration,
}

impl InverterConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            host: host.into(),
            icon: DEFAULT_ICON.to_string(),
            interval: DEFAULT_INTERVAL,
            username: DEFAULT_USERNAME.to_string(),
            password: DEFAULT_PASSWORD.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = icon.into();
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Loads the configuration from `AUTARCO_*` environment variables.
    /// Only `AUTARCO_HOST` is required.
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = env::var("AUTARCO_HOST").unwrap_or_default();
        let mut config = Self::new(host.trim());

        if let Some(name) = non_empty_var("AUTARCO_NAME") {
            config.name = name;
        }
        if let Some(icon) = non_empty_var("AUTARCO_ICON") {
            config.icon = icon;
        }
        if let Some(interval) = non_empty_var("AUTARCO_INTERVAL") {
            config.interval = parse_interval(&interval)?;
        }
        if let Some(username) = non_empty_var("AUTARCO_USERNAME") {
            config.username = username;
        }
        if let Some(password) = non_empty_var("AUTARCO_PASSWORD") {
            config.password = password;
        }
        if let Some(timeout) = non_empty_var("AUTARCO_TIMEOUT_MS") {
            let millis: u64 = timeout
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidTimeout(timeout.clone()))?;
            config.timeout = Duration::from_millis(millis);
        }

        config.validate()?;
        Ok(config)
    }

    /// Builds the configuration from a stored configuration entry, as
    /// written by the setup form or YAML platform config.
    pub fn from_entry_data(data: &serde_json::Value) -> Result<Self, ConfigError> {
        let entry: EntryData = serde_json::from_value(data.clone())?;

        let mut config = Self::new(entry.url.trim());
        if let Some(name) = entry.name {
            config.name = name;
        }
        if let Some(icon) = entry.icon {
            config.icon = icon;
        }
        match entry.interval {
            Some(IntervalField::Seconds(seconds)) => {
                config.interval = Duration::from_secs(seconds);
            }
            Some(IntervalField::Text(text)) => {
                config.interval = parse_interval(&text)?;
            }
            None => {}
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.is_empty() {
            return Err(ConfigError::MissingHost);
        }
        if self.interval.is_zero() || self.interval > MAX_INTERVAL {
            return Err(ConfigError::InvalidInterval(format!(
                "{}s",
                self.interval.as_secs()
            )));
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout("0ms".to_string()));
        }
        Ok(())
    }

    /// The device endpoint queried on every poll.
    pub fn endpoint_url(&self) -> String {
        format!("http://{}/inverter.cgi", self.host)
    }

    /// Short identifier used in entity ids: the last dot-separated part of
    /// the host, usually the final octet of the device's IP address.
    pub fn device_id(&self) -> String {
        let tail = self.host.rsplit('.').next().unwrap_or_default();
        tail.chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_lowercase()
                } else {
                    '_'
                }
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct EntryData {
    url: String,
    name: Option<String>,
    icon: Option<String>,
    interval: Option<IntervalField>,
}

// The setup form stores its default interval as text
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum IntervalField {
    Seconds(u64),
    Text(String),
}

fn parse_interval(value: &str) -> Result<Duration, ConfigError> {
    let seconds: u64 = value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidInterval(value.to_string()))?;
    let interval = Duration::from_secs(seconds);
    if interval.is_zero() || interval > MAX_INTERVAL {
        return Err(ConfigError::InvalidInterval(value.to_string()));
    }
    Ok(interval)
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}
