//! TOML-based application configuration.
//!
//! Stores:
//! - Scheduler cadence, lead time and alert duration
//! - Which calendar to watch and where OAuth tokens live
//! - Alert device wiring
//!
//! Configuration is stored at `~/.config/meeting-reminder/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration as StdDuration;

use super::data_dir;
use crate::device::{GpioPins, GpioTiming};
use crate::error::ConfigError;
use crate::event::ReminderMode;
use crate::integrations::{TokenStore, TokenStoreKind};
use crate::scheduler::SchedulerConfig;

/// Scheduler timing. Seconds are signed so that a negative value in the
/// file is reported instead of failing to parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerSection {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: i64,
    #[serde(default = "default_lead_time")]
    pub lead_time_secs: i64,
    #[serde(default = "default_notification_duration")]
    pub notification_duration_secs: i64,
    #[serde(default)]
    pub mode: ReminderMode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarSection {
    #[serde(default = "default_calendar_id")]
    pub calendar_id: String,
    /// Free-text filter, e.g. only events mentioning "robot".
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default = "default_horizon")]
    pub horizon_minutes: i64,
    #[serde(default)]
    pub token_store: TokenStoreKind,
    /// Google client-secret JSON; the keyring is used when unset.
    #[serde(default)]
    pub credentials_file: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    /// Log only.
    #[default]
    None,
    /// Linux sysfs GPIO.
    Sysfs,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSection {
    #[serde(default)]
    pub kind: DeviceKind,
    #[serde(default = "default_led_pin")]
    pub led_pin: String,
    #[serde(default = "default_buzzer_pin")]
    pub buzzer_pin: String,
    #[serde(default = "default_button_pin")]
    pub button_pin: String,
    #[serde(default = "default_blink_interval")]
    pub blink_interval_ms: u64,
    #[serde(default = "default_input_poll")]
    pub input_poll_ms: u64,
    #[serde(default = "default_edge_threshold")]
    pub edge_threshold: i64,
    #[serde(default = "default_gpio_root")]
    pub gpio_root: String,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/meeting-reminder/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scheduler: SchedulerSection,
    #[serde(default)]
    pub calendar: CalendarSection,
    #[serde(default)]
    pub device: DeviceSection,
}

// Default functions
fn default_poll_interval() -> i64 {
    5
}
fn default_lead_time() -> i64 {
    120
}
fn default_notification_duration() -> i64 {
    30
}
fn default_calendar_id() -> String {
    "primary".into()
}
fn default_horizon() -> i64 {
    60
}
fn default_led_pin() -> String {
    "17".into()
}
fn default_buzzer_pin() -> String {
    "27".into()
}
fn default_button_pin() -> String {
    "22".into()
}
fn default_blink_interval() -> u64 {
    250
}
fn default_input_poll() -> u64 {
    25
}
fn default_edge_threshold() -> i64 {
    0
}
fn default_gpio_root() -> String {
    "/sys/class/gpio".into()
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            lead_time_secs: default_lead_time(),
            notification_duration_secs: default_notification_duration(),
            mode: ReminderMode::default(),
        }
    }
}

impl Default for CalendarSection {
    fn default() -> Self {
        Self {
            calendar_id: default_calendar_id(),
            query: None,
            horizon_minutes: default_horizon(),
            token_store: TokenStoreKind::default(),
            credentials_file: None,
        }
    }
}

impl Default for DeviceSection {
    fn default() -> Self {
        Self {
            kind: DeviceKind::default(),
            led_pin: default_led_pin(),
            buzzer_pin: default_buzzer_pin(),
            button_pin: default_button_pin(),
            blink_interval_ms: default_blink_interval(),
            input_poll_ms: default_input_poll(),
            edge_threshold: default_edge_threshold(),
            gpio_root: default_gpio_root(),
        }
    }
}

impl SchedulerSection {
    /// Convert and validate. Errors name the offending config key.
    pub fn to_scheduler_config(&self) -> Result<SchedulerConfig, ConfigError> {
        let config = SchedulerConfig {
            poll_interval: chrono::Duration::seconds(self.poll_interval_secs),
            lead_time: chrono::Duration::seconds(self.lead_time_secs),
            notification_duration: chrono::Duration::seconds(self.notification_duration_secs),
            mode: self.mode,
        };
        config.validate().map_err(|err| match err {
            ConfigError::InvalidValue { key, message } => ConfigError::InvalidValue {
                key: format!("scheduler.{key}_secs"),
                message,
            },
            other => other,
        })?;
        Ok(config)
    }
}

impl CalendarSection {
    pub fn horizon(&self) -> Result<chrono::Duration, ConfigError> {
        if self.horizon_minutes <= 0 {
            return Err(ConfigError::InvalidValue {
                key: "calendar.horizon_minutes".to_string(),
                message: format!("must be positive, got {}", self.horizon_minutes),
            });
        }
        Ok(chrono::Duration::minutes(self.horizon_minutes))
    }

    /// Token store rooted in `dir` when the file backend is selected.
    pub fn token_store(&self, dir: &Path) -> TokenStore {
        match self.token_store {
            TokenStoreKind::Keyring => TokenStore::Keyring,
            TokenStoreKind::File => TokenStore::file(dir),
        }
    }

    pub fn credentials_path(&self) -> Option<PathBuf> {
        self.credentials_file
            .as_deref()
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
    }
}

impl DeviceSection {
    pub fn pins(&self) -> GpioPins {
        GpioPins {
            led: self.led_pin.clone(),
            buzzer: self.buzzer_pin.clone(),
            button: self.button_pin.clone(),
        }
    }

    /// Pattern and button timing. Zero periods and a negative threshold
    /// are rejected.
    pub fn timing(&self) -> Result<GpioTiming, ConfigError> {
        let positive = |key: &str, ms: u64| {
            if ms == 0 {
                return Err(ConfigError::InvalidValue {
                    key: format!("device.{key}"),
                    message: "must be positive, got 0".to_string(),
                });
            }
            Ok(StdDuration::from_millis(ms))
        };
        if self.edge_threshold < 0 {
            return Err(ConfigError::InvalidValue {
                key: "device.edge_threshold".to_string(),
                message: format!("must not be negative, got {}", self.edge_threshold),
            });
        }
        Ok(GpioTiming {
            blink_interval: positive("blink_interval_ms", self.blink_interval_ms)?,
            input_poll: positive("input_poll_ms", self.input_poll_ms)?,
            edge_threshold: self.edge_threshold,
        })
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_some() {
                current = current.get_mut(part).ok_or_else(unknown)?;
                continue;
            }

            let obj = current.as_object_mut().ok_or_else(unknown)?;
            let existing = obj.get(part).ok_or_else(unknown)?;

            let new_value = match existing {
                serde_json::Value::Bool(_) => serde_json::Value::Bool(
                    value
                        .parse::<bool>()
                        .map_err(|_| invalid(format!("cannot parse '{value}' as bool")))?,
                ),
                serde_json::Value::Number(_) => value
                    .parse::<i64>()
                    .map(|n| serde_json::Value::Number(n.into()))
                    .map_err(|_| invalid(format!("cannot parse '{value}' as integer")))?,
                // unset optional: empty string clears it
                serde_json::Value::Null if value.is_empty() => serde_json::Value::Null,
                serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                    return Err(invalid("cannot set a whole section".to_string()))
                }
                _ => serde_json::Value::String(value.into()),
            };

            obj.insert(part.to_string(), new_value);
            return Ok(());
        }

        Err(unknown())
    }

    /// `config.toml` in the data directory.
    pub fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the data directory, writing defaults on first use.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(err) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: err.to_string(),
            }),
        }
    }

    /// Persist to the data directory.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| save_failed(e.to_string()))?;
        }
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Null => Some(String::new()),
            other => Some(other.to_string()),
        }
    }

    /// Set a value by dot-separated key. The change is in memory only;
    /// call [`Config::save`] to persist it.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json =
            serde_json::to_value(&*self).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        *self = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Ok(())
    }

    /// Render as TOML, as written to disk.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ParseFailed(e.to_string()))
    }
}
