mod config;

pub use config::{CalendarSection, Config, DeviceKind, DeviceSection, SchedulerSection};

use std::path::PathBuf;

use crate::error::ConfigError;

/// Overrides the data directory, mainly for tests and boards with a
/// read-only home.
pub const CONFIG_DIR_ENV: &str = "MEETING_REMINDER_CONFIG_DIR";

/// Returns `~/.config/meeting-reminder/`, or `$MEETING_REMINDER_CONFIG_DIR`
/// when set. The directory is created if missing.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os(CONFIG_DIR_ENV) {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => dirs::home_dir()
            .ok_or(ConfigError::NoConfigDir)?
            .join(".config")
            .join("meeting-reminder"),
    };

    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::SaveFailed {
        path: dir.clone(),
        message: e.to_string(),
    })?;
    Ok(dir)
}
