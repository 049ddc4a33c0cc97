//! Linux sysfs GPIO board (`/sys/class/gpio`).
//!
//! Pins are addressed by their kernel GPIO number. Inputs are read as
//! plain 0/1 levels.

use std::fs;
use std::path::PathBuf;

use super::gpio::Board;
use crate::error::DeviceError;

pub struct SysfsBoard {
    root: PathBuf,
}

impl SysfsBoard {
    /// Export `outputs` and `inputs` (if not already exported) and set
    /// their direction.
    pub fn open(
        root: impl Into<PathBuf>,
        outputs: &[&str],
        inputs: &[&str],
    ) -> Result<Self, DeviceError> {
        let board = Self { root: root.into() };
        for pin in outputs {
            board.export(pin, "out")?;
        }
        for pin in inputs {
            board.export(pin, "in")?;
        }
        Ok(board)
    }

    fn pin_dir(&self, pin: &str) -> PathBuf {
        self.root.join(format!("gpio{pin}"))
    }

    fn export(&self, pin: &str, direction: &str) -> Result<(), DeviceError> {
        if pin.is_empty() || !pin.chars().all(|c| c.is_ascii_digit()) {
            return Err(DeviceError::InvalidValue {
                pin: pin.to_string(),
                value: "sysfs pins must be GPIO numbers".to_string(),
            });
        }

        let dir = self.pin_dir(pin);
        if !dir.exists() {
            tracing::debug!(%pin, "exporting gpio");
            fs::write(self.root.join("export"), pin).map_err(|source| DeviceError::Output {
                pin: pin.to_string(),
                source,
            })?;
            if !dir.exists() {
                return Err(DeviceError::Unavailable(format!(
                    "gpio{pin} did not appear under {} after export",
                    self.root.display()
                )));
            }
        }

        fs::write(dir.join("direction"), direction).map_err(|source| DeviceError::Output {
            pin: pin.to_string(),
            source,
        })
    }
}

impl Board for SysfsBoard {
    fn set_output(&self, pin: &str, high: bool) -> Result<(), DeviceError> {
        let value = if high { "1" } else { "0" };
        fs::write(self.pin_dir(pin).join("value"), value).map_err(|source| DeviceError::Output {
            pin: pin.to_string(),
            source,
        })
    }

    fn read_input(&self, pin: &str) -> Result<i64, DeviceError> {
        let raw = fs::read_to_string(self.pin_dir(pin).join("value")).map_err(|source| {
            DeviceError::Input {
                pin: pin.to_string(),
                source,
            }
        })?;
        raw.trim().parse::<i64>().map_err(|_| DeviceError::InvalidValue {
            pin: pin.to_string(),
            value: raw.trim().to_string(),
        })
    }
}
