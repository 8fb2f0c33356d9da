// ── Device, home and selection types ──

use serde::{Deserialize, Serialize};

use super::control::{FanSpeed, Mode};

/// Raw status of one unit as reported by the service.
///
/// Codes and readings stay as reported; [`crate::normalize`] turns them
/// into a [`ControlState`](super::ControlState).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatus {
    pub device_id: i64,
    pub device_name: String,
    pub model: Option<String>,
    pub serial_number: Option<String>,
    /// Ambient reading; `None` when the sensor is unavailable.
    pub temperature: Option<f64>,
    pub target_temperature: Option<f64>,
    pub fan_speed: Option<i64>,
    pub mode_id: Option<i64>,
}

impl DeviceStatus {
    pub fn mode(&self) -> Mode {
        Mode::from_code(self.mode_id)
    }

    pub fn fan(&self) -> FanSpeed {
        FanSpeed::from_code(self.fan_speed)
    }

    pub fn is_off(&self) -> bool {
        self.mode() == Mode::Off
    }
}

/// A home grouping several units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Home {
    pub id: i64,
    pub display_name: String,
}

/// The persisted `{homeId, deviceId}` record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionContext {
    pub home_id: Option<i64>,
    pub device_id: Option<i64>,
}

impl SelectionContext {
    pub fn new(home_id: Option<i64>, device_id: Option<i64>) -> Self {
        Self { home_id, device_id }
    }
}

/// A full mode/fan/temperature command for one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceCommand {
    pub home_id: i64,
    pub mode: Mode,
    pub fan_speed: FanSpeed,
    pub target_temperature: i32,
}
