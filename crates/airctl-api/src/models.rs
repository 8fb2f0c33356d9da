// Wire types for the device-control service.
//
// Field names follow the service's JSON exactly (`HomeID`, `deviceId`,
// `modeId`, ...). Every nullable field is optional so partially-populated
// records from older firmware still deserialize.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ── Homes ────────────────────────────────────────────────────────────

/// A home as listed by `GET /homes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HomeSummary {
    #[serde(rename = "HomeID")]
    pub home_id: i64,

    #[serde(rename = "Name", default)]
    pub name: Option<String>,

    #[serde(rename = "Description", default)]
    pub description: Option<String>,

    /// All remaining fields the service sends.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct HomesResponse {
    #[serde(default)]
    pub homes: Option<Vec<HomeSummary>>,
}

// ── Devices ──────────────────────────────────────────────────────────

/// Raw device status record (`GET /homes/{id}/devices[/{id}]` and the
/// `device` field of `device-update` events).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatusDto {
    pub device_id: i64,
    #[serde(default)]
    pub device_name: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub serial_number: Option<String>,
    /// Ambient temperature reported by the unit's sensor.
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub target_temperature: Option<f64>,
    #[serde(default)]
    pub fan_speed: Option<i64>,
    #[serde(default)]
    pub mode_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DevicesResponse {
    #[serde(default)]
    pub devices: Option<BTreeMap<String, DeviceStatusDto>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DeviceResponse {
    #[serde(default)]
    pub device: Option<DeviceStatusDto>,
}

// ── Commands ─────────────────────────────────────────────────────────

/// Mode values accepted by `POST /devices/{id}/mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeSetting {
    Off,
    Cool,
    Heat,
    Dry,
    FanOnly,
    Auto,
}

/// Fan values accepted by `POST /devices/{id}/mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FanSetting {
    Auto,
    Low,
    Mid,
    High,
}

/// Body of `POST /devices/{id}/mode`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateModePayload {
    pub mode: ModeSetting,
    pub target_temperature: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fan: Option<FanSetting>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flags: Option<u32>,
    pub home_id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UpdateModeResponse {
    #[serde(default)]
    pub job_id: Option<String>,
    #[serde(default)]
    pub position: Option<u32>,
}

/// Queue acknowledgement for an accepted command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandReceipt {
    /// Correlation id echoed back on the matching push event.
    pub job_id: String,
    /// Position in the service's per-device command queue.
    pub position: u32,
}

// ── Auth ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginResponse {
    pub user: AuthUser,
    /// Bearer token handed to desktop clients that cannot hold cookies.
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MeResponse {
    pub user: AuthUser,
}

/// Error body shape shared by every endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn device_status_tolerates_nulls_and_missing_fields() {
        let json = r#"{
            "deviceId": 7,
            "deviceName": "Living",
            "temperature": null,
            "modeId": 254
        }"#;
        let dto: DeviceStatusDto = serde_json::from_str(json).unwrap();
        assert_eq!(dto.device_id, 7);
        assert_eq!(dto.temperature, None);
        assert_eq!(dto.target_temperature, None);
        assert_eq!(dto.mode_id, Some(254));
        assert_eq!(dto.fan_speed, None);
    }

    #[test]
    fn home_summary_keeps_unknown_fields() {
        let json = r#"{ "HomeID": 3, "Name": "Casa", "Timezone": "UTC-3" }"#;
        let home: HomeSummary = serde_json::from_str(json).unwrap();
        assert_eq!(home.home_id, 3);
        assert_eq!(home.name.as_deref(), Some("Casa"));
        assert_eq!(home.extra["Timezone"], "UTC-3");
    }

    #[test]
    fn update_payload_uses_wire_names() {
        let payload = UpdateModePayload {
            mode: ModeSetting::FanOnly,
            target_temperature: 24,
            fan: Some(FanSetting::Mid),
            flags: None,
            home_id: 12,
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "mode": "fan_only",
                "targetTemperature": 24,
                "fan": "mid",
                "homeId": 12
            })
        );
    }
}
