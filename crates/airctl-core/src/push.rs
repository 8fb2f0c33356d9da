// ── Push event decoding ──
//
// Turns raw server-sent events into typed engine inputs. Unknown event
// names decode to `None`; payloads that don't parse are reported as
// `MalformedPushPayload` so the caller can log and drop them.

use serde::Deserialize;

use airctl_api::{DeviceStatusDto, RawEvent};

use crate::error::CoreError;
use crate::model::DeviceStatus;

pub const DEVICE_UPDATE_EVENT: &str = "device-update";
pub const COMMAND_ERROR_EVENT: &str = "command-error";

/// Fresh status for one unit, optionally confirming a command.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceUpdate {
    pub job_id: Option<String>,
    pub home_id: i64,
    pub device_id: i64,
    pub device: DeviceStatus,
}

/// A queued command that the service failed to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFailure {
    pub job_id: Option<String>,
    pub home_id: i64,
    pub device_id: i64,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    DeviceUpdate(DeviceUpdate),
    CommandError(CommandFailure),
}

// ── Wire shapes ─────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeviceUpdatePayload {
    #[serde(default)]
    job_id: Option<String>,
    home_id: i64,
    device_id: i64,
    device: DeviceStatusDto,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommandErrorPayload {
    #[serde(default)]
    job_id: Option<String>,
    home_id: i64,
    device_id: i64,
    #[serde(default)]
    message: Option<String>,
}

fn job_id(raw: Option<String>) -> Option<String> {
    raw.filter(|id| !id.is_empty())
}

fn malformed(event: &str, reason: &impl std::fmt::Display) -> CoreError {
    CoreError::MalformedPushPayload {
        event: event.to_owned(),
        reason: reason.to_string(),
    }
}

/// Decode one raw event. `Ok(None)` means the event isn't one we handle.
pub fn decode(raw: &RawEvent) -> Result<Option<PushEvent>, CoreError> {
    match raw.event.as_str() {
        DEVICE_UPDATE_EVENT => {
            let payload: DeviceUpdatePayload = serde_json::from_str(&raw.data)
                .map_err(|e| malformed(DEVICE_UPDATE_EVENT, &e))?;
            if payload.device.device_id != payload.device_id {
                return Err(malformed(
                    DEVICE_UPDATE_EVENT,
                    &format!(
                        "device {} reported under device id {}",
                        payload.device.device_id, payload.device_id
                    ),
                ));
            }
            Ok(Some(PushEvent::DeviceUpdate(DeviceUpdate {
                job_id: job_id(payload.job_id),
                home_id: payload.home_id,
                device_id: payload.device_id,
                device: payload.device.into(),
            })))
        }
        COMMAND_ERROR_EVENT => {
            let payload: CommandErrorPayload = serde_json::from_str(&raw.data)
                .map_err(|e| malformed(COMMAND_ERROR_EVENT, &e))?;
            Ok(Some(PushEvent::CommandError(CommandFailure {
                job_id: job_id(payload.job_id),
                home_id: payload.home_id,
                device_id: payload.device_id,
                message: payload
                    .message
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| "The device rejected the command".into()),
            })))
        }
        _ => Ok(None),
    }
}
