// ── API-to-domain type conversions ──
//
// Bridges raw `airctl_api` wire types into `airctl_core::model` types and
// back for outgoing commands.

use airctl_api::{DeviceStatusDto, FanSetting, HomeSummary, ModeSetting, UpdateModePayload};

use crate::model::{DeviceCommand, DeviceStatus, FanSpeed, Home, Mode};

// ── Helpers ────────────────────────────────────────────────────────

fn non_blank(raw: Option<&String>) -> Option<&str> {
    raw.map(|s| s.trim()).filter(|s| !s.is_empty())
}

/// Description, else name, else `Home <id>`.
pub fn home_display_name(home: &HomeSummary) -> String {
    non_blank(home.description.as_ref())
        .or_else(|| non_blank(home.name.as_ref()))
        .map_or_else(|| format!("Home {}", home.home_id), str::to_owned)
}

// ── Inbound ────────────────────────────────────────────────────────

impl From<HomeSummary> for Home {
    fn from(home: HomeSummary) -> Self {
        Self {
            id: home.home_id,
            display_name: home_display_name(&home),
        }
    }
}

impl From<DeviceStatusDto> for DeviceStatus {
    fn from(dto: DeviceStatusDto) -> Self {
        Self {
            device_id: dto.device_id,
            device_name: dto.device_name,
            model: dto.model,
            serial_number: dto.serial_number,
            temperature: dto.temperature,
            target_temperature: dto.target_temperature,
            fan_speed: dto.fan_speed,
            mode_id: dto.mode_id,
        }
    }
}

// ── Outbound ───────────────────────────────────────────────────────

impl From<Mode> for ModeSetting {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Off => Self::Off,
            Mode::Cool => Self::Cool,
            Mode::Heat => Self::Heat,
            Mode::Dry => Self::Dry,
            Mode::Fan => Self::FanOnly,
            Mode::Auto => Self::Auto,
        }
    }
}

impl From<FanSpeed> for FanSetting {
    fn from(fan: FanSpeed) -> Self {
        match fan {
            FanSpeed::Auto => Self::Auto,
            FanSpeed::Low => Self::Low,
            FanSpeed::Medium => Self::Mid,
            FanSpeed::High => Self::High,
        }
    }
}

impl From<&DeviceCommand> for UpdateModePayload {
    fn from(cmd: &DeviceCommand) -> Self {
        Self {
            mode: cmd.mode.into(),
            target_temperature: cmd.target_temperature,
            fan: Some(cmd.fan_speed.into()),
            flags: None,
            home_id: cmd.home_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(name: Option<&str>, description: Option<&str>) -> HomeSummary {
        HomeSummary {
            home_id: 42,
            name: name.map(String::from),
            description: description.map(String::from),
            extra: serde_json::Map::new(),
        }
    }

    #[test]
    fn home_name_prefers_trimmed_description() {
        assert_eq!(
            home_display_name(&summary(Some("Casa"), Some("  Beach  "))),
            "Beach"
        );
        assert_eq!(home_display_name(&summary(Some(" Casa "), Some("   "))), "Casa");
        assert_eq!(home_display_name(&summary(None, None)), "Home 42");
    }

    #[test]
    fn command_maps_to_wire_values() {
        let payload = UpdateModePayload::from(&DeviceCommand {
            home_id: 3,
            mode: Mode::Fan,
            fan_speed: FanSpeed::Medium,
            target_temperature: 22,
        });
        assert_eq!(payload.mode, ModeSetting::FanOnly);
        assert_eq!(payload.fan, Some(FanSetting::Mid));
        assert_eq!(payload.home_id, 3);
        assert_eq!(payload.flags, None);
    }
}
