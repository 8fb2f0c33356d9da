// ── Device status normalization ──
//
// Total mapping from a raw status record to a `ControlState` plus the
// ambient reading. Unknown codes fall back to `Auto`; a missing or
// non-finite target falls back to the caller's temperature.

use crate::model::{ControlState, DeviceStatus, FanSpeed, Mode, clamp_temperature};

/// Result of [`normalize`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalized {
    pub control: ControlState,
    /// Ambient temperature rounded to one decimal; `None` when the sensor
    /// reported nothing.
    pub ambient: Option<f64>,
}

pub fn normalize(raw: &DeviceStatus, fallback_temperature: i32) -> Normalized {
    let mode = Mode::from_code(raw.mode_id);
    let fan_speed = FanSpeed::from_code(raw.fan_speed);

    let target = raw
        .target_temperature
        .filter(|t| t.is_finite())
        .map_or_else(
            || clamp_temperature(f64::from(fallback_temperature)),
            clamp_temperature,
        );

    Normalized {
        control: ControlState::new(target, mode, fan_speed),
        ambient: raw.temperature.and_then(round_reading),
    }
}

/// Round a sensor reading to one decimal place.
pub fn round_reading(value: f64) -> Option<f64> {
    value.is_finite().then(|| (value * 10.0).round() / 10.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{TEMPERATURE_MAX, TEMPERATURE_MIN};

    fn raw(
        mode_id: Option<i64>,
        fan: Option<i64>,
        target: Option<f64>,
        ambient: Option<f64>,
    ) -> DeviceStatus {
        DeviceStatus {
            device_id: 1,
            device_name: "Living".into(),
            model: None,
            serial_number: None,
            temperature: ambient,
            target_temperature: target,
            fan_speed: fan,
            mode_id,
        }
    }

    #[test]
    fn cool_medium_device_normalizes_as_reported() {
        let n = normalize(&raw(Some(1), Some(2), Some(23.0), Some(25.4)), 24);
        assert_eq!(n.control, ControlState::new(23, Mode::Cool, FanSpeed::Medium));
        assert!(n.control.power_on());
        assert_eq!(n.ambient, Some(25.4));
    }

    #[test]
    fn missing_codes_default_to_auto() {
        let n = normalize(&raw(None, Some(9), None, None), 21);
        assert_eq!(n.control.mode(), Mode::Auto);
        assert_eq!(n.control.fan_speed(), FanSpeed::Auto);
        assert_eq!(n.control.temperature(), 21);
        assert_eq!(n.ambient, None);
    }

    #[test]
    fn target_is_rounded_and_clamped() {
        assert_eq!(
            normalize(&raw(Some(2), None, Some(35.2), None), 24)
                .control
                .temperature(),
            TEMPERATURE_MAX
        );
        assert_eq!(
            normalize(&raw(Some(2), None, Some(19.6), None), 24)
                .control
                .temperature(),
            20
        );
        // Fallback is clamped as well.
        assert_eq!(
            normalize(&raw(Some(2), None, None, None), 3)
                .control
                .temperature(),
            TEMPERATURE_MIN
        );
    }

    #[test]
    fn off_mode_is_unpowered() {
        let n = normalize(&raw(Some(0), Some(3), Some(24.0), Some(19.96)), 24);
        assert!(!n.control.power_on());
        assert_eq!(n.ambient, Some(20.0));
    }

    #[test]
    fn zero_ambient_is_a_reading_not_missing() {
        let n = normalize(&raw(Some(1), None, None, Some(0.0)), 24);
        assert_eq!(n.ambient, Some(0.0));
    }

    #[test]
    fn normalization_is_idempotent() {
        let input = raw(Some(3), Some(1), Some(17.5), Some(22.25));
        assert_eq!(normalize(&input, 26), normalize(&input, 26));
    }
}
