// ── Control domain types ──

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

pub const TEMPERATURE_MIN: i32 = 16;
pub const TEMPERATURE_MAX: i32 = 30;
pub const DEFAULT_TEMPERATURE: i32 = 24;

/// Round to the nearest degree and clamp into `[16, 30]`.
///
/// Non-finite input yields [`DEFAULT_TEMPERATURE`].
#[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
pub fn clamp_temperature(value: f64) -> i32 {
    if !value.is_finite() {
        return DEFAULT_TEMPERATURE;
    }
    let min = f64::from(TEMPERATURE_MIN);
    let max = f64::from(TEMPERATURE_MAX);
    // In range after the clamp, so the cast is exact.
    value.round().clamp(min, max) as i32
}

// ── Mode ────────────────────────────────────────────────────────────

/// Operating mode of an AC unit.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Mode {
    Cool,
    Heat,
    Dry,
    #[strum(to_string = "fan", serialize = "fan_only")]
    Fan,
    Auto,
    Off,
}

impl Mode {
    /// Map a device mode code. Unknown or missing codes read as `Auto`.
    pub fn from_code(code: Option<i64>) -> Self {
        match code {
            Some(0) => Self::Off,
            Some(1) => Self::Cool,
            Some(2) => Self::Heat,
            Some(3) => Self::Dry,
            Some(4) => Self::Fan,
            _ => Self::Auto,
        }
    }

    pub fn code(self) -> i64 {
        match self {
            Self::Off => 0,
            Self::Cool => 1,
            Self::Heat => 2,
            Self::Dry => 3,
            Self::Fan => 4,
            Self::Auto => 254,
        }
    }

    pub fn supports_target_temperature(self) -> bool {
        matches!(self, Self::Auto | Self::Cool | Self::Heat)
    }

    pub fn supports_fan_control(self) -> bool {
        matches!(self, Self::Auto | Self::Cool | Self::Heat | Self::Fan)
    }

    pub fn accent(self) -> Accent {
        match self {
            Self::Cool => Accent::new(43, 139, 255),
            Self::Heat => Accent::new(255, 120, 71),
            Self::Dry => Accent::new(255, 192, 105),
            Self::Fan => Accent::new(90, 164, 255),
            Self::Auto => Accent::new(60, 184, 120),
            Self::Off => Accent::new(84, 101, 128),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Cool => "Cool",
            Self::Heat => "Heat",
            Self::Dry => "Dry",
            Self::Fan => "Fan",
            Self::Auto => "Auto",
            Self::Off => "Off",
        }
    }
}

// ── FanSpeed ────────────────────────────────────────────────────────

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum FanSpeed {
    Auto,
    Low,
    #[strum(to_string = "medium", serialize = "mid")]
    Medium,
    High,
}

impl FanSpeed {
    /// Map a device fan code. Unknown or missing codes read as `Auto`.
    pub fn from_code(code: Option<i64>) -> Self {
        match code {
            Some(1) => Self::Low,
            Some(2) => Self::Medium,
            Some(3) => Self::High,
            _ => Self::Auto,
        }
    }

    pub fn code(self) -> i64 {
        match self {
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
            Self::Auto => 254,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Auto => "Auto",
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }
}

// ── ControlState ────────────────────────────────────────────────────

/// Mode, fan, target temperature and power of one unit.
///
/// `power_on` always equals `mode != Off` and the temperature is always
/// inside `[16, 30]`: the only ways to build or change a state go through
/// the constructors below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlState {
    temperature: i32,
    mode: Mode,
    fan_speed: FanSpeed,
    power_on: bool,
}

impl ControlState {
    pub fn new(temperature: i32, mode: Mode, fan_speed: FanSpeed) -> Self {
        Self {
            temperature: temperature.clamp(TEMPERATURE_MIN, TEMPERATURE_MAX),
            mode,
            fan_speed,
            power_on: mode != Mode::Off,
        }
    }

    pub fn temperature(self) -> i32 {
        self.temperature
    }

    pub fn mode(self) -> Mode {
        self.mode
    }

    pub fn fan_speed(self) -> FanSpeed {
        self.fan_speed
    }

    pub fn power_on(self) -> bool {
        self.power_on
    }

    /// Mode the unit effectively runs in (`Off` when unpowered).
    pub fn effective_mode(self) -> Mode {
        if self.power_on { self.mode } else { Mode::Off }
    }

    #[must_use]
    pub fn with_mode(self, mode: Mode) -> Self {
        Self::new(self.temperature, mode, self.fan_speed)
    }

    #[must_use]
    pub fn with_fan_speed(self, fan_speed: FanSpeed) -> Self {
        Self::new(self.temperature, self.mode, fan_speed)
    }

    #[must_use]
    pub fn with_temperature(self, temperature: i32) -> Self {
        Self::new(temperature, self.mode, self.fan_speed)
    }
}

// ── Accent ──────────────────────────────────────────────────────────

/// RGB accent colour associated with a mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Accent {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Accent {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl fmt::Display for Accent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}, {}", self.r, self.g, self.b)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn clamp_rounds_then_bounds() {
        assert_eq!(clamp_temperature(22.5), 23);
        assert_eq!(clamp_temperature(22.4), 22);
        assert_eq!(clamp_temperature(-40.0), TEMPERATURE_MIN);
        assert_eq!(clamp_temperature(99.9), TEMPERATURE_MAX);
        assert_eq!(clamp_temperature(f64::NAN), DEFAULT_TEMPERATURE);
    }

    #[test]
    fn mode_codes_round_trip_and_default_to_auto() {
        for mode in Mode::iter() {
            assert_eq!(Mode::from_code(Some(mode.code())), mode);
        }
        assert_eq!(Mode::from_code(Some(7)), Mode::Auto);
        assert_eq!(Mode::from_code(None), Mode::Auto);
        assert_eq!(FanSpeed::from_code(Some(0)), FanSpeed::Auto);
        assert_eq!(FanSpeed::from_code(Some(2)), FanSpeed::Medium);
    }

    #[test]
    fn mode_parses_cli_aliases() {
        assert_eq!(Mode::from_str("fan_only").unwrap(), Mode::Fan);
        assert_eq!(Mode::from_str("FAN").unwrap(), Mode::Fan);
        assert_eq!(FanSpeed::from_str("mid").unwrap(), FanSpeed::Medium);
        assert_eq!(Mode::Fan.to_string(), "fan");
        assert_eq!(FanSpeed::Medium.to_string(), "medium");
    }

    #[test]
    fn capabilities() {
        let with_target: Vec<_> = Mode::iter()
            .filter(|m| m.supports_target_temperature())
            .collect();
        assert_eq!(with_target, vec![Mode::Cool, Mode::Heat, Mode::Auto]);
        assert!(Mode::Fan.supports_fan_control());
        assert!(!Mode::Dry.supports_fan_control());
        assert!(!Mode::Off.supports_fan_control());
    }

    #[test]
    fn power_follows_mode_on_every_constructor() {
        for temperature in [-5, 16, 24, 30, 45] {
            for mode in Mode::iter() {
                let state = ControlState::new(temperature, mode, FanSpeed::Auto);
                assert_eq!(state.power_on(), mode != Mode::Off);
                assert!((TEMPERATURE_MIN..=TEMPERATURE_MAX).contains(&state.temperature()));
                let toggled = state.with_mode(Mode::Off).with_mode(mode);
                assert_eq!(toggled.power_on(), mode != Mode::Off);
            }
        }
    }

    #[test]
    fn accent_formats_as_rgb_triplet() {
        assert_eq!(Mode::Cool.accent().to_string(), "43, 139, 255");
        assert_eq!(Mode::Off.accent(), Accent::new(84, 101, 128));
    }
}
