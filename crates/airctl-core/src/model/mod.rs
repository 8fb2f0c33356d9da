// ── Domain model ──
//
// Canonical types the engine works on. Raw service records are converted
// into these at the boundary (see `convert` and `normalize`); nothing
// untyped travels past that point.

pub mod control;
pub mod device;

// ── Re-exports ──────────────────────────────────────────────────────

pub use control::{
    Accent, ControlState, DEFAULT_TEMPERATURE, FanSpeed, Mode, TEMPERATURE_MAX, TEMPERATURE_MIN,
    clamp_temperature,
};
pub use device::{DeviceCommand, DeviceStatus, Home, SelectionContext};
