// ── Panel view ──
//
// Read-only snapshot derived from the engine after every input. Nothing
// here is stored state: every field is a projection.

use serde::Serialize;

use crate::engine::{Engine, FetchStatus};
use crate::model::{Accent, ControlState, DeviceStatus, FanSpeed, Home, Mode};
use crate::normalize::round_reading;

const STABLE_BAND: f64 = 0.2;

/// Everything a presentation layer needs to render the control panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
#[allow(clippy::struct_excessive_bools)]
pub struct PanelView {
    pub homes: Vec<Home>,
    pub devices: Vec<DeviceStatus>,
    pub selected_home: Option<Home>,
    pub selected_device: Option<DeviceStatus>,
    pub selected_home_id: Option<i64>,
    pub selected_device_id: Option<i64>,

    pub control: Option<ControlState>,
    pub baseline: Option<ControlState>,
    pub live_temperature: Option<f64>,
    pub pending_commands: usize,

    pub actual_mode: Mode,
    pub actual_power_on: bool,
    pub actual_fan_speed: FanSpeed,
    pub actual_target_temperature: i32,
    pub preview_mode: Mode,
    pub temperature_control_visible: bool,
    pub fan_control_visible: bool,

    pub accent: Accent,
    pub mode_preview_accent: Accent,
    pub confirm_accent: Accent,

    pub temperature_trend: String,
    pub current_temperature_label: String,
    pub target_temperature_label: String,

    pub has_pending_changes: bool,
    pub controls_disabled: bool,
    pub is_submitting: bool,
    pub is_fetching_homes: bool,
    pub is_fetching_devices: bool,
    pub fetch_status: FetchStatus,
    pub session_expired: bool,
    pub error_message: Option<String>,
    pub status_message: Option<String>,
}

impl Default for PanelView {
    fn default() -> Self {
        Engine::default().view()
    }
}

impl PanelView {
    /// Nothing is loading and the selected device (if any) has a state,
    /// or loading ended in an error or an expired session.
    pub fn is_settled(&self) -> bool {
        if self.session_expired {
            return true;
        }
        if self.is_fetching_homes || self.is_fetching_devices {
            return false;
        }
        self.selected_device_id.is_none() || self.control.is_some() || self.error_message.is_some()
    }
}

impl Engine {
    /// Project the current state into a [`PanelView`].
    pub fn view(&self) -> PanelView {
        let control = self.control();
        let baseline = self.baseline();

        let actual_mode = baseline.map_or(Mode::Auto, ControlState::mode);
        let actual_power_on = self.actual_power_on();
        let preview_mode = control.map_or(actual_mode, ControlState::mode);
        let temperature_control_visible = preview_mode.supports_target_temperature();
        let accent = actual_mode.accent();

        PanelView {
            homes: self.homes().to_vec(),
            devices: self.devices().to_vec(),
            selected_home: self.selected_home().cloned(),
            selected_device: self.selected_device().cloned(),
            selected_home_id: self.selected_home_id(),
            selected_device_id: self.selected_device_id(),

            control,
            baseline,
            live_temperature: self.telemetry(),
            pending_commands: self.pending().len(),

            actual_mode,
            actual_power_on,
            actual_fan_speed: baseline.map_or(FanSpeed::Auto, ControlState::fan_speed),
            actual_target_temperature: self.actual_target_temperature(),
            preview_mode,
            temperature_control_visible,
            fan_control_visible: preview_mode.supports_fan_control(),

            accent,
            mode_preview_accent: preview_mode.accent(),
            confirm_accent: confirm_accent(control, baseline, accent),

            temperature_trend: temperature_trend(baseline, self.telemetry()),
            current_temperature_label: temperature_label(self.telemetry()),
            target_temperature_label: target_label(control, temperature_control_visible),

            has_pending_changes: self.has_pending_changes(),
            controls_disabled: control.is_none() || self.is_submitting(),
            is_submitting: self.is_submitting(),
            is_fetching_homes: self.is_loading_homes(),
            is_fetching_devices: self.is_loading_devices(),
            fetch_status: self.fetch_status(),
            session_expired: self.session_expired(),
            error_message: self.error_message().map(str::to_owned),
            status_message: self.status_message().map(str::to_owned),
        }
    }
}

// ── Projections ─────────────────────────────────────────────────────

/// Accent of the staged power/mode when it differs from what's running.
pub fn confirm_accent(
    control: Option<ControlState>,
    baseline: Option<ControlState>,
    fallback: Accent,
) -> Accent {
    match (control, baseline) {
        (Some(control), Some(baseline))
            if control != baseline && control.effective_mode() != baseline.effective_mode() =>
        {
            control.effective_mode().accent()
        }
        _ => fallback,
    }
}

/// Human summary of where the room is heading.
pub fn temperature_trend(baseline: Option<ControlState>, ambient: Option<f64>) -> String {
    let Some(baseline) = baseline else {
        return "Select a device".into();
    };
    if baseline.effective_mode() == Mode::Off {
        return "Off".into();
    }
    let Some(ambient) = ambient else {
        return "Sensor unavailable".into();
    };

    let diff = round_reading(f64::from(baseline.temperature()) - ambient).unwrap_or(0.0);
    if diff.abs() < STABLE_BAND {
        "Temperature stable".into()
    } else if diff > 0.0 {
        format!("Heating {diff:.1}°")
    } else {
        format!("Cooling {:.1}°", diff.abs())
    }
}

pub fn temperature_label(reading: Option<f64>) -> String {
    reading.map_or_else(|| "--".into(), |t| format!("{t}°C"))
}

pub fn target_label(control: Option<ControlState>, visible: bool) -> String {
    match control {
        Some(control) if visible => format!("{:02}", control.temperature()),
        _ => "--".into(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::engine::Effect;
    use crate::model::SelectionContext;
    use pretty_assertions::assert_eq;

    fn state(temperature: i32, mode: Mode) -> ControlState {
        ControlState::new(temperature, mode, FanSpeed::Auto)
    }

    fn engine_with(mode_id: i64, target: Option<f64>, ambient: Option<f64>) -> Engine {
        let mut engine = Engine::new(Some(SelectionContext::new(Some(1), Some(5))));
        engine.start();
        let effects = engine.homes_loaded(Ok(vec![Home {
            id: 1,
            display_name: "Casa".into(),
        }]));
        let Some(Effect::LoadDevices(request)) = effects.last().cloned() else {
            panic!("expected a device list request");
        };
        engine.devices_loaded(
            request,
            Ok(vec![DeviceStatus {
                device_id: 5,
                device_name: "Living".into(),
                model: Some("BGH".into()),
                serial_number: None,
                temperature: ambient,
                target_temperature: target,
                fan_speed: Some(2),
                mode_id: Some(mode_id),
            }]),
        );
        engine
    }

    #[test]
    fn settles_once_the_selected_device_has_state() {
        let mut engine = Engine::new(Some(SelectionContext::new(Some(1), Some(5))));
        engine.start();
        assert!(!engine.view().is_settled());

        engine.homes_loaded(Ok(vec![Home {
            id: 1,
            display_name: "Casa".into(),
        }]));
        assert!(!engine.view().is_settled());

        let engine = engine_with(1, Some(24.0), Some(22.0));
        let view = engine.view();
        assert_eq!(view.selected_device_id, Some(5));
        assert!(view.control.is_some());
        assert!(view.is_settled());
    }

    #[test]
    fn empty_engine_projects_placeholders() {
        let view = PanelView::default();
        assert_eq!(view.actual_mode, Mode::Auto);
        assert!(!view.actual_power_on);
        assert_eq!(view.actual_target_temperature, 24);
        assert_eq!(view.temperature_trend, "Select a device");
        assert_eq!(view.current_temperature_label, "--");
        assert_eq!(view.target_temperature_label, "--");
        assert!(view.controls_disabled);
        assert!(!view.has_pending_changes);
    }

    #[test]
    fn selected_device_projection() {
        let view = engine_with(1, Some(23.0), Some(25.4)).view();
        assert_eq!(view.actual_mode, Mode::Cool);
        assert!(view.actual_power_on);
        assert_eq!(view.actual_fan_speed, FanSpeed::Medium);
        assert_eq!(view.actual_target_temperature, 23);
        assert_eq!(view.accent, Accent::new(43, 139, 255));
        assert_eq!(view.confirm_accent, view.accent);
        assert_eq!(view.temperature_trend, "Cooling 2.4°");
        assert_eq!(view.current_temperature_label, "25.4°C");
        assert_eq!(view.target_temperature_label, "23");
        assert!(view.temperature_control_visible);
        assert!(view.fan_control_visible);
        assert!(!view.controls_disabled);
        assert_eq!(view.selected_home.unwrap().display_name, "Casa");
        assert_eq!(view.selected_device.unwrap().device_name, "Living");
    }

    #[test]
    fn preview_follows_staged_mode() {
        let mut engine = engine_with(1, Some(23.0), Some(23.0));
        engine.select_mode(Mode::Dry);
        let view = engine.view();
        assert_eq!(view.actual_mode, Mode::Cool);
        assert_eq!(view.preview_mode, Mode::Dry);
        assert!(!view.temperature_control_visible);
        assert!(!view.fan_control_visible);
        assert_eq!(view.target_temperature_label, "--");
        assert_eq!(view.mode_preview_accent, Mode::Dry.accent());
        assert_eq!(view.confirm_accent, Mode::Dry.accent());
        assert!(view.has_pending_changes);
    }

    #[test]
    fn confirm_accent_ignores_changes_that_keep_the_mode() {
        let cool = state(23, Mode::Cool);
        let warmer = state(26, Mode::Cool);
        let fallback = Mode::Cool.accent();
        assert_eq!(confirm_accent(Some(warmer), Some(cool), fallback), fallback);
        assert_eq!(
            confirm_accent(Some(cool.with_mode(Mode::Off)), Some(cool), fallback),
            Mode::Off.accent()
        );
        assert_eq!(confirm_accent(None, Some(cool), fallback), fallback);
    }

    #[test]
    fn trend_covers_every_branch() {
        let heat = state(22, Mode::Heat);
        assert_eq!(temperature_trend(None, Some(20.0)), "Select a device");
        assert_eq!(temperature_trend(Some(state(22, Mode::Off)), Some(20.0)), "Off");
        assert_eq!(temperature_trend(Some(heat), None), "Sensor unavailable");
        assert_eq!(temperature_trend(Some(heat), Some(21.9)), "Temperature stable");
        assert_eq!(temperature_trend(Some(heat), Some(20.0)), "Heating 2.0°");
        assert_eq!(temperature_trend(Some(heat), Some(24.5)), "Cooling 2.5°");
    }

    #[test]
    fn labels() {
        assert_eq!(temperature_label(Some(0.0)), "0°C");
        assert_eq!(temperature_label(Some(21.5)), "21.5°C");
        assert_eq!(target_label(Some(state(16, Mode::Cool)), true), "16");
        assert_eq!(target_label(Some(state(16, Mode::Cool)), false), "--");
    }

    #[test]
    fn submitting_disables_controls() {
        let mut engine = engine_with(1, Some(23.0), None);
        engine.set_temperature(20.0);
        engine.submit();
        let view = engine.view();
        assert!(view.controls_disabled);
        assert!(view.is_submitting);
        assert_eq!(view.status_message.as_deref(), Some("Sending..."));
        assert_eq!(view.temperature_trend, "Sensor unavailable");
    }
}
