//! Device command handlers and the device state report.

use std::time::Duration;

use serde::Serialize;
use tabled::Tabled;

use airctl_core::view::temperature_label;
use airctl_core::{Controller, DeviceStatus, FanSpeed, Intent, Mode, PanelView};

use crate::cli::{DevicesArgs, DevicesCommand, GlobalOpts, TargetArgs};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Report ──────────────────────────────────────────────────────────

/// Confirmed state of the selected unit, as printed by `status`, `set`,
/// `power` and `watch`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceReport {
    pub home_id: Option<i64>,
    pub home: Option<String>,
    pub device_id: i64,
    pub device: String,
    pub model: Option<String>,
    pub power_on: bool,
    pub mode: Mode,
    pub fan_speed: FanSpeed,
    pub target_temperature: Option<i32>,
    pub current_temperature: Option<f64>,
    pub trend: String,
    pub pending_changes: bool,
    pub pending_commands: usize,
    pub status_message: Option<String>,
    pub error_message: Option<String>,
    #[serde(skip)]
    accent: airctl_core::Accent,
}

impl DeviceReport {
    pub fn from_view(view: &PanelView) -> Option<Self> {
        let device = view.selected_device.as_ref()?;
        view.baseline?;
        Some(Self {
            home_id: view.selected_home_id,
            home: view.selected_home.as_ref().map(|h| h.display_name.clone()),
            device_id: device.device_id,
            device: device.device_name.clone(),
            model: device.model.clone(),
            power_on: view.actual_power_on,
            mode: view.actual_mode,
            fan_speed: view.actual_fan_speed,
            target_temperature: view
                .actual_mode
                .supports_target_temperature()
                .then_some(view.actual_target_temperature),
            current_temperature: view.live_temperature,
            trend: view.temperature_trend.clone(),
            pending_changes: view.has_pending_changes,
            pending_commands: view.pending_commands,
            status_message: view.status_message.clone(),
            error_message: view.error_message.clone(),
            accent: view.accent,
        })
    }

    /// Key/value block for table output.
    pub fn detail(&self, color: bool) -> String {
        let mut rows = vec![
            ("Device", format!("{} ({})", self.device, self.device_id)),
            (
                "Home",
                self.home
                    .clone()
                    .unwrap_or_else(|| "--".into()),
            ),
            ("Power", if self.power_on { "on" } else { "off" }.into()),
            (
                "Mode",
                output::accented(&self.mode.to_string(), self.accent, color),
            ),
            ("Fan", self.fan_speed.to_string()),
            ("Target", self.target_label()),
            ("Current", temperature_label(self.current_temperature)),
            ("Trend", self.trend.clone()),
        ];
        if let Some(ref model) = self.model {
            rows.insert(1, ("Model", model.clone()));
        }
        if self.pending_commands > 0 {
            rows.push(("Pending", self.pending_commands.to_string()));
        }
        if let Some(ref status) = self.status_message {
            rows.push(("Status", status.clone()));
        }
        if let Some(ref error) = self.error_message {
            rows.push(("Error", error.clone()));
        }
        output::detail_block(&rows)
    }

    /// One-line summary for streaming output.
    pub fn line(&self, color: bool) -> String {
        let state = if self.power_on {
            self.mode.to_string()
        } else {
            "off".into()
        };
        let mut line = format!(
            "{}  {}  fan {}  target {}  now {}  {}",
            self.device,
            output::accented(&state, self.accent, color),
            self.fan_speed,
            self.target_label(),
            temperature_label(self.current_temperature),
            self.trend,
        );
        if let Some(ref status) = self.status_message {
            line.push_str(&format!("  [{status}]"));
        }
        if let Some(ref error) = self.error_message {
            line.push_str(&format!("  error: {error}"));
        }
        line
    }

    fn target_label(&self) -> String {
        self.target_temperature
            .map_or_else(|| "--".into(), |t| format!("{t}°C"))
    }
}

/// Print the report for the selected device in the chosen format.
pub fn print_report(view: &PanelView, global: &GlobalOpts) -> Result<(), CliError> {
    let report = DeviceReport::from_view(view).ok_or(CliError::NoDevice)?;
    let color = output::should_color(&global.color);
    let out = output::render_single(
        &global.output,
        &report,
        |r| r.detail(color),
        |r| r.device_id.to_string(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

// ── List rows ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "")]
    selected: &'static str,
    #[tabled(rename = "ID")]
    id: i64,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Power")]
    power: &'static str,
    #[tabled(rename = "Mode")]
    mode: String,
    #[tabled(rename = "Fan")]
    fan: String,
    #[tabled(rename = "Target")]
    target: String,
    #[tabled(rename = "Now")]
    current: String,
}

fn device_row(device: &DeviceStatus, selected: Option<i64>) -> DeviceRow {
    DeviceRow {
        selected: if Some(device.device_id) == selected {
            "*"
        } else {
            ""
        },
        id: device.device_id,
        name: device.device_name.clone(),
        power: if device.is_off() { "off" } else { "on" },
        mode: device.mode().to_string(),
        fan: device.fan().to_string(),
        target: device
            .target_temperature
            .filter(|t| t.is_finite())
            .map_or_else(|| "--".into(), |t| format!("{t:.0}°C")),
        current: temperature_label(device.temperature),
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    controller: &Controller,
    args: DevicesArgs,
    global: &GlobalOpts,
    timeout: Duration,
) -> Result<(), CliError> {
    match args.command {
        DevicesCommand::List { home } => {
            let view = util::focus(controller, TargetArgs { home, device: None }).await?;
            let selected = view.selected_device_id;
            let out = output::render_list(
                &global.output,
                &view.devices,
                |d| device_row(d, selected),
                |d| d.device_id.to_string(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        DevicesCommand::Status(target) => {
            let view = util::focus(controller, target).await?;
            util::selected_device(&view)?;
            print_report(&view, global)
        }

        DevicesCommand::Toggle { device, home, wait } => {
            let view = util::focus(controller, TargetArgs { home, device: None }).await?;
            if !view.devices.iter().any(|d| d.device_id == device) {
                return Err(util::not_found("device", device, "devices list"));
            }
            let sent = util::send(controller, Intent::QuickToggle(device), wait, timeout, global)
                .await?;
            if sent.is_some() && !wait.no_wait {
                print_report(&controller.snapshot(), global)?;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use airctl_core::engine::Effect;
    use airctl_core::{ControlState, Engine, Home, SelectionContext};

    fn view() -> PanelView {
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
                model: None,
                serial_number: None,
                temperature: Some(25.5),
                target_temperature: Some(24.0),
                fan_speed: Some(3),
                mode_id: Some(1),
            }]),
        );
        engine.view()
    }

    #[test]
    fn report_reflects_confirmed_state() {
        let view = view();
        assert_eq!(view.baseline, Some(ControlState::new(24, Mode::Cool, FanSpeed::High)));

        let report = DeviceReport::from_view(&view).unwrap();
        assert_eq!(report.device, "Living");
        assert_eq!(report.home.as_deref(), Some("Casa"));
        assert!(report.power_on);
        assert_eq!(report.target_temperature, Some(24));
        assert_eq!(
            report.line(false),
            "Living  cool  fan high  target 24°C  now 25.5°C  Cooling 1.5°"
        );
    }

    #[test]
    fn no_report_without_a_device() {
        assert!(DeviceReport::from_view(&PanelView::default()).is_none());
    }

    #[test]
    fn list_row_marks_selection_and_power() {
        let view = view();
        let row = device_row(&view.devices[0], Some(5));
        assert_eq!(row.selected, "*");
        assert_eq!(row.power, "on");
        assert_eq!(row.target, "24°C");
        assert_eq!(row.current, "25.5°C");
    }
}
