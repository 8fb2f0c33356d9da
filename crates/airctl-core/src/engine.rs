// ── Reconciliation engine ──
//
// Owns the selection, the confirmed (baseline) and staged (control)
// states, the pending command registry and the remembered target
// temperature. Every public method handles exactly one input and returns
// the side effects the driver has to perform; the engine itself never
// does I/O, so each transition is atomic.

use airctl_api::CommandReceipt;
use serde::Serialize;
use tracing::debug;

use crate::error::CoreError;
use crate::model::{
    ControlState, DEFAULT_TEMPERATURE, DeviceCommand, DeviceStatus, FanSpeed, Home, Mode,
    SelectionContext, clamp_temperature,
};
use crate::normalize::normalize;
use crate::pending::PendingCommands;
use crate::push::{CommandFailure, DeviceUpdate};

pub const STATUS_SENDING: &str = "Sending...";
pub const STATUS_POWERING_ON: &str = "Powering on...";
pub const STATUS_POWERING_OFF: &str = "Powering off...";
pub const STATUS_STREAM_INTERRUPTED: &str = "Realtime connection interrupted. Retrying...";

// ── Inputs / outputs ────────────────────────────────────────────────

/// Fetch status of the selected device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStatus {
    #[default]
    Idle,
    Loading,
    Error,
}

/// Why a device list is being fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceListLoad {
    /// After a home was selected: pick the stored or first device.
    Initial,
    /// Periodic refresh: keep the current device if still listed.
    Refresh,
}

/// Why a single device status is being fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLoad {
    /// The selected device wasn't in the cached list.
    Initial,
    /// Periodic poll; applied like an uncorrelated push snapshot.
    Refresh,
}

/// A device list fetch, tagged with the home selection it was issued
/// under. Results from an older selection are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceListRequest {
    pub home_id: i64,
    pub load: DeviceListLoad,
    pub generation: u64,
}

/// A single status fetch, tagged with the device selection it was issued
/// under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusRequest {
    pub home_id: i64,
    pub device_id: i64,
    pub load: StatusLoad,
    pub generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// The staged control state.
    Staged,
    /// A one-field power command bypassing the staged state.
    Power { on: bool },
}

/// A command the driver must send to the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandRequest {
    pub device_id: i64,
    pub command: DeviceCommand,
    pub kind: CommandKind,
}

/// Outcome notifications for observers waiting on a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    CommandConfirmed {
        job_id: String,
        home_id: i64,
        device_id: i64,
    },
    CommandFailed {
        job_id: Option<String>,
        home_id: i64,
        device_id: i64,
        message: String,
    },
    SessionExpired,
}

/// Side effect requested by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    LoadHomes,
    LoadDevices(DeviceListRequest),
    LoadDeviceStatus(StatusRequest),
    Submit(CommandRequest),
    PersistSelection(SelectionContext),
    Logout,
    Notify(Notice),
}

// ── Engine ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
#[allow(clippy::struct_excessive_bools)]
pub struct Engine {
    homes: Vec<Home>,
    devices: Vec<DeviceStatus>,
    home_id: Option<i64>,
    device_id: Option<i64>,
    /// Last persisted selection; the device candidate for a home load.
    stored: Option<SelectionContext>,
    /// Bumped on every home selection; device list results must match.
    home_generation: u64,
    /// Bumped on every device selection; status results must match.
    device_generation: u64,

    baseline: Option<ControlState>,
    control: Option<ControlState>,
    telemetry: Option<f64>,
    /// Last target set while in a target-capable mode.
    last_target: i32,

    pending: PendingCommands,
    submitting: bool,

    loading_homes: bool,
    loading_devices: bool,
    fetch: FetchStatus,
    error: Option<String>,
    status: Option<String>,
    session_expired: bool,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Engine {
    pub fn new(stored: Option<SelectionContext>) -> Self {
        Self {
            homes: Vec::new(),
            devices: Vec::new(),
            home_id: None,
            device_id: None,
            stored,
            home_generation: 0,
            device_generation: 0,
            baseline: None,
            control: None,
            telemetry: None,
            last_target: DEFAULT_TEMPERATURE,
            pending: PendingCommands::new(),
            submitting: false,
            loading_homes: false,
            loading_devices: false,
            fetch: FetchStatus::Idle,
            error: None,
            status: None,
            session_expired: false,
        }
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn homes(&self) -> &[Home] {
        &self.homes
    }

    pub fn devices(&self) -> &[DeviceStatus] {
        &self.devices
    }

    pub fn selected_home_id(&self) -> Option<i64> {
        self.home_id
    }

    pub fn selected_device_id(&self) -> Option<i64> {
        self.device_id
    }

    pub fn selected_home(&self) -> Option<&Home> {
        let id = self.home_id?;
        self.homes.iter().find(|home| home.id == id)
    }

    pub fn selected_device(&self) -> Option<&DeviceStatus> {
        self.device_entry(self.device_id?)
    }

    pub fn control(&self) -> Option<ControlState> {
        self.control
    }

    pub fn baseline(&self) -> Option<ControlState> {
        self.baseline
    }

    pub fn telemetry(&self) -> Option<f64> {
        self.telemetry
    }

    pub fn last_target_temperature(&self) -> i32 {
        self.last_target
    }

    pub fn pending(&self) -> &PendingCommands {
        &self.pending
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    pub fn is_loading_homes(&self) -> bool {
        self.loading_homes
    }

    pub fn is_loading_devices(&self) -> bool {
        self.loading_devices
    }

    pub fn fetch_status(&self) -> FetchStatus {
        self.fetch
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn status_message(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn session_expired(&self) -> bool {
        self.session_expired
    }

    /// Staged state differs from the confirmed one.
    pub fn has_pending_changes(&self) -> bool {
        match (self.control, self.baseline) {
            (Some(control), Some(baseline)) => control != baseline,
            _ => false,
        }
    }

    pub fn actual_power_on(&self) -> bool {
        self.baseline.is_some_and(ControlState::power_on)
    }

    /// Baseline target if its mode has one, else the remembered target.
    pub fn actual_target_temperature(&self) -> i32 {
        self.baseline
            .filter(|b| b.mode().supports_target_temperature())
            .map_or(self.last_target, ControlState::temperature)
    }

    // ── Startup / homes ──────────────────────────────────────────────

    pub fn start(&mut self) -> Vec<Effect> {
        self.loading_homes = true;
        self.error = None;
        vec![Effect::LoadHomes]
    }

    pub fn homes_loaded(&mut self, result: Result<Vec<Home>, CoreError>) -> Vec<Effect> {
        self.loading_homes = false;
        let homes = match result {
            Ok(homes) => homes,
            Err(err) => return self.fail(&err),
        };
        self.homes = homes;

        let Some(first) = self.homes.first().map(|home| home.id) else {
            self.home_id = None;
            self.devices.clear();
            self.change_device(None);
            return vec![self.persist(None, None)];
        };

        let stored_home = self
            .stored
            .and_then(|s| s.home_id)
            .filter(|id| self.homes.iter().any(|home| home.id == *id));

        let mut effects = Vec::new();
        let home_id = if let Some(id) = stored_home {
            id
        } else {
            effects.push(self.persist(Some(first), None));
            first
        };
        self.home_id = Some(home_id);
        self.home_generation += 1;
        self.loading_devices = true;
        self.error = None;
        self.status = None;
        effects.push(self.list_request(home_id, DeviceListLoad::Initial));
        effects
    }

    /// User picked a home (or cleared it).
    pub fn select_home(&mut self, home_id: Option<i64>) -> Vec<Effect> {
        self.home_id = home_id;
        self.home_generation += 1;
        self.devices.clear();
        self.change_device(None);

        let mut effects = vec![self.persist(home_id, None)];
        self.loading_devices = home_id.is_some();
        if let Some(home_id) = home_id {
            effects.push(self.list_request(home_id, DeviceListLoad::Initial));
        }
        effects
    }

    // ── Devices ──────────────────────────────────────────────────────

    pub fn devices_loaded(
        &mut self,
        request: DeviceListRequest,
        result: Result<Vec<DeviceStatus>, CoreError>,
    ) -> Vec<Effect> {
        let DeviceListRequest {
            home_id,
            load,
            generation,
        } = request;
        if self.home_id != Some(home_id) || generation != self.home_generation {
            debug!(home_id, "discarding device list from an earlier home selection");
            return Vec::new();
        }
        if load == DeviceListLoad::Initial {
            self.loading_devices = false;
        }

        let mut devices = match result {
            Ok(devices) => devices,
            Err(err) if err.is_unauthorized() || load == DeviceListLoad::Refresh => {
                return self.fail(&err);
            }
            Err(err) => {
                self.error = Some(err.user_message());
                self.devices.clear();
                self.change_device(None);
                return vec![self.persist(Some(home_id), None)];
            }
        };
        devices.sort_by_cached_key(|d| d.device_name.to_lowercase());
        self.devices = devices;

        let preferred = match load {
            DeviceListLoad::Initial => self
                .stored
                .filter(|s| s.home_id == Some(home_id))
                .and_then(|s| s.device_id),
            DeviceListLoad::Refresh => self.device_id,
        };
        let next = preferred
            .filter(|id| self.device_entry(*id).is_some())
            .or_else(|| self.devices.first().map(|d| d.device_id));

        // An earlier refresh may already have selected `next`.
        let mut effects = Vec::new();
        if next != self.device_id {
            effects.extend(self.change_device(next));
        }
        effects.push(self.persist(Some(home_id), next));
        effects
    }

    /// User picked a device of the selected home.
    pub fn select_device(&mut self, device_id: i64) -> Vec<Effect> {
        let Some(home_id) = self.home_id else {
            return Vec::new();
        };
        let mut effects = if self.device_id == Some(device_id) {
            self.status = None;
            self.error = None;
            self.submitting = false;
            Vec::new()
        } else {
            self.change_device(Some(device_id))
        };
        effects.push(self.persist(Some(home_id), Some(device_id)));
        effects
    }

    pub fn device_status_loaded(
        &mut self,
        request: StatusRequest,
        result: Result<Option<DeviceStatus>, CoreError>,
    ) -> Vec<Effect> {
        let StatusRequest {
            home_id,
            device_id,
            load,
            generation,
        } = request;
        if !self.is_selected(home_id, device_id) || generation != self.device_generation {
            debug!(home_id, device_id, "discarding status from an earlier device selection");
            return Vec::new();
        }

        match result {
            Err(err) => {
                self.fetch = FetchStatus::Error;
                self.fail(&err)
            }
            Ok(None) => {
                self.fetch = FetchStatus::Idle;
                vec![self.list_request(home_id, DeviceListLoad::Refresh)]
            }
            Ok(Some(device)) => match load {
                StatusLoad::Initial => {
                    self.upsert_device(device.clone());
                    self.initial_load(&device);
                    Vec::new()
                }
                StatusLoad::Refresh => self.apply_snapshot(home_id, device, None),
            },
        }
    }

    // ── Push events ──────────────────────────────────────────────────

    pub fn device_updated(&mut self, update: DeviceUpdate) -> Vec<Effect> {
        self.apply_snapshot(update.home_id, update.device, update.job_id.as_deref())
    }

    pub fn command_failed(&mut self, failure: CommandFailure) -> Vec<Effect> {
        let CommandFailure {
            job_id,
            home_id,
            device_id,
            message,
        } = failure;

        if let Some(id) = job_id.as_deref() {
            if self
                .pending
                .peek(id)
                .is_some_and(|cmd| cmd.targets(home_id, device_id))
            {
                self.pending.resolve(id);
            }
        }

        let effects = vec![Effect::Notify(Notice::CommandFailed {
            job_id,
            home_id,
            device_id,
            message: message.clone(),
        })];

        if self.is_selected(home_id, device_id) {
            self.submitting = false;
            self.status = None;
            self.error = Some(message);
        }
        effects
    }

    /// The push channel dropped. Unconfirmed commands stay registered so
    /// a late confirmation still applies.
    pub fn stream_interrupted(&mut self) {
        if self.status.is_none() {
            self.status = Some(STATUS_STREAM_INTERRUPTED.into());
        }
        self.submitting = false;
    }

    // ── Scheduler ────────────────────────────────────────────────────

    pub fn refresh_devices(&self) -> Vec<Effect> {
        self.home_id
            .map(|home_id| self.list_request(home_id, DeviceListLoad::Refresh))
            .into_iter()
            .collect()
    }

    pub fn refresh_selected_device(&self) -> Vec<Effect> {
        match (self.home_id, self.device_id) {
            (Some(home_id), Some(device_id)) => {
                vec![self.status_request(home_id, device_id, StatusLoad::Refresh)]
            }
            _ => Vec::new(),
        }
    }

    // ── Staged edits ─────────────────────────────────────────────────

    pub fn select_mode(&mut self, mode: Mode) {
        if mode == Mode::Off {
            self.set_power(false);
            return;
        }
        let last_target = self.last_target;
        self.edit(|c| {
            let temperature = if mode.supports_target_temperature() {
                last_target
            } else {
                c.temperature()
            };
            c.with_mode(mode).with_temperature(temperature)
        });
    }

    pub fn select_fan_speed(&mut self, fan_speed: FanSpeed) {
        self.edit(|c| c.with_fan_speed(fan_speed));
    }

    /// Non-finite values are ignored.
    pub fn set_temperature(&mut self, value: f64) {
        if !value.is_finite() {
            return;
        }
        let temperature = clamp_temperature(value);
        self.edit(|c| c.with_temperature(temperature));
    }

    pub fn adjust_temperature(&mut self, step: i32) {
        self.edit(|c| c.with_temperature(c.temperature().saturating_add(step)));
    }

    /// Stage power on/off. Powering on resumes the confirmed mode, or
    /// `Auto` when the unit is confirmed off.
    pub fn set_power(&mut self, on: bool) {
        let resume = self
            .baseline
            .map(ControlState::mode)
            .filter(|mode| *mode != Mode::Off)
            .unwrap_or(Mode::Auto);
        let last_target = self.last_target;
        self.edit(|c| {
            if !on {
                return c.with_mode(Mode::Off);
            }
            if c.power_on() {
                return c;
            }
            let temperature = if resume.supports_target_temperature() {
                last_target
            } else {
                c.temperature()
            };
            c.with_mode(resume).with_temperature(temperature)
        });
    }

    /// Drop staged edits.
    pub fn reset_changes(&mut self) {
        if let Some(baseline) = self.baseline {
            self.control = Some(baseline);
            self.remember_target(baseline);
        }
    }

    fn edit(&mut self, f: impl FnOnce(ControlState) -> ControlState) {
        let Some(control) = self.control else {
            return;
        };
        let next = f(control);
        self.control = Some(next);
        self.remember_target(next);
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Send the staged state. No-op unless there are unsent edits and no
    /// command is already being sent.
    pub fn submit(&mut self) -> Vec<Effect> {
        let (Some(home_id), Some(device_id), Some(control)) =
            (self.home_id, self.device_id, self.control)
        else {
            return Vec::new();
        };
        if !self.has_pending_changes() || self.submitting {
            return Vec::new();
        }

        self.submitting = true;
        self.error = None;
        self.status = Some(STATUS_SENDING.into());
        vec![Effect::Submit(CommandRequest {
            device_id,
            command: DeviceCommand {
                home_id,
                mode: control.mode(),
                fan_speed: control.fan_speed(),
                target_temperature: control.temperature(),
            },
            kind: CommandKind::Staged,
        })]
    }

    /// The service accepted `request`; track its job id.
    pub fn submit_succeeded(&mut self, request: &CommandRequest, receipt: &CommandReceipt) {
        debug!(
            job_id = %receipt.job_id,
            position = receipt.position,
            device_id = request.device_id,
            "command queued"
        );
        self.pending.register(
            receipt.job_id.clone(),
            request.command.home_id,
            request.device_id,
        );
    }

    /// The submit call itself failed. Staged edits are kept for a retry.
    pub fn submit_failed(&mut self, request: &CommandRequest, err: &CoreError) -> Vec<Effect> {
        if err.is_unauthorized() {
            return self.fail(err);
        }
        if self.is_selected(request.command.home_id, request.device_id) {
            self.submitting = false;
            self.status = None;
            self.error = Some(err.user_message());
        }
        Vec::new()
    }

    /// Power the selected unit opposite to its confirmed state.
    pub fn toggle_panel_power(&mut self) -> Vec<Effect> {
        let Some(device_id) = self.device_id else {
            return Vec::new();
        };
        if self.submitting {
            return Vec::new();
        }
        let on = !self.actual_power_on();
        let context = self.device_entry(device_id).cloned();
        self.power_command(device_id, on, context.as_ref())
    }

    /// Toggle power of a listed unit, selecting it first if needed.
    pub fn quick_toggle(&mut self, device_id: i64) -> Vec<Effect> {
        let Some(home_id) = self.home_id else {
            return Vec::new();
        };
        if self.submitting {
            return Vec::new();
        }
        let Some(device) = self.device_entry(device_id).cloned() else {
            return Vec::new();
        };

        let mut effects = Vec::new();
        if self.device_id != Some(device_id) {
            effects.extend(self.change_device(Some(device_id)));
            effects.push(self.persist(Some(home_id), Some(device_id)));
        }
        effects.extend(self.power_command(device_id, device.is_off(), Some(&device)));
        effects
    }

    fn power_command(
        &mut self,
        device_id: i64,
        on: bool,
        context: Option<&DeviceStatus>,
    ) -> Vec<Effect> {
        let Some(home_id) = self.home_id else {
            return Vec::new();
        };
        let guess = context
            .and_then(|d| d.target_temperature)
            .filter(|t| t.is_finite())
            .unwrap_or_else(|| f64::from(self.actual_target_temperature()));

        self.submitting = true;
        self.error = None;
        self.status = Some(if on { STATUS_POWERING_ON } else { STATUS_POWERING_OFF }.into());

        vec![Effect::Submit(CommandRequest {
            device_id,
            command: DeviceCommand {
                home_id,
                mode: if on { Mode::Auto } else { Mode::Off },
                fan_speed: FanSpeed::Auto,
                target_temperature: clamp_temperature(guess),
            },
            kind: CommandKind::Power { on },
        })]
    }

    // ── Reconciliation ───────────────────────────────────────────────

    /// Apply a fresh status. `job_id` is set when the snapshot answers a
    /// command; polls pass `None`.
    fn apply_snapshot(
        &mut self,
        home_id: i64,
        device: DeviceStatus,
        job_id: Option<&str>,
    ) -> Vec<Effect> {
        let device_id = device.device_id;
        let mut effects = Vec::new();

        let resolved = job_id.and_then(|id| self.pending.resolve(id));
        let matched = resolved
            .as_ref()
            .is_some_and(|cmd| cmd.targets(home_id, device_id));
        if let Some(cmd) = resolved {
            if matched {
                effects.push(Effect::Notify(Notice::CommandConfirmed {
                    job_id: cmd.correlation_id,
                    home_id,
                    device_id,
                }));
            } else {
                debug!(job_id = %cmd.correlation_id, "job id confirmed a different device");
            }
        }

        if self.home_id == Some(home_id) {
            self.upsert_device(device.clone());
        }
        if !self.is_selected(home_id, device_id) {
            return effects;
        }

        let fallback = if matched {
            self.control
                .map_or(self.last_target, ControlState::temperature)
        } else {
            self.last_target
        };
        let normalized = normalize(&device, fallback);

        let sync_control = matched || self.control.is_none() || !self.has_pending_changes();

        self.telemetry = normalized.ambient;
        self.status = None;
        self.error = None;
        self.fetch = FetchStatus::Idle;
        self.baseline = Some(normalized.control);
        if sync_control {
            self.control = Some(normalized.control);
            self.remember_target(normalized.control);
        }
        if matched {
            self.submitting = false;
        }
        effects
    }

    /// First status of a freshly selected device.
    fn initial_load(&mut self, device: &DeviceStatus) {
        let in_flight = self.submitting
            || self
                .home_id
                .is_some_and(|home| self.pending.has_pending_for(home, device.device_id));
        let keep_edits = in_flight && self.has_pending_changes();

        let normalized = normalize(device, self.last_target);
        self.telemetry = normalized.ambient;
        self.baseline = Some(normalized.control);
        self.fetch = FetchStatus::Idle;
        if self.control.is_none() || !keep_edits {
            self.control = Some(normalized.control);
            self.remember_target(normalized.control);
        }
    }

    // ── Helpers ──────────────────────────────────────────────────────

    /// Switch the selected device, discarding everything known about the
    /// previous one.
    fn change_device(&mut self, device_id: Option<i64>) -> Vec<Effect> {
        self.device_id = device_id;
        self.device_generation += 1;
        self.control = None;
        self.baseline = None;
        self.telemetry = None;
        self.fetch = FetchStatus::Idle;
        self.submitting = false;
        self.status = None;
        self.error = None;

        let (Some(home_id), Some(device_id)) = (self.home_id, device_id) else {
            return Vec::new();
        };
        if let Some(entry) = self.device_entry(device_id).cloned() {
            self.initial_load(&entry);
            Vec::new()
        } else {
            self.fetch = FetchStatus::Loading;
            vec![self.status_request(home_id, device_id, StatusLoad::Initial)]
        }
    }

    fn list_request(&self, home_id: i64, load: DeviceListLoad) -> Effect {
        Effect::LoadDevices(DeviceListRequest {
            home_id,
            load,
            generation: self.home_generation,
        })
    }

    fn status_request(&self, home_id: i64, device_id: i64, load: StatusLoad) -> Effect {
        Effect::LoadDeviceStatus(StatusRequest {
            home_id,
            device_id,
            load,
            generation: self.device_generation,
        })
    }

    fn fail(&mut self, err: &CoreError) -> Vec<Effect> {
        if err.is_unauthorized() {
            self.session_expired = true;
            self.submitting = false;
            self.status = None;
            return vec![Effect::Logout, Effect::Notify(Notice::SessionExpired)];
        }
        self.error = Some(err.user_message());
        Vec::new()
    }

    fn persist(&mut self, home_id: Option<i64>, device_id: Option<i64>) -> Effect {
        let selection = SelectionContext::new(home_id, device_id);
        self.stored = Some(selection);
        Effect::PersistSelection(selection)
    }

    fn remember_target(&mut self, state: ControlState) {
        if state.mode().supports_target_temperature() {
            self.last_target = state.temperature();
        }
    }

    fn is_selected(&self, home_id: i64, device_id: i64) -> bool {
        self.home_id == Some(home_id) && self.device_id == Some(device_id)
    }

    fn device_entry(&self, device_id: i64) -> Option<&DeviceStatus> {
        self.devices.iter().find(|d| d.device_id == device_id)
    }

    fn upsert_device(&mut self, device: DeviceStatus) {
        if let Some(slot) = self
            .devices
            .iter_mut()
            .find(|d| d.device_id == device.device_id)
        {
            *slot = device;
        } else {
            self.devices.push(device);
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
