// ── Controller ──
//
// Serializes every input (user intents, load results, push events and
// scheduler ticks) through one queue into the `Engine`, performs the
// effects it asks for, and publishes a fresh `PanelView` after each one.
// Loads run as detached tasks and report back through the queue; command
// submits are awaited inline so the job id is registered before any
// later input is looked at.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify, broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use airctl_api::{
    ApiClient, CommandReceipt, EventStreamHandle, LinkStatus, ReconnectConfig, StreamEvent,
    TransportConfig,
};

use crate::command::{Intent, IntentEnvelope, IntentResult};
use crate::config::{AuthCredentials, ControllerConfig};
use crate::engine::{CommandRequest, DeviceListRequest, Effect, Engine, Notice, StatusRequest};
use crate::error::CoreError;
use crate::model::{DeviceStatus, Home};
use crate::push::{self, PushEvent};
use crate::scheduler::{self, RefreshRequest, RefreshSignals};
use crate::service::{DeviceApi, SelectionStore, SessionControl};
use crate::view::PanelView;

const INPUT_CHANNEL_SIZE: usize = 64;
const NOTICE_CHANNEL_SIZE: usize = 64;

type SubmitOutcome = Result<(CommandRequest, CommandReceipt), CoreError>;

// ── Collaborators ────────────────────────────────────────────────

/// The outside world, as seen by the controller.
#[derive(Clone)]
pub struct Collaborators {
    pub api: Arc<dyn DeviceApi>,
    pub session: Arc<dyn SessionControl>,
    pub store: Arc<dyn SelectionStore>,
}

impl Collaborators {
    /// Use one `ApiClient` for both device access and the session.
    pub fn from_client(client: ApiClient, store: Arc<dyn SelectionStore>) -> Self {
        let client = Arc::new(client);
        Self {
            api: Arc::clone(&client) as Arc<dyn DeviceApi>,
            session: client,
            store,
        }
    }
}

// ── Queue items ──────────────────────────────────────────────────

enum Input {
    Intent(IntentEnvelope),
    HomesLoaded(Result<Vec<Home>, CoreError>),
    DevicesLoaded {
        request: DeviceListRequest,
        result: Result<Vec<DeviceStatus>, CoreError>,
    },
    StatusLoaded {
        request: StatusRequest,
        result: Result<Option<DeviceStatus>, CoreError>,
    },
    Refresh(RefreshRequest),
}

impl From<RefreshRequest> for Input {
    fn from(request: RefreshRequest) -> Self {
        Self::Refresh(request)
    }
}

// ── Controller ───────────────────────────────────────────────────

/// Entry point for presentation layers.
///
/// Cheaply cloneable via `Arc<ControllerInner>`. State is observed
/// through [`view()`](Self::view) and changed through
/// [`execute()`](Self::execute).
#[derive(Clone)]
pub struct Controller {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    input_tx: mpsc::Sender<Input>,
    view: watch::Receiver<Arc<PanelView>>,
    link: watch::Receiver<LinkStatus>,
    notices: broadcast::Sender<Notice>,
    visible: watch::Sender<bool>,
    focus: Arc<Notify>,
    cancel: CancellationToken,
    client: Option<ApiClient>,
    events: Mutex<Option<EventStreamHandle>>,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Controller {
    /// Start a controller over arbitrary collaborators.
    ///
    /// `push` is the raw event stream (if any); `refresh_interval`
    /// enables the visibility-driven poller. Must be called from within
    /// a tokio runtime.
    pub fn start(
        collaborators: Collaborators,
        push: Option<broadcast::Receiver<StreamEvent>>,
        refresh_interval: Option<Duration>,
    ) -> Self {
        Self::launch(
            collaborators,
            push,
            refresh_interval,
            CancellationToken::new(),
            None,
            None,
        )
    }

    /// Authenticate against the service and start a controller on it.
    pub async fn connect(
        config: &ControllerConfig,
        store: Arc<dyn SelectionStore>,
    ) -> Result<Self, CoreError> {
        let transport = TransportConfig {
            tls: (&config.tls).into(),
            timeout: config.timeout,
            cookie_jar: None,
        };
        let client = ApiClient::new(config.api_base_url.as_str(), transport)?;
        authenticate(&client, &config.auth).await?;

        let cancel = CancellationToken::new();
        let events = if config.events_enabled {
            match EventStreamHandle::connect(
                client.clone(),
                ReconnectConfig::default(),
                cancel.child_token(),
            ) {
                Ok(handle) => Some(handle),
                Err(e) => {
                    warn!(error = %e, "event stream unavailable (non-fatal)");
                    None
                }
            }
        } else {
            None
        };
        let push = events.as_ref().map(EventStreamHandle::subscribe);
        let refresh = (config.refresh_interval_secs > 0)
            .then(|| Duration::from_secs(config.refresh_interval_secs));

        info!(url = %config.api_base_url, events = events.is_some(), "controller connected");
        Ok(Self::launch(
            Collaborators::from_client(client.clone(), store),
            push,
            refresh,
            cancel,
            events,
            Some(client),
        ))
    }

    /// One-shot: connect without push or polling, run `f`, shut down.
    pub async fn oneshot<F, Fut, T>(
        config: &ControllerConfig,
        store: Arc<dyn SelectionStore>,
        f: F,
    ) -> Result<T, CoreError>
    where
        F: FnOnce(Controller) -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        let mut cfg = config.clone();
        cfg.events_enabled = false;
        cfg.refresh_interval_secs = 0;

        let controller = Self::connect(&cfg, store).await?;
        let result = f(controller.clone()).await;
        controller.shutdown().await;
        result
    }

    fn launch(
        collaborators: Collaborators,
        push: Option<broadcast::Receiver<StreamEvent>>,
        refresh_interval: Option<Duration>,
        cancel: CancellationToken,
        events: Option<EventStreamHandle>,
        client: Option<ApiClient>,
    ) -> Self {
        let mut engine = Engine::new(collaborators.store.read());
        let startup = engine.start();
        let (input_tx, input_rx) = mpsc::channel(INPUT_CHANNEL_SIZE);
        let (view_tx, view_rx) = watch::channel(Arc::new(engine.view()));
        let (selected_tx, selected_rx) = watch::channel(None);
        let (link_tx, link_rx) = watch::channel(LinkStatus::Disconnected);
        let (visible_tx, visible_rx) = watch::channel(true);
        let (notices, _) = broadcast::channel(NOTICE_CHANNEL_SIZE);
        let focus = Arc::new(Notify::new());

        let mut handles = Vec::new();
        if let Some(period) = refresh_interval {
            let signals = RefreshSignals {
                visible: visible_rx,
                selected_device: selected_rx,
                focus: Arc::clone(&focus),
            };
            handles.push(tokio::spawn(scheduler::run(
                period,
                signals,
                input_tx.clone(),
                cancel.clone(),
            )));
        }

        let reactor = Reactor {
            engine,
            api: collaborators.api,
            session: collaborators.session,
            store: collaborators.store,
            input_tx: input_tx.clone(),
            view_tx,
            selected_tx,
            link_tx,
            notices: notices.clone(),
            cancel: cancel.clone(),
        };
        handles.push(tokio::spawn(reactor.run(startup, input_rx, push)));

        Self {
            inner: Arc::new(ControllerInner {
                input_tx,
                view: view_rx,
                link: link_rx,
                notices,
                visible: visible_tx,
                focus,
                cancel,
                client,
                events: Mutex::new(events),
                task_handles: Mutex::new(handles),
            }),
        }
    }

    /// Stop background tasks and the event stream.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        if let Some(handle) = self.inner.events.lock().await.take() {
            handle.shutdown();
        }
        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        debug!("controller shut down");
    }

    // ── Intents ──────────────────────────────────────────────────

    /// Queue an intent and wait for its outcome.
    ///
    /// For command-sending intents the outcome is known once the service
    /// accepted (or refused) the command, not when the unit confirms it;
    /// watch [`notices()`](Self::notices) for that. The view reflects the
    /// intent by the time this returns.
    pub async fn execute(&self, intent: Intent) -> Result<IntentResult, CoreError> {
        let (tx, rx) = oneshot::channel();
        self.inner
            .input_tx
            .send(Input::Intent(IntentEnvelope {
                intent,
                response_tx: tx,
            }))
            .await
            .map_err(|_| CoreError::ControllerDisconnected)?;

        rx.await.map_err(|_| CoreError::ControllerDisconnected)?
    }

    /// Report whether the panel is on screen.
    pub fn set_visible(&self, visible: bool) {
        self.inner.visible.send_replace(visible);
    }

    /// Report that the panel regained focus.
    pub fn focus(&self) {
        self.inner.focus.notify_one();
    }

    // ── State observation ────────────────────────────────────────

    pub fn view(&self) -> watch::Receiver<Arc<PanelView>> {
        self.inner.view.clone()
    }

    pub fn snapshot(&self) -> Arc<PanelView> {
        Arc::clone(&self.inner.view.borrow())
    }

    /// Wait until the view satisfies `predicate`.
    pub async fn wait_for<F>(&self, mut predicate: F) -> Result<Arc<PanelView>, CoreError>
    where
        F: FnMut(&PanelView) -> bool,
    {
        let mut rx = self.inner.view.clone();
        let view = rx
            .wait_for(|view| predicate(view))
            .await
            .map_err(|_| CoreError::ControllerDisconnected)?;
        Ok(Arc::clone(&view))
    }

    /// Wait until homes, devices and the selected device have loaded (or
    /// failed to).
    pub async fn ready(&self) -> Result<Arc<PanelView>, CoreError> {
        self.wait_for(PanelView::is_settled).await
    }

    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.inner.notices.subscribe()
    }

    pub fn link_status(&self) -> watch::Receiver<LinkStatus> {
        self.inner.link.clone()
    }

    /// The underlying client, when built by [`connect`](Self::connect).
    pub fn api_client(&self) -> Option<&ApiClient> {
        self.inner.client.as_ref()
    }
}

async fn authenticate(client: &ApiClient, auth: &AuthCredentials) -> Result<(), CoreError> {
    match auth {
        AuthCredentials::Token(token) => {
            client.set_token(Some(token.clone()));
            client.me().await?;
        }
        AuthCredentials::Credentials { email, password } => {
            client.login(email, password).await?;
        }
        AuthCredentials::TokenOrCredentials {
            token,
            email,
            password,
        } => {
            client.set_token(Some(token.clone()));
            match client.me().await {
                Ok(_) => {}
                Err(e) if e.is_unauthorized() => {
                    debug!("stored session rejected, logging in again");
                    client.set_token(None);
                    client.login(email, password).await?;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
    Ok(())
}

// ── Reactor ──────────────────────────────────────────────────────

/// Owns the engine; the only task that ever touches it.
struct Reactor {
    engine: Engine,
    api: Arc<dyn DeviceApi>,
    session: Arc<dyn SessionControl>,
    store: Arc<dyn SelectionStore>,
    input_tx: mpsc::Sender<Input>,
    view_tx: watch::Sender<Arc<PanelView>>,
    selected_tx: watch::Sender<Option<i64>>,
    link_tx: watch::Sender<LinkStatus>,
    notices: broadcast::Sender<Notice>,
    cancel: CancellationToken,
}

enum Step {
    Input(Option<Input>),
    Push(Option<StreamEvent>),
}

impl Reactor {
    async fn run(
        mut self,
        startup: Vec<Effect>,
        mut input_rx: mpsc::Receiver<Input>,
        mut push_rx: Option<broadcast::Receiver<StreamEvent>>,
    ) {
        self.run_effects(startup).await;
        self.publish();

        let cancel = self.cancel.clone();
        loop {
            let step = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                input = input_rx.recv() => Step::Input(input),
                event = next_push(&mut push_rx) => Step::Push(event),
            };

            match step {
                Step::Input(Some(input)) => self.handle_input(input).await,
                Step::Input(None) => break,
                Step::Push(Some(event)) => self.handle_push(event).await,
                Step::Push(None) => {
                    debug!("push channel closed");
                    push_rx = None;
                }
            }
            self.publish();
        }
        debug!("controller loop stopped");
    }

    async fn handle_input(&mut self, input: Input) {
        let effects = match input {
            Input::Intent(IntentEnvelope {
                intent,
                response_tx,
            }) => {
                let result = self.apply_intent(intent).await;
                self.publish();
                let _ = response_tx.send(result);
                return;
            }
            Input::HomesLoaded(result) => self.engine.homes_loaded(result),
            Input::DevicesLoaded { request, result } => self.engine.devices_loaded(request, result),
            Input::StatusLoaded { request, result } => {
                self.engine.device_status_loaded(request, result)
            }
            Input::Refresh(RefreshRequest::Full) => self.full_refresh(),
            Input::Refresh(RefreshRequest::Device) => self.engine.refresh_selected_device(),
        };
        self.run_effects(effects).await;
    }

    async fn apply_intent(&mut self, intent: Intent) -> Result<IntentResult, CoreError> {
        debug!(?intent, "intent");
        let effects = match intent {
            Intent::SelectHome(home_id) => self.engine.select_home(home_id),
            Intent::SelectDevice(device_id) => self.engine.select_device(device_id),
            Intent::SelectMode(mode) => {
                self.engine.select_mode(mode);
                Vec::new()
            }
            Intent::SelectFanSpeed(fan_speed) => {
                self.engine.select_fan_speed(fan_speed);
                Vec::new()
            }
            Intent::SetTemperature(value) => {
                self.engine.set_temperature(value);
                Vec::new()
            }
            Intent::AdjustTemperature(step) => {
                self.engine.adjust_temperature(step);
                Vec::new()
            }
            Intent::SetPower(on) => {
                self.engine.set_power(on);
                Vec::new()
            }
            Intent::ResetChanges => {
                self.engine.reset_changes();
                Vec::new()
            }
            Intent::Submit => self.engine.submit(),
            Intent::TogglePanelPower => self.engine.toggle_panel_power(),
            Intent::QuickToggle(device_id) => self.engine.quick_toggle(device_id),
            Intent::Refresh => self.full_refresh(),
        };

        match self.run_effects(effects).await {
            Some(Ok((request, receipt))) => Ok(IntentResult::Submitted { request, receipt }),
            Some(Err(err)) => Err(err),
            None if intent.sends_command() => Ok(IntentResult::Ignored),
            None => Ok(IntentResult::Applied),
        }
    }

    fn full_refresh(&self) -> Vec<Effect> {
        let mut effects = self.engine.refresh_devices();
        effects.extend(self.engine.refresh_selected_device());
        effects
    }

    async fn handle_push(&mut self, event: StreamEvent) {
        let raw = match event {
            StreamEvent::Link(status) => {
                debug!(?status, "event stream link");
                self.link_tx.send_replace(status);
                if status == LinkStatus::Disconnected {
                    self.engine.stream_interrupted();
                }
                return;
            }
            StreamEvent::Message(raw) => raw,
        };

        let effects = match push::decode(&raw) {
            Ok(Some(PushEvent::DeviceUpdate(update))) => {
                debug!(
                    job_id = ?update.job_id,
                    home_id = update.home_id,
                    device_id = update.device_id,
                    "device update"
                );
                self.engine.device_updated(update)
            }
            Ok(Some(PushEvent::CommandError(failure))) => {
                debug!(
                    job_id = ?failure.job_id,
                    device_id = failure.device_id,
                    message = %failure.message,
                    "command error"
                );
                self.engine.command_failed(failure)
            }
            Ok(None) => {
                debug!(event = %raw.event, "ignoring push event");
                return;
            }
            Err(err) => {
                warn!(error = %err, "dropping push event");
                return;
            }
        };
        self.run_effects(effects).await;
    }

    /// Perform `effects` (and any they lead to). Returns the outcome of
    /// the submit among them, if there was one.
    async fn run_effects(&mut self, effects: Vec<Effect>) -> Option<SubmitOutcome> {
        let mut queue = VecDeque::from(effects);
        let mut submitted = None;

        while let Some(effect) = queue.pop_front() {
            match effect {
                Effect::LoadHomes => {
                    let api = Arc::clone(&self.api);
                    self.spawn_load(async move { Input::HomesLoaded(api.fetch_homes().await) });
                }
                Effect::LoadDevices(request) => {
                    let api = Arc::clone(&self.api);
                    self.spawn_load(async move {
                        Input::DevicesLoaded {
                            request,
                            result: api.fetch_devices(request.home_id).await,
                        }
                    });
                }
                Effect::LoadDeviceStatus(request) => {
                    let api = Arc::clone(&self.api);
                    self.spawn_load(async move {
                        Input::StatusLoaded {
                            request,
                            result: api
                                .fetch_device_status(request.home_id, request.device_id)
                                .await,
                        }
                    });
                }
                Effect::Submit(request) => {
                    debug!(
                        device_id = request.device_id,
                        mode = %request.command.mode,
                        fan = %request.command.fan_speed,
                        target = request.command.target_temperature,
                        "submitting command"
                    );
                    match self
                        .api
                        .submit_device_command(request.device_id, &request.command)
                        .await
                    {
                        Ok(receipt) => {
                            self.engine.submit_succeeded(&request, &receipt);
                            submitted = Some(Ok((request, receipt)));
                        }
                        Err(err) => {
                            warn!(error = %err, device_id = request.device_id, "command submit failed");
                            queue.extend(self.engine.submit_failed(&request, &err));
                            submitted = Some(Err(err));
                        }
                    }
                }
                Effect::PersistSelection(selection) => {
                    if let Err(err) = self.store.write(selection) {
                        warn!(error = %err, "failed to persist selection");
                    }
                }
                Effect::Logout => {
                    info!("session no longer valid, logging out");
                    if let Err(err) = self.session.logout().await {
                        warn!(error = %err, "logout failed (non-fatal)");
                    }
                }
                Effect::Notify(notice) => {
                    let _ = self.notices.send(notice);
                }
            }
        }
        submitted
    }

    fn spawn_load<F>(&self, load: F)
    where
        F: Future<Output = Input> + Send + 'static,
    {
        let tx = self.input_tx.clone();
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = cancel.cancelled() => {}
                input = load => {
                    let _ = tx.send(input).await;
                }
            }
        });
    }

    fn publish(&self) {
        let view = self.engine.view();
        self.view_tx.send_if_modified(|current| {
            if **current == view {
                false
            } else {
                *current = Arc::new(view);
                true
            }
        });

        let selected = self.engine.selected_device_id();
        self.selected_tx.send_if_modified(|current| {
            if *current == selected {
                false
            } else {
                *current = selected;
                true
            }
        });
    }
}

async fn next_push(rx: &mut Option<broadcast::Receiver<StreamEvent>>) -> Option<StreamEvent> {
    let Some(receiver) = rx.as_mut() else {
        return std::future::pending().await;
    };
    loop {
        match receiver.recv().await {
            Ok(event) => return Some(event),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "push receiver lagged");
            }
            Err(broadcast::error::RecvError::Closed) => return None,
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use airctl_api::RawEvent;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::{DeviceCommand, FanSpeed, Mode, SelectionContext};
    use crate::service::MemorySelectionStore;

    const WAIT: Duration = Duration::from_secs(5);

    #[derive(Default)]
    struct FakeApi {
        homes: Vec<Home>,
        devices: HashMap<i64, Vec<DeviceStatus>>,
        unauthorized: bool,
        next_job: AtomicUsize,
        submitted: StdMutex<Vec<(i64, DeviceCommand)>>,
    }

    #[async_trait]
    impl DeviceApi for FakeApi {
        async fn fetch_homes(&self) -> Result<Vec<Home>, CoreError> {
            if self.unauthorized {
                return Err(CoreError::Unauthorized {
                    message: "expired".into(),
                });
            }
            Ok(self.homes.clone())
        }

        async fn fetch_devices(&self, home_id: i64) -> Result<Vec<DeviceStatus>, CoreError> {
            Ok(self.devices.get(&home_id).cloned().unwrap_or_default())
        }

        async fn fetch_device_status(
            &self,
            home_id: i64,
            device_id: i64,
        ) -> Result<Option<DeviceStatus>, CoreError> {
            Ok(self
                .devices
                .get(&home_id)
                .and_then(|list| list.iter().find(|d| d.device_id == device_id).cloned()))
        }

        async fn submit_device_command(
            &self,
            device_id: i64,
            command: &DeviceCommand,
        ) -> Result<CommandReceipt, CoreError> {
            self.submitted.lock().unwrap().push((device_id, *command));
            let n = self.next_job.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(CommandReceipt {
                job_id: format!("job-{n}"),
                position: 0,
            })
        }
    }

    #[derive(Default)]
    struct FakeSession {
        logouts: AtomicUsize,
    }

    #[async_trait]
    impl SessionControl for FakeSession {
        async fn logout(&self) -> Result<(), CoreError> {
            self.logouts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn living() -> DeviceStatus {
        DeviceStatus {
            device_id: 10,
            device_name: "Living".into(),
            model: None,
            serial_number: None,
            temperature: Some(25.4),
            target_temperature: Some(23.0),
            fan_speed: Some(2),
            mode_id: Some(1),
        }
    }

    fn api() -> FakeApi {
        FakeApi {
            homes: vec![Home {
                id: 1,
                display_name: "Casa".into(),
            }],
            devices: HashMap::from([(1, vec![living()])]),
            ..FakeApi::default()
        }
    }

    struct Harness {
        controller: Controller,
        api: Arc<FakeApi>,
        session: Arc<FakeSession>,
        store: Arc<MemorySelectionStore>,
        push: broadcast::Sender<StreamEvent>,
    }

    fn start(api: FakeApi) -> Harness {
        let api = Arc::new(api);
        let session = Arc::new(FakeSession::default());
        let store = Arc::new(MemorySelectionStore::default());
        let (push, push_rx) = broadcast::channel(16);
        let controller = Controller::start(
            Collaborators {
                api: Arc::clone(&api) as Arc<dyn DeviceApi>,
                session: Arc::clone(&session) as Arc<dyn SessionControl>,
                store: Arc::clone(&store) as Arc<dyn SelectionStore>,
            },
            Some(push_rx),
            None,
        );
        Harness {
            controller,
            api,
            session,
            store,
            push,
        }
    }

    fn message(event: &str, data: &str) -> StreamEvent {
        StreamEvent::Message(Arc::new(RawEvent {
            event: event.into(),
            data: data.into(),
            id: None,
        }))
    }

    async fn ready(h: &Harness) -> Arc<PanelView> {
        tokio::time::timeout(WAIT, h.controller.ready())
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn startup_selects_first_device_and_persists() {
        let h = start(api());
        let view = ready(&h).await;

        assert_eq!(view.selected_home_id, Some(1));
        assert_eq!(view.selected_device_id, Some(10));
        assert_eq!(
            view.control,
            Some(crate::model::ControlState::new(23, Mode::Cool, FanSpeed::Medium))
        );
        assert_eq!(
            h.store.read(),
            Some(SelectionContext::new(Some(1), Some(10)))
        );
        h.controller.shutdown().await;
    }

    #[tokio::test]
    async fn submit_then_matched_push_confirms() {
        let h = start(api());
        ready(&h).await;
        let mut notices = h.controller.notices();

        h.controller
            .execute(Intent::SelectMode(Mode::Heat))
            .await
            .unwrap();
        h.controller
            .execute(Intent::SetTemperature(20.0))
            .await
            .unwrap();
        let result = h.controller.execute(Intent::Submit).await.unwrap();
        assert_eq!(result.receipt().unwrap().job_id, "job-1");
        assert_eq!(h.api.submitted.lock().unwrap()[0].1.target_temperature, 20);
        assert_eq!(h.controller.snapshot().pending_commands, 1);

        h.push
            .send(message(
                "device-update",
                r#"{"jobId":"job-1","homeId":1,"deviceId":10,
                    "device":{"deviceId":10,"deviceName":"Living","modeId":2,"fanSpeed":2,"targetTemperature":20}}"#,
            ))
            .unwrap();

        let notice = tokio::time::timeout(WAIT, notices.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            notice,
            Notice::CommandConfirmed {
                job_id: "job-1".into(),
                home_id: 1,
                device_id: 10,
            }
        );
        let view = tokio::time::timeout(WAIT, h.controller.wait_for(|v| !v.is_submitting))
            .await
            .unwrap()
            .unwrap();
        assert!(!view.has_pending_changes);
        assert_eq!(view.actual_mode, Mode::Heat);
        assert_eq!(view.pending_commands, 0);
        h.controller.shutdown().await;
    }

    #[tokio::test]
    async fn command_error_surfaces_message() {
        let h = start(api());
        ready(&h).await;

        h.controller
            .execute(Intent::SetTemperature(27.0))
            .await
            .unwrap();
        h.controller.execute(Intent::Submit).await.unwrap();
        h.push
            .send(message(
                "command-error",
                r#"{"jobId":"job-1","homeId":1,"deviceId":10,"message":"Device offline"}"#,
            ))
            .unwrap();

        let view = tokio::time::timeout(
            WAIT,
            h.controller.wait_for(|v| v.error_message.is_some()),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(view.error_message.as_deref(), Some("Device offline"));
        assert!(!view.is_submitting);
        assert!(view.has_pending_changes);
        h.controller.shutdown().await;
    }

    #[tokio::test]
    async fn malformed_push_is_dropped_and_link_loss_reported() {
        let h = start(api());
        let before = ready(&h).await;

        h.push.send(message("device-update", "{oops")).unwrap();
        h.push.send(message("heartbeat", "{}")).unwrap();
        h.push
            .send(StreamEvent::Link(LinkStatus::Disconnected))
            .unwrap();

        let view = tokio::time::timeout(
            WAIT,
            h.controller.wait_for(|v| v.status_message.is_some()),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(
            view.status_message.as_deref(),
            Some("Realtime connection interrupted. Retrying...")
        );
        assert_eq!(view.control, before.control);
        assert_eq!(view.baseline, before.baseline);
        h.controller.shutdown().await;
    }

    #[tokio::test]
    async fn unauthorized_load_logs_out() {
        let h = start(FakeApi {
            unauthorized: true,
            ..api()
        });
        let view = tokio::time::timeout(WAIT, h.controller.wait_for(|v| v.session_expired))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(view.error_message, None);
        assert_eq!(h.session.logouts.load(Ordering::SeqCst), 1);
        h.controller.shutdown().await;
    }

    #[tokio::test]
    async fn submit_without_changes_is_ignored() {
        let h = start(api());
        ready(&h).await;
        let result = h.controller.execute(Intent::Submit).await.unwrap();
        assert_eq!(result, IntentResult::Ignored);
        assert!(h.api.submitted.lock().unwrap().is_empty());
        h.controller.shutdown().await;
    }

    #[tokio::test]
    async fn intents_fail_after_shutdown() {
        let h = start(api());
        ready(&h).await;
        h.controller.shutdown().await;
        let err = h.controller.execute(Intent::Refresh).await.unwrap_err();
        assert!(matches!(err, CoreError::ControllerDisconnected));
    }
}
