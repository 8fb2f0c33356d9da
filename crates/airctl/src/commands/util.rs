//! Shared helpers for command handlers.

use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::warn;

use airctl_config::FileSelectionStore;
use airctl_core::{
    CommandReceipt, Controller, ControllerConfig, CoreError, DeviceStatus, Intent, IntentResult,
    Notice, PanelView, SelectionStore,
};

use crate::cli::{GlobalOpts, TargetArgs, WaitArgs};
use crate::error::CliError;

/// Connect with the remembered selection. `live` keeps the event
/// stream and the poller running.
pub async fn connect(config: &ControllerConfig, live: bool) -> Result<Controller, CliError> {
    let mut config = config.clone();
    config.events_enabled = live;
    if !live {
        config.refresh_interval_secs = 0;
    }
    let store: Arc<dyn SelectionStore> = Arc::new(FileSelectionStore::default_location());
    Ok(Controller::connect(&config, store).await?)
}

/// Turn a settled view into an error if loading failed.
pub fn check(view: &PanelView) -> Result<(), CliError> {
    if view.session_expired {
        return Err(CliError::AuthFailed);
    }
    match view.error_message {
        Some(ref message) if view.control.is_none() => Err(CliError::ApiError {
            status: None,
            message: message.clone(),
        }),
        _ => Ok(()),
    }
}

/// Wait for the initial load, then switch to the requested home/device.
pub async fn focus(controller: &Controller, target: TargetArgs) -> Result<Arc<PanelView>, CliError> {
    let mut view = controller.ready().await?;
    check(&view)?;

    if let Some(home_id) = target.home.filter(|id| view.selected_home_id != Some(*id)) {
        if !view.homes.iter().any(|home| home.id == home_id) {
            return Err(not_found("home", home_id, "homes list"));
        }
        controller.execute(Intent::SelectHome(Some(home_id))).await?;
        view = controller
            .wait_for(|v| v.selected_home_id == Some(home_id) && v.is_settled())
            .await?;
        check(&view)?;
    }

    if let Some(device_id) = target.device.filter(|id| view.selected_device_id != Some(*id)) {
        if !view.devices.iter().any(|d| d.device_id == device_id) {
            return Err(not_found("device", device_id, "devices list"));
        }
        controller.execute(Intent::SelectDevice(device_id)).await?;
        view = controller
            .wait_for(|v| v.selected_device_id == Some(device_id) && v.is_settled())
            .await?;
        check(&view)?;
    }

    Ok(view)
}

/// The selected device of a focused view.
pub fn selected_device(view: &PanelView) -> Result<&DeviceStatus, CliError> {
    view.selected_device.as_ref().ok_or(CliError::NoDevice)
}

pub fn not_found(resource_type: &str, id: i64, list_command: &str) -> CliError {
    CliError::NotFound {
        resource_type: resource_type.into(),
        identifier: id.to_string(),
        list_command: list_command.into(),
    }
}

// ── Sending ─────────────────────────────────────────────────────────

/// Run a command-sending intent and, unless `--no-wait`, wait for the
/// unit's confirmation. Returns `None` when nothing needed sending.
pub async fn send(
    controller: &Controller,
    intent: Intent,
    wait: WaitArgs,
    timeout: Duration,
    global: &GlobalOpts,
) -> Result<Option<CommandReceipt>, CliError> {
    // Subscribe first: the confirmation can arrive right after the submit.
    let notices = controller.notices();

    let (request, receipt) = match controller.execute(intent).await? {
        IntentResult::Submitted { request, receipt } => (request, receipt),
        IntentResult::Ignored => return Err(CliError::Busy),
        IntentResult::Applied => return Ok(None),
    };
    if !global.quiet {
        eprintln!(
            "Command queued (job {}, position {})",
            receipt.job_id, receipt.position
        );
    }
    if wait.no_wait {
        return Ok(Some(receipt));
    }

    await_confirmation(
        notices,
        &receipt,
        request.device_id,
        timeout,
        global.quiet,
    )
    .await?;
    controller.wait_for(|v| !v.is_submitting).await?;
    Ok(Some(receipt))
}

async fn await_confirmation(
    mut notices: broadcast::Receiver<Notice>,
    receipt: &CommandReceipt,
    device_id: i64,
    timeout: Duration,
    quiet: bool,
) -> Result<(), CliError> {
    let spinner = (!quiet).then(|| {
        spinner(format!(
            "Waiting for device {device_id} to confirm job {}",
            receipt.job_id
        ))
    });

    let outcome = tokio::time::timeout(timeout, async {
        loop {
            match notices.recv().await {
                Ok(Notice::CommandConfirmed { job_id, .. }) if job_id == receipt.job_id => {
                    return Ok(());
                }
                Ok(Notice::CommandFailed {
                    job_id,
                    device_id: failed,
                    message,
                    ..
                }) if job_id.as_deref().map_or(failed == device_id, |id| id == receipt.job_id) => {
                    return Err(CliError::CommandFailed {
                        device_id: failed,
                        message,
                    });
                }
                Ok(Notice::SessionExpired) => return Err(CliError::AuthFailed),
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "missed controller notices"),
                Err(RecvError::Closed) => return Err(CoreError::ControllerDisconnected.into()),
            }
        }
    })
    .await;

    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
    outcome.unwrap_or(Err(CliError::Timeout {
        seconds: timeout.as_secs(),
    }))
}

fn spinner(message: String) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// Map a dialoguer / interactive I/O failure into CliError.
pub fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}
