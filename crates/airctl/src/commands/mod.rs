//! Command dispatch: bridges CLI args -> controller intents -> output.

pub mod auth;
pub mod config_cmd;
pub mod control;
pub mod devices;
pub mod homes;
pub mod util;
pub mod watch;

use airctl_config::ConfigError;

use crate::cli::{Command, DevicesArgs, DevicesCommand, GlobalOpts};
use crate::config;
use crate::error::CliError;

/// Whether `cmd` needs the event stream (and the poller) to do its job.
fn needs_live_updates(cmd: &Command) -> bool {
    matches!(
        cmd,
        Command::Set(_)
            | Command::Power(_)
            | Command::Watch(_)
            | Command::Devices(DevicesArgs {
                command: DevicesCommand::Toggle { .. }
            })
    )
}

/// Dispatch a service-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    let resolved = config::resolve(global)?;

    match cmd {
        Command::Login(args) => return auth::login(&resolved, args, global).await,
        Command::Logout => return auth::logout(&resolved, global).await,
        _ => {}
    }

    let controller_config = resolved.controller_config(global)?;
    let timeout = controller_config.timeout;
    let forget = || airctl_config::clear_session_token(&resolved.name);
    let controller = match util::connect(&controller_config, needs_live_updates(&cmd)).await {
        Ok(controller) => controller,
        Err(err) => return Err(forget_rejected_session(err, forget)),
    };
    tracing::debug!(command = ?cmd, profile = %resolved.name, "dispatching command");

    let result = match cmd {
        Command::Homes(args) => homes::handle(&controller, args, global).await,
        Command::Devices(args) => devices::handle(&controller, args, global, timeout).await,
        Command::Set(args) => control::set(&controller, args, global, timeout).await,
        Command::Power(args) => control::power(&controller, args, global, timeout).await,
        Command::Watch(target) => watch::handle(&controller, target, global).await,
        // Handled before a controller exists
        Command::Login(_) | Command::Logout | Command::Config(_) | Command::Completions(_) => {
            unreachable!()
        }
    };

    controller.shutdown().await;
    result.map_err(|err| forget_rejected_session(err, forget))
}

/// The service rejected the session: drop the stored token so the next run
/// signs in with credentials (or asks for `airctl login`) instead of
/// replaying it.
fn forget_rejected_session(
    err: CliError,
    clear: impl FnOnce() -> Result<(), ConfigError>,
) -> CliError {
    if matches!(err, CliError::AuthFailed) {
        if let Err(e) = clear() {
            tracing::debug!(error = %e, "could not clear the stored session token");
        }
    }
    err
}
