//! `set` and `power` handlers: stage a change, send it, wait for the unit.

use std::time::Duration;

use airctl_core::{Controller, Intent};

use crate::cli::{GlobalOpts, PowerArgs, PowerCommand, PowerState, SetArgs};
use crate::error::CliError;

use super::{devices, util};

/// Staging intents for `set`, in the order they have to be applied:
/// power first (it picks the mode), then mode, fan and temperature.
fn staged_intents(args: &SetArgs) -> Vec<Intent> {
    let mut intents = Vec::new();
    if let Some(power) = args.power {
        intents.push(Intent::SetPower(power == PowerState::On));
    }
    if let Some(mode) = args.mode {
        intents.push(Intent::SelectMode(mode));
    }
    if let Some(fan) = args.fan {
        intents.push(Intent::SelectFanSpeed(fan));
    }
    if let Some(temperature) = args.temperature {
        intents.push(Intent::SetTemperature(temperature));
    }
    if let Some(step) = args.step {
        intents.push(Intent::AdjustTemperature(step));
    }
    intents
}

pub async fn set(
    controller: &Controller,
    args: SetArgs,
    global: &GlobalOpts,
    timeout: Duration,
) -> Result<(), CliError> {
    let intents = staged_intents(&args);
    if intents.is_empty() {
        return Err(CliError::Validation {
            field: "set".into(),
            reason: "nothing to change; pass --mode, --fan, --temperature, --step or --power".into(),
        });
    }
    if args.temperature.is_some_and(|t| !t.is_finite()) {
        return Err(CliError::Validation {
            field: "temperature".into(),
            reason: "must be a number".into(),
        });
    }

    let view = util::focus(controller, args.target).await?;
    util::selected_device(&view)?;
    if view.is_submitting {
        return Err(CliError::Busy);
    }

    for intent in intents {
        controller.execute(intent).await?;
    }
    let view = controller.snapshot();
    if !view.has_pending_changes {
        if !global.quiet {
            eprintln!("Already in that state; nothing sent");
        }
        return devices::print_report(&view, global);
    }

    util::send(controller, Intent::Submit, args.wait, timeout, global).await?;
    if !args.wait.no_wait {
        devices::print_report(&controller.snapshot(), global)?;
    }
    Ok(())
}

pub async fn power(
    controller: &Controller,
    args: PowerArgs,
    global: &GlobalOpts,
    timeout: Duration,
) -> Result<(), CliError> {
    let (target, desired) = match args.command {
        PowerCommand::On(t) => (t, Some(true)),
        PowerCommand::Off(t) => (t, Some(false)),
        PowerCommand::Toggle(t) => (t, None),
    };

    let view = util::focus(controller, target.target).await?;
    util::selected_device(&view)?;
    if desired == Some(view.actual_power_on) {
        if !global.quiet {
            let state = if view.actual_power_on { "on" } else { "off" };
            eprintln!("Already {state}; nothing sent");
        }
        return Ok(());
    }

    util::send(
        controller,
        Intent::TogglePanelPower,
        target.wait,
        timeout,
        global,
    )
    .await?;
    if !target.wait.no_wait {
        devices::print_report(&controller.snapshot(), global)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{TargetArgs, WaitArgs};
    use airctl_core::{FanSpeed, Mode};

    fn args() -> SetArgs {
        SetArgs {
            target: TargetArgs {
                home: None,
                device: None,
            },
            mode: None,
            fan: None,
            temperature: None,
            step: None,
            power: None,
            wait: WaitArgs { no_wait: false },
        }
    }

    #[test]
    fn power_is_staged_before_mode_and_temperature() {
        let mut set = args();
        set.temperature = Some(23.0);
        set.mode = Some(Mode::Heat);
        set.fan = Some(FanSpeed::Low);
        set.power = Some(PowerState::On);

        assert_eq!(
            staged_intents(&set),
            vec![
                Intent::SetPower(true),
                Intent::SelectMode(Mode::Heat),
                Intent::SelectFanSpeed(FanSpeed::Low),
                Intent::SetTemperature(23.0),
            ]
        );
    }

    #[test]
    fn no_flags_means_no_intents() {
        assert!(staged_intents(&args()).is_empty());
    }
}
