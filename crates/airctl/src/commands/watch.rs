//! `watch`: follow the selected unit until Ctrl-C.
//!
//! Prints a line whenever the confirmed state, the reading or the status
//! changes. JSON formats emit one compact report per line.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;

use airctl_core::{Controller, LinkStatus, Notice, PanelView};

use crate::cli::{GlobalOpts, OutputFormat, TargetArgs};
use crate::error::CliError;
use crate::output;

use super::devices::DeviceReport;
use super::util;

fn render(report: &DeviceReport, global: &GlobalOpts, color: bool) -> Result<String, CliError> {
    Ok(match global.output {
        OutputFormat::Json | OutputFormat::JsonCompact => serde_json::to_string(report)?,
        OutputFormat::Yaml => format!("---\n{}", serde_yaml::to_string(report)?),
        OutputFormat::Table | OutputFormat::Plain => format!(
            "{}  {}",
            chrono::Local::now().format("%H:%M:%S"),
            report.line(color)
        ),
    })
}

fn describe(notice: &Notice) -> String {
    match notice {
        Notice::CommandConfirmed {
            job_id, device_id, ..
        } => format!("device {device_id} confirmed job {job_id}"),
        Notice::CommandFailed {
            device_id, message, ..
        } => format!("device {device_id} reported an error: {message}"),
        Notice::SessionExpired => "session expired".into(),
    }
}

pub async fn handle(
    controller: &Controller,
    target: TargetArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let view = util::focus(controller, target).await?;
    util::selected_device(&view)?;
    controller.set_visible(true);

    let color = output::should_color(&global.color);
    let mut views = controller.view();
    let mut notices = controller.notices();
    let mut link = controller.link_status();

    let mut last = DeviceReport::from_view(&view);
    if let Some(ref report) = last {
        output::print_output(&render(report, global, color)?, global.quiet);
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            signal = &mut ctrl_c => {
                signal?;
                break;
            }
            changed = views.changed() => {
                if changed.is_err() {
                    break;
                }
                let view: Arc<PanelView> = Arc::clone(&views.borrow_and_update());
                if view.session_expired {
                    return Err(CliError::AuthFailed);
                }
                let report = DeviceReport::from_view(&view);
                if report != last {
                    if let Some(ref report) = report {
                        output::print_output(&render(report, global, color)?, global.quiet);
                    }
                    last = report;
                }
            }
            notice = notices.recv() => match notice {
                Ok(notice) => {
                    if !global.quiet {
                        eprintln!("{}", describe(&notice));
                    }
                }
                Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            },
            changed = link.changed() => {
                if changed.is_err() {
                    break;
                }
                let status = *link.borrow_and_update();
                if !global.quiet {
                    match status {
                        LinkStatus::Connected => eprintln!("live updates connected"),
                        LinkStatus::Disconnected => eprintln!("live updates interrupted, retrying"),
                    }
                }
            }
        }
    }
    Ok(())
}
