//! Home command handlers.

use tabled::Tabled;

use airctl_core::{Controller, Home};

use crate::cli::{GlobalOpts, HomesArgs, HomesCommand};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Tabled)]
struct HomeRow {
    #[tabled(rename = "")]
    selected: &'static str,
    #[tabled(rename = "ID")]
    id: i64,
    #[tabled(rename = "Name")]
    name: String,
}

pub async fn handle(
    controller: &Controller,
    args: HomesArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        HomesCommand::List => {
            let view = controller.ready().await?;
            util::check(&view)?;

            let selected = view.selected_home_id;
            let out = output::render_list(
                &global.output,
                &view.homes,
                |home: &Home| HomeRow {
                    selected: if Some(home.id) == selected { "*" } else { "" },
                    id: home.id,
                    name: home.display_name.clone(),
                },
                |home| home.id.to_string(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
