//! `login` / `logout`.
//!
//! A bearer token issued at login goes to the system keyring under
//! `<profile>/session-token` and is replayed on later runs.

use std::sync::Arc;

use dialoguer::Input;
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use airctl_core::{AuthCredentials, Controller, CoreError, MemorySelectionStore};

use crate::cli::{GlobalOpts, LoginArgs};
use crate::config::Resolved;
use crate::error::CliError;

use super::util::prompt_err;

pub async fn login(
    resolved: &Resolved,
    args: LoginArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let email = match args.email.or_else(|| resolved.profile.email.clone()) {
        Some(email) => email,
        None => Input::new()
            .with_prompt("Email")
            .interact_text()
            .map_err(prompt_err)?,
    };
    let password = SecretString::from(rpassword::prompt_password("Password: ").map_err(prompt_err)?);

    if email.trim().is_empty() || password.expose_secret().is_empty() {
        return Err(CliError::Validation {
            field: "credentials".into(),
            reason: "email and password cannot be empty".into(),
        });
    }

    let config = resolved.controller_config_with(
        AuthCredentials::Credentials {
            email: email.clone(),
            password: password.clone(),
        },
        global,
    )?;
    let token = Controller::oneshot(
        &config,
        Arc::new(MemorySelectionStore::default()),
        |controller| async move { Ok(controller.api_client().and_then(|client| client.token())) },
    )
    .await?;

    match token {
        Some(token) => {
            airctl_config::store_session_token(&resolved.name, &token)?;
            if !global.quiet {
                eprintln!("✓ Signed in as {email}; session stored in system keyring");
            }
        }
        None if !global.quiet => {
            eprintln!("✓ Signed in as {email}");
            eprintln!("  The service issued no session token; use --remember to keep the password.");
        }
        None => {}
    }

    if args.remember {
        airctl_config::store_password(&resolved.name, &password)?;
        if !global.quiet {
            eprintln!("✓ Password stored in system keyring");
        }
    }
    Ok(())
}

pub async fn logout(resolved: &Resolved, global: &GlobalOpts) -> Result<(), CliError> {
    if let Some(token) = airctl_config::resolve_session_token(&resolved.name) {
        let config = resolved.controller_config_with(AuthCredentials::Token(token), global)?;
        let ended = Controller::oneshot(
            &config,
            Arc::new(MemorySelectionStore::default()),
            |controller| async move {
                match controller.api_client() {
                    Some(client) => client.logout().await.map_err(CoreError::from),
                    None => Ok(()),
                }
            },
        )
        .await;
        if let Err(e) = ended {
            debug!(error = %e, "server-side logout failed");
        }
    }

    airctl_config::clear_session_token(&resolved.name)?;
    if !global.quiet {
        eprintln!("✓ Signed out of profile '{}'", resolved.name);
    }
    Ok(())
}
