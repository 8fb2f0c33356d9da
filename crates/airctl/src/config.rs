//! CLI configuration -- thin wrapper around `airctl_config`.
//!
//! Adds the flag overrides from `GlobalOpts` (--api-url, --insecure,
//! --timeout) on top of profile resolution.

use std::time::Duration;

use airctl_core::{AuthCredentials, ControllerConfig, TlsVerification};

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use airctl_config::{
    Config, Profile, RuntimeConfig, config_path, load_config_or_default, save_config,
};

/// A profile ready to connect, plus the name it resolved to.
pub struct Resolved {
    pub name: String,
    pub profile: Profile,
    pub config: Config,
    pub runtime: RuntimeConfig,
}

/// Runtime overrides from the environment, with `--api-url` on top.
pub fn runtime(global: &GlobalOpts) -> RuntimeConfig {
    let mut runtime = RuntimeConfig::from_env();
    if let Some(ref url) = global.api_url {
        runtime.api_base_url = Some(url.clone());
    }
    runtime
}

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    airctl_config::active_profile_name(config, global.profile.as_deref(), &runtime(global))
}

/// Pick the active profile. Without one, a base URL from `--api-url` or
/// the environment stands in for it.
pub fn resolve(global: &GlobalOpts) -> Result<Resolved, CliError> {
    let config = load_config_or_default();
    let runtime = runtime(global);
    let name = airctl_config::active_profile_name(&config, global.profile.as_deref(), &runtime);

    let profile = match (config.profiles.get(&name), &runtime.api_base_url) {
        (Some(profile), _) => profile.clone(),
        (None, Some(url)) => Profile::new(url.clone()),
        (None, None) if global.profile.is_some() => {
            return Err(CliError::ProfileNotFound {
                available: available_profiles(&config),
                name,
            });
        }
        (None, None) => {
            return Err(CliError::NoConfig {
                path: config_path().display().to_string(),
            });
        }
    };

    Ok(Resolved {
        name,
        profile,
        config,
        runtime,
    })
}

impl Resolved {
    /// Controller config using the stored session and/or credentials.
    pub fn controller_config(&self, global: &GlobalOpts) -> Result<ControllerConfig, CliError> {
        let auth = airctl_config::resolve_auth(&self.profile, &self.name)?;
        self.controller_config_with(auth, global)
    }

    /// Controller config with explicit credentials.
    pub fn controller_config_with(
        &self,
        auth: AuthCredentials,
        global: &GlobalOpts,
    ) -> Result<ControllerConfig, CliError> {
        let mut config = airctl_config::build_controller_config(
            &self.profile,
            &self.config.defaults,
            &self.runtime,
            auth,
        )?;
        apply_overrides(&mut config, global);
        Ok(config)
    }
}

fn apply_overrides(config: &mut ControllerConfig, global: &GlobalOpts) {
    if global.insecure {
        config.tls = TlsVerification::DangerAcceptInvalid;
    }
    if let Some(secs) = global.timeout {
        config.timeout = Duration::from_secs(secs);
    }
}

/// Comma-separated profile names for help text.
pub fn available_profiles(config: &Config) -> String {
    let mut names: Vec<_> = config.profiles.keys().cloned().collect();
    if names.is_empty() {
        return "(none)".into();
    }
    names.sort();
    names.join(", ")
}
