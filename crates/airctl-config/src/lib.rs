//! Shared configuration for airctl.
//!
//! TOML profiles, credential resolution (env + keyring + plaintext),
//! runtime overrides, translation to `airctl_core::ControllerConfig`, and
//! the file-backed selection record.

mod selection;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use airctl_core::{AuthCredentials, ControllerConfig, TlsVerification};

pub use selection::FileSelectionStore;

const KEYRING_SERVICE: &str = "airctl";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no credentials configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("invalid selection record: {0}")]
    Selection(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when none is named.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    #[serde(default)]
    pub insecure: bool,

    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            insecure: false,
            timeout: default_timeout(),
            refresh_interval_secs: default_refresh_interval(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    30
}
fn default_refresh_interval() -> u64 {
    ControllerConfig::DEFAULT_REFRESH_INTERVAL_SECS
}
fn default_variant() -> String {
    "prod".into()
}

/// A named service profile.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Profile {
    /// Service root, e.g. "https://ac.example.com".
    pub api_base_url: String,

    /// Deployment variant ("prod", "dev", ...).
    #[serde(default = "default_variant")]
    pub variant: String,

    /// Login email.
    pub email: Option<String>,

    /// Password (plaintext; prefer keyring or env var).
    pub password: Option<String>,

    /// Environment variable name containing the password.
    pub password_env: Option<String>,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Override insecure TLS setting.
    pub insecure: Option<bool>,

    /// Override timeout.
    pub timeout: Option<u64>,

    /// Override the selected-device poll period. 0 disables polling.
    pub refresh_interval_secs: Option<u64>,
}

impl Profile {
    pub fn new(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            variant: default_variant(),
            email: None,
            password: None,
            password_env: None,
            ca_cert: None,
            insecure: None,
            timeout: None,
            refresh_interval_secs: None,
        }
    }
}

// ── Runtime overrides ───────────────────────────────────────────────

/// Deployment overrides read from the process environment
/// (`AIRCTL_VARIANT`, `AIRCTL_API_BASE_URL`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub variant: Option<String>,
    pub api_base_url: Option<String>,
}

impl RuntimeConfig {
    pub fn from_env() -> Self {
        Self {
            variant: env_non_empty("AIRCTL_VARIANT"),
            api_base_url: env_non_empty("AIRCTL_API_BASE_URL"),
        }
    }

    /// Variant in effect for `profile`.
    pub fn variant<'a>(&'a self, profile: &'a Profile) -> &'a str {
        self.variant.as_deref().unwrap_or(&profile.variant)
    }
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "airctl", "airctl")
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("airctl");
    p
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback().join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Where the selected home/device is remembered between runs.
pub fn selection_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback().join("selection.json"),
        |dirs| dirs.data_dir().join("selection.json"),
    )
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load the Config from `path` + environment.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("AIRCTL_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Profile selection ───────────────────────────────────────────────

/// Pick the profile name: explicit flag, then a profile named after the
/// runtime variant, then the configured default, then "default".
pub fn active_profile_name(
    cfg: &Config,
    explicit: Option<&str>,
    runtime: &RuntimeConfig,
) -> String {
    if let Some(name) = explicit {
        return name.to_owned();
    }
    if let Some(variant) = runtime
        .variant
        .as_deref()
        .filter(|v| cfg.profiles.contains_key(*v))
    {
        return variant.to_owned();
    }
    cfg.default_profile
        .clone()
        .unwrap_or_else(|| "default".into())
}

// ── Credential resolution ───────────────────────────────────────────

fn keyring_entry(profile_name: &str, key: &str) -> Result<keyring::Entry, ConfigError> {
    Ok(keyring::Entry::new(
        KEYRING_SERVICE,
        &format!("{profile_name}/{key}"),
    )?)
}

fn keyring_get(profile_name: &str, key: &str) -> Option<SecretString> {
    keyring_entry(profile_name, key)
        .ok()
        .and_then(|entry| entry.get_password().ok())
        .map(SecretString::from)
}

/// Resolve email + password: env var, then keyring, then plaintext.
pub fn resolve_credentials(
    profile: &Profile,
    profile_name: &str,
) -> Result<(String, SecretString), ConfigError> {
    let email = profile
        .email
        .clone()
        .or_else(|| env_non_empty("AIRCTL_EMAIL"))
        .ok_or_else(|| ConfigError::NoCredentials {
            profile: profile_name.into(),
        })?;

    // 1. Env var
    let env_password = profile
        .password_env
        .as_deref()
        .and_then(env_non_empty)
        .or_else(|| env_non_empty("AIRCTL_PASSWORD"));
    if let Some(pw) = env_password {
        return Ok((email, SecretString::from(pw)));
    }

    // 2. Keyring
    if let Some(pw) = keyring_get(profile_name, "password") {
        return Ok((email, pw));
    }

    // 3. Plaintext in config
    if let Some(ref pw) = profile.password {
        return Ok((email, SecretString::from(pw.clone())));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// Session token from a previous login (`AIRCTL_TOKEN` or keyring).
pub fn resolve_session_token(profile_name: &str) -> Option<SecretString> {
    env_non_empty("AIRCTL_TOKEN")
        .map(SecretString::from)
        .or_else(|| keyring_get(profile_name, "session-token"))
}

pub fn store_session_token(profile_name: &str, token: &SecretString) -> Result<(), ConfigError> {
    keyring_entry(profile_name, "session-token")?.set_password(token.expose_secret())?;
    Ok(())
}

/// Forget the stored session token. Missing entries are not an error.
pub fn clear_session_token(profile_name: &str) -> Result<(), ConfigError> {
    match keyring_entry(profile_name, "session-token")?.delete_credential() {
        Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

pub fn store_password(profile_name: &str, password: &SecretString) -> Result<(), ConfigError> {
    keyring_entry(profile_name, "password")?.set_password(password.expose_secret())?;
    Ok(())
}

/// Prefer a stored session; fall back to (or back it with) credentials.
pub fn resolve_auth(profile: &Profile, profile_name: &str) -> Result<AuthCredentials, ConfigError> {
    let token = resolve_session_token(profile_name);
    let credentials = resolve_credentials(profile, profile_name);

    match (token, credentials) {
        (Some(token), Ok((email, password))) => Ok(AuthCredentials::TokenOrCredentials {
            token,
            email,
            password,
        }),
        (Some(token), Err(_)) => Ok(AuthCredentials::Token(token)),
        (None, Ok((email, password))) => Ok(AuthCredentials::Credentials { email, password }),
        (None, Err(e)) => Err(e),
    }
}

// ── ControllerConfig ────────────────────────────────────────────────

/// Validate and normalize a base URL (trailing slashes stripped).
pub fn parse_base_url(raw: &str) -> Result<url::Url, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    trimmed.parse().map_err(|_| ConfigError::Validation {
        field: "api_base_url".into(),
        reason: format!("invalid URL: {raw}"),
    })
}

/// Transport-level settings for `profile`, without credentials.
pub fn connection_settings(
    profile: &Profile,
    defaults: &Defaults,
    runtime: &RuntimeConfig,
) -> Result<(url::Url, TlsVerification, Duration, u64), ConfigError> {
    let base = runtime
        .api_base_url
        .as_deref()
        .unwrap_or(&profile.api_base_url);
    let url = parse_base_url(base)?;

    let tls = if profile.insecure.unwrap_or(defaults.insecure) {
        TlsVerification::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsVerification::CustomCa(ca_path.clone())
    } else {
        TlsVerification::SystemDefaults
    };

    let timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));
    let refresh = profile
        .refresh_interval_secs
        .unwrap_or(defaults.refresh_interval_secs);
    Ok((url, tls, timeout, refresh))
}

/// Build a `ControllerConfig` from a profile and the given credentials.
pub fn build_controller_config(
    profile: &Profile,
    defaults: &Defaults,
    runtime: &RuntimeConfig,
    auth: AuthCredentials,
) -> Result<ControllerConfig, ConfigError> {
    let (url, tls, timeout, refresh) = connection_settings(profile, defaults, runtime)?;
    let mut config = ControllerConfig::new(url, auth);
    config.tls = tls;
    config.timeout = timeout;
    config.refresh_interval_secs = refresh;
    Ok(config)
}

/// Build a `ControllerConfig` from a profile, resolving credentials.
pub fn profile_to_controller_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
    runtime: &RuntimeConfig,
) -> Result<ControllerConfig, ConfigError> {
    let auth = resolve_auth(profile, profile_name)?;
    build_controller_config(profile, defaults, runtime, auth)
}
