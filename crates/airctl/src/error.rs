//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use airctl_config::ConfigError;
use airctl_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not reach the service: {message}")]
    #[diagnostic(
        code(airctl::connection_failed),
        help(
            "Check that api_base_url is correct and the service is reachable.\n\
             Try: airctl config show"
        )
    )]
    ConnectionFailed { message: String },

    // ── Authentication ───────────────────────────────────────────────

    #[error("Session expired or credentials rejected")]
    #[diagnostic(
        code(airctl::auth_failed),
        help("Run: airctl login")
    )]
    AuthFailed,

    #[error("No credentials configured for profile '{profile}'")]
    #[diagnostic(
        code(airctl::no_credentials),
        help(
            "Sign in with: airctl login\n\
             Or set AIRCTL_EMAIL and AIRCTL_PASSWORD."
        )
    )]
    NoCredentials { profile: String },

    // ── Resources ────────────────────────────────────────────────────

    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(airctl::not_found),
        help("Run: airctl {list_command} to see available {resource_type}s")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    #[error("No device selected")]
    #[diagnostic(
        code(airctl::no_device),
        help("Pass --device <ID>. Run: airctl devices list")
    )]
    NoDevice,

    // ── Commands ─────────────────────────────────────────────────────

    #[error("Command rejected: {message}")]
    #[diagnostic(code(airctl::command_rejected))]
    CommandRejected { message: String },

    #[error("Device {device_id} reported an error: {message}")]
    #[diagnostic(code(airctl::command_failed))]
    CommandFailed { device_id: i64, message: String },

    #[error("Another command is still being sent")]
    #[diagnostic(
        code(airctl::busy),
        help("Wait for the unit to confirm the previous command and retry.")
    )]
    Busy,

    #[error("Service error{}: {message}", .status.map(|s| format!(" ({s})")).unwrap_or_default())]
    #[diagnostic(code(airctl::api_error))]
    ApiError { status: Option<u16>, message: String },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(airctl::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(airctl::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: airctl config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("Configuration file not found")]
    #[diagnostic(
        code(airctl::no_config),
        help(
            "Create one with: airctl config init\n\
             Expected at: {path}\n\
             Or pass --api-url / set AIRCTL_API_BASE_URL."
        )
    )]
    NoConfig { path: String },

    #[error("Configuration error: {message}")]
    #[diagnostic(code(airctl::config))]
    Config { message: String },

    // ── Timeout ──────────────────────────────────────────────────────

    #[error("Timed out after {seconds}s")]
    #[diagnostic(
        code(airctl::timeout),
        help("Increase timeout with --timeout or check the unit's connectivity.")
    )]
    Timeout { seconds: u64 },

    // ── IO / Serialization ────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render JSON: {0}")]
    #[diagnostic(code(airctl::json))]
    Json(#[from] serde_json::Error),

    #[error("Failed to render YAML: {0}")]
    #[diagnostic(code(airctl::yaml))]
    Yaml(#[from] serde_yaml::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } | Self::NoDevice | Self::ProfileNotFound { .. } => {
                exit_code::NOT_FOUND
            }
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::NoConfig { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Unauthorized { .. } => CliError::AuthFailed,

            CoreError::Request {
                message,
                status: None,
            } => CliError::ConnectionFailed { message },

            CoreError::Request { message, status } => CliError::ApiError { status, message },

            CoreError::CommandRejected { message } => CliError::CommandRejected { message },

            CoreError::ControllerDisconnected => CliError::ConnectionFailed {
                message: "controller stopped".into(),
            },

            CoreError::Timeout { timeout_secs } => CliError::Timeout {
                seconds: timeout_secs,
            },

            CoreError::MalformedPushPayload { event, reason } => CliError::ApiError {
                status: None,
                message: format!("malformed {event} event: {reason}"),
            },

            CoreError::Config { message } => CliError::Config { message },

            CoreError::Internal(message) => CliError::ApiError {
                status: None,
                message,
            },
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoCredentials { profile } => CliError::NoCredentials { profile },
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::Io(e) => CliError::Io(e),
            other => CliError::Config {
                message: other.to_string(),
            },
        }
    }
}
