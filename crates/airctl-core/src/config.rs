// ── Runtime connection configuration ──
//
// How to reach the device-control service. Carries credentials and
// tuning, never touches disk: the CLI builds a `ControllerConfig` from
// its profile and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use airctl_api::TlsMode;

/// How to authenticate with the service.
#[derive(Debug, Clone)]
pub enum AuthCredentials {
    /// Bearer token from an earlier login.
    Token(SecretString),
    /// Email/password login.
    Credentials {
        email: String,
        password: SecretString,
    },
    /// Replay a stored token; log in again if the service rejects it.
    TokenOrCredentials {
        token: SecretString,
        email: String,
        password: SecretString,
    },
}

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store.
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification (self-signed development servers).
    DangerAcceptInvalid,
}

impl From<&TlsVerification> for TlsMode {
    fn from(tls: &TlsVerification) -> Self {
        match tls {
            TlsVerification::SystemDefaults => Self::System,
            TlsVerification::CustomCa(path) => Self::CustomCa(path.clone()),
            TlsVerification::DangerAcceptInvalid => Self::DangerAcceptInvalid,
        }
    }
}

/// Configuration for one controller session.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Service root, e.g. `https://ac.example.com`.
    pub api_base_url: Url,
    pub auth: AuthCredentials,
    pub tls: TlsVerification,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Poll period for the selected device (seconds). 0 = never.
    pub refresh_interval_secs: u64,
    /// Subscribe to the server-sent event stream.
    pub events_enabled: bool,
}

impl ControllerConfig {
    pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 30;

    pub fn new(api_base_url: Url, auth: AuthCredentials) -> Self {
        Self {
            api_base_url,
            auth,
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
            refresh_interval_secs: Self::DEFAULT_REFRESH_INTERVAL_SECS,
            events_enabled: true,
        }
    }
}
