use thiserror::Error;

/// Top-level error type for the `airctl-api` crate.
///
/// Covers every failure mode of the device-control service:
/// session auth, transport, REST responses, and the event stream.
/// `airctl-core` maps these into the user-facing taxonomy.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// The service answered 401: session cookie or bearer token is no
    /// longer valid.
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS or client construction error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Service responses ───────────────────────────────────────────
    /// Non-success status with the service's `message`, or a generic one.
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// A success status whose body is not JSON.
    #[error("Unexpected response from server: {message}")]
    UnexpectedResponse { message: String },

    /// The command endpoint accepted the request but returned no job id.
    #[error("Command reference missing from server response")]
    MissingCorrelationId,

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    // ── Event stream ────────────────────────────────────────────────
    /// Event stream could not be opened or broke mid-read.
    #[error("Event stream error: {0}")]
    EventStream(String),
}

impl Error {
    /// Returns `true` if the session must be reset.
    pub fn is_unauthorized(&self) -> bool {
        match self {
            Self::Unauthorized { .. } => true,
            Self::Api { status, .. } => *status == 401,
            _ => false,
        }
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::EventStream(_) => true,
            Self::Api { status, .. } => matches!(status, 502..=504),
            _ => false,
        }
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized { .. } => Some(401),
            Self::Api { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
