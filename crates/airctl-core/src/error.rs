// ── Core error types ──
//
// User-facing errors from airctl-core. Consumers never see raw HTTP or
// JSON failures; the `From<airctl_api::Error>` impl folds them into the
// taxonomy the engine acts on. Only `Unauthorized` leads to a side
// effect (session reset); everything else ends at the handler.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    // ── Session ──────────────────────────────────────────────────────
    #[error("Session is no longer valid: {message}")]
    Unauthorized { message: String },

    // ── Service / transport ──────────────────────────────────────────
    #[error("{message}")]
    Request {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    #[error("Command rejected: {message}")]
    CommandRejected { message: String },

    #[error("Controller disconnected")]
    ControllerDisconnected,

    #[error("Timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Push channel ─────────────────────────────────────────────────
    #[error("Malformed {event} payload: {reason}")]
    MalformedPushPayload { event: String, reason: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Whether this error must reset the session instead of being shown.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }

    /// Text surfaced to the user for non-session failures.
    pub fn user_message(&self) -> String {
        match self {
            Self::Request { message, .. } | Self::CommandRejected { message } => message.clone(),
            other => other.to_string(),
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<airctl_api::Error> for CoreError {
    fn from(err: airctl_api::Error) -> Self {
        match err {
            airctl_api::Error::Unauthorized { message } => CoreError::Unauthorized { message },
            airctl_api::Error::Api { status: 401, message } => CoreError::Unauthorized { message },
            airctl_api::Error::Api { status, message } => CoreError::Request {
                message,
                status: Some(status),
            },
            airctl_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout { timeout_secs: 0 }
                } else {
                    CoreError::Request {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            airctl_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            airctl_api::Error::Tls(msg) => CoreError::Config {
                message: format!("TLS error: {msg}"),
            },
            airctl_api::Error::MissingCorrelationId => CoreError::CommandRejected {
                message: "Command reference missing from server response".into(),
            },
            airctl_api::Error::UnexpectedResponse { message } => CoreError::Request {
                message,
                status: None,
            },
            airctl_api::Error::Deserialization { message, body: _ } => CoreError::Request {
                message: format!("Unreadable server response: {message}"),
                status: None,
            },
            airctl_api::Error::EventStream(reason) => CoreError::Request {
                message: reason,
                status: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_is_preserved_from_both_shapes() {
        let direct: CoreError = airctl_api::Error::Unauthorized {
            message: "expired".into(),
        }
        .into();
        let by_status: CoreError = airctl_api::Error::Api {
            status: 401,
            message: "expired".into(),
        }
        .into();
        assert!(direct.is_unauthorized());
        assert!(by_status.is_unauthorized());
    }

    #[test]
    fn api_errors_surface_server_message() {
        let err: CoreError = airctl_api::Error::Api {
            status: 409,
            message: "Device busy".into(),
        }
        .into();
        assert!(!err.is_unauthorized());
        assert_eq!(err.user_message(), "Device busy");
        assert!(matches!(err, CoreError::Request { status: Some(409), .. }));
    }

    #[test]
    fn missing_job_id_is_a_rejection() {
        let err: CoreError = airctl_api::Error::MissingCorrelationId.into();
        assert!(matches!(err, CoreError::CommandRejected { .. }));
    }
}
