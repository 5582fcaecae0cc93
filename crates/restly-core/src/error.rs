// ── Core error types ──
//
// Errors returned by restly-core. Transport failures during entity
// synchronization are NOT returned through these: they set the entity's
// error flag instead. The `From<restly_api::Error>` impl translates
// transport-layer errors into domain variants for `SyncOutcome::Failed`.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Request timed out")]
    Timeout,

    // ── Remote errors ────────────────────────────────────────────────
    #[error("Resource not found: {identifier}")]
    NotFound { identifier: String },

    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Serialization failed: {message}")]
    Serialization { message: String },

    #[error("Cyclic structure at {pointer:?}")]
    Cyclic { pointer: String },

    #[error("Invalid pointer {pointer:?}: {reason}")]
    InvalidPointer { pointer: String, reason: String },

    #[error("Tracked data was dropped")]
    Detached,

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    pub(crate) fn invalid_pointer(pointer: &str, reason: impl Into<String>) -> Self {
        Self::InvalidPointer {
            pointer: pointer.to_owned(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Serialization {
            message: err.to_string(),
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<restly_api::Error> for CoreError {
    fn from(err: restly_api::Error) -> Self {
        let not_found = err.is_not_found();
        match err {
            restly_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map_or_else(|| "<unknown>".into(), ToString::to_string),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            restly_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            restly_api::Error::Tls(msg) => CoreError::Config {
                message: format!("TLS error: {msg}"),
            },
            restly_api::Error::Status { message, .. } if not_found => {
                CoreError::NotFound { identifier: message }
            }
            restly_api::Error::Status { status, message } => CoreError::Api {
                message,
                status: Some(status),
            },
            restly_api::Error::Deserialization { message, body: _ } => CoreError::Api {
                message: format!("Invalid response body: {message}"),
                status: None,
            },
        }
    }
}
