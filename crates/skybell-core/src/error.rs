// ── Core error types ──
//
// User-facing errors from skybell-core. Consumers never see HTTP status
// codes or JSON parse failures directly; the `From<skybell_api::Error>`
// impl translates transport-layer errors into domain variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Session errors ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    // ── Request errors ───────────────────────────────────────────────
    #[error("Unknown resource: {message}")]
    UnknownResource { message: String },

    #[error("Bad request: {message}")]
    BadRequest { message: String },

    #[error("Transport error: {message}")]
    Transport {
        message: String,
        /// HTTP status code, when the server answered at all.
        status: Option<u16>,
    },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Device not found: {identifier}")]
    DeviceNotFound { identifier: String },

    #[error("Invalid value for setting {key}: {value}")]
    InvalidSettingValue { key: String, value: String },

    // ── Cache errors ─────────────────────────────────────────────────
    #[error("Cache error: {message}")]
    Cache { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// True when the request never produced a usable response.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<skybell_api::Error> for CoreError {
    fn from(err: skybell_api::Error) -> Self {
        match err {
            skybell_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            skybell_api::Error::UnknownResource { message } => {
                CoreError::UnknownResource { message }
            }
            skybell_api::Error::BadRequest { message } => CoreError::BadRequest { message },
            skybell_api::Error::Http { status, message } => CoreError::Transport {
                message,
                status: Some(status),
            },
            skybell_api::Error::Transport(e) => CoreError::Transport {
                status: e.status().map(|s| s.as_u16()),
                message: e.to_string(),
            },
            skybell_api::Error::ClientClosed => CoreError::Transport {
                message: "client closed by logout".into(),
                status: None,
            },
            skybell_api::Error::InvalidUrl(e) => CoreError::Internal(format!("invalid URL: {e}")),
            skybell_api::Error::Deserialization { message, .. } => {
                CoreError::Internal(format!("unexpected response: {message}"))
            }
            skybell_api::Error::Cache { message } => CoreError::Cache { message },
        }
    }
}
