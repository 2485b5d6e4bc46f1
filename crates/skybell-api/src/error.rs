use thiserror::Error;

/// Top-level error type for the `skybell-api` crate.
///
/// Covers every failure mode of the request layer: authentication,
/// stale resources, malformed calls, transport, and cache persistence.
/// `skybell-core` maps these into user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Bad credentials, missing session, or a 401 (403 on login).
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── Resource / request ──────────────────────────────────────────
    /// 403/404 outside the login endpoint: the device, activity or
    /// storage key no longer exists upstream.
    #[error("Unknown resource: {message}")]
    UnknownResource { message: String },

    /// HTTP 400. Not recoverable by logging in again.
    #[error("Bad request: {message}")]
    BadRequest { message: String },

    /// Any other non-2xx status.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The HTTP client was released by a logout.
    #[error("HTTP client closed -- create a new client to reconnect")]
    ClientClosed,

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    // ── Cache ───────────────────────────────────────────────────────
    /// Reading or writing the persisted auth cache failed.
    #[error("Cache persistence failed: {message}")]
    Cache { message: String },
}

impl Error {
    /// Returns `true` if this error indicates auth has expired
    /// and re-authentication might resolve it.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }

    /// Returns `true` for failures that happened below HTTP status
    /// classification: the request never produced a usable response.
    ///
    /// These are the only errors the dispatcher retries.
    pub fn is_connection_failure(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Returns `true` for the transport category: connection failures,
    /// unexpected statuses, and a released client.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Http { .. } | Self::ClientClosed
        )
    }

    /// Returns `true` if this is a 403/404 on a resource.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::UnknownResource { .. })
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Deserialization {
            message: err.to_string(),
            body: String::new(),
        }
    }
}
