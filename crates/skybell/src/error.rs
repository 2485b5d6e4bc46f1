//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use skybell_config::ConfigError;
use skybell_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const REJECTED: i32 = 6;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the SkyBell cloud: {message}")]
    #[diagnostic(
        code(skybell::connection_failed),
        help("Check your network connection, or raise `timeout` in the profile.")
    )]
    ConnectionFailed { message: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(skybell::auth_failed),
        help(
            "Verify your credentials.\n\
             Run: skybell login --profile {profile}"
        )
    )]
    AuthFailed { profile: String, message: String },

    #[error("No credentials configured for profile '{profile}'")]
    #[diagnostic(
        code(skybell::no_credentials),
        help(
            "Run: skybell login --profile {profile}\n\
             Or set SKYBELL_USERNAME and SKYBELL_PASSWORD."
        )
    )]
    NoCredentials { profile: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(skybell::not_found),
        help("Run: skybell {list_command} to see what is available")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    #[error("Setting '{setting}' was not accepted for device '{device}'")]
    #[diagnostic(
        code(skybell::setting_rejected),
        help("Re-run with -v to see the server's answer.")
    )]
    SettingRejected { device: String, setting: String },

    // ── API ──────────────────────────────────────────────────────────
    #[error("API error: {message}")]
    #[diagnostic(code(skybell::api_error))]
    ApiError { message: String, status: Option<u16> },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(skybell::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(skybell::profile_not_found),
        help("Create it with: skybell login --profile {name}")
    )]
    ProfileNotFound { name: String },

    #[error(transparent)]
    #[diagnostic(code(skybell::config))]
    Config(ConfigError),

    // ── IO ───────────────────────────────────────────────────────────
    #[error("Could not write {}", .path.display())]
    #[diagnostic(code(skybell::io))]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } | Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::SettingRejected { .. } => exit_code::REJECTED,
            Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }

    /// Point authentication help at the profile actually in use.
    #[must_use]
    pub fn for_profile(self, name: &str) -> Self {
        match self {
            Self::AuthFailed { message, .. } => Self::AuthFailed {
                profile: name.into(),
                message,
            },
            other => other,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::AuthenticationFailed { message } => CliError::AuthFailed {
                profile: "default".into(),
                message,
            },

            CoreError::Transport {
                message,
                status: None,
            } => CliError::ConnectionFailed { message },

            CoreError::Transport { message, status } => CliError::ApiError { message, status },

            CoreError::DeviceNotFound { identifier } => CliError::NotFound {
                resource_type: "device".into(),
                identifier,
                list_command: "devices list".into(),
            },

            CoreError::UnknownResource { message } => CliError::NotFound {
                resource_type: "resource".into(),
                identifier: message,
                list_command: "activities list <DEVICE>".into(),
            },

            CoreError::InvalidSettingValue { key, value } => CliError::Validation {
                field: key,
                reason: format!("{value} is outside the accepted values"),
            },

            CoreError::BadRequest { message } => CliError::ApiError {
                message,
                status: Some(400),
            },

            CoreError::Cache { message } | CoreError::Internal(message) => CliError::ApiError {
                message,
                status: None,
            },
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoCredentials { profile } => CliError::NoCredentials { profile },
            ConfigError::UnknownProfile { profile } => CliError::ProfileNotFound { name: profile },
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            other => CliError::Config(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_without_status_is_a_connection_failure() {
        let err = CliError::from(CoreError::Transport {
            message: "timed out".into(),
            status: None,
        });
        assert_eq!(err.exit_code(), exit_code::CONNECTION);

        let err = CliError::from(CoreError::Transport {
            message: "bad gateway".into(),
            status: Some(502),
        });
        assert_eq!(err.exit_code(), exit_code::GENERAL);
    }

    #[test]
    fn config_errors_keep_their_meaning() {
        let err = CliError::from(ConfigError::NoCredentials {
            profile: "home".into(),
        });
        assert_eq!(err.exit_code(), exit_code::AUTH);

        let err = CliError::from(ConfigError::UnknownProfile {
            profile: "cabin".into(),
        });
        assert!(matches!(err, CliError::ProfileNotFound { ref name } if name == "cabin"));
    }

    #[test]
    fn invalid_setting_is_a_usage_error() {
        let err = CliError::from(CoreError::InvalidSettingValue {
            key: "brightness".into(),
            value: "2000".into(),
        });
        assert_eq!(err.exit_code(), exit_code::USAGE);
    }
}
