// ── Runtime client configuration ──
//
// These types describe *how* to talk to the API and which JSON keys to
// read. They carry credential data and tuning, but never touch disk.
// The CLI (via skybell-config) builds a `ClientConfig` and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use url::Url;

use skybell_api::transport::DEFAULT_TIMEOUT;

/// Pause after a successful login before the next request.
pub const DEFAULT_LOGIN_COOLDOWN: Duration = Duration::from_secs(5);

/// JSON keys used to read device, activity and snapshot payloads.
///
/// Defaults match the v5 API. Every field can be overridden from the
/// config file when the server renames something.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldMap {
    pub rows: String,
    pub device_id: String,
    pub activity_id: String,
    pub event_type: String,
    pub event_time: String,
    pub video_url: String,
    pub download_url: String,
    /// Snapshot timestamp; a change triggers an avatar re-decode.
    pub date_time: String,
    /// Base64-encoded snapshot image.
    pub preview: String,
}

impl Default for FieldMap {
    fn default() -> Self {
        Self {
            rows: "rows".into(),
            device_id: "device_id".into(),
            activity_id: "activity_id".into(),
            event_type: "event_type".into(),
            event_time: "event_time".into(),
            video_url: "video_url".into(),
            download_url: "download_url".into(),
            date_time: "date_time".into(),
            preview: "preview".into(),
        }
    }
}

/// Where the auth cache lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLocation {
    /// Persist at this path on the local filesystem.
    File(PathBuf),
    /// Keep the session in memory only.
    Disabled,
}

/// Configuration for one account session.
///
/// Built by the CLI, passed to `Skybell`; core never reads config files.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API root (e.g. `https://api.skybell.network/api/v5/`).
    pub base_url: Url,
    pub username: Option<String>,
    pub password: Option<SecretString>,
    /// Request timeout.
    pub timeout: Duration,
    /// Sleep after each login; `None` disables it.
    pub login_cooldown: Option<Duration>,
    pub cache: CacheLocation,
    /// Log in during `initialize` instead of on the first request.
    pub auto_login: bool,
    /// List devices during `initialize`.
    pub fetch_devices: bool,
    pub fields: FieldMap,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: skybell_api::Endpoints::default().base().clone(),
            username: None,
            password: None,
            timeout: DEFAULT_TIMEOUT,
            login_cooldown: Some(DEFAULT_LOGIN_COOLDOWN),
            cache: CacheLocation::Disabled,
            auto_login: false,
            fetch_devices: true,
            fields: FieldMap::default(),
        }
    }
}

impl ClientConfig {
    /// Default cache file name for an account: dots are stripped from the
    /// username so each account gets its own file.
    pub fn default_cache_file(username: &str) -> String {
        format!("skybell_{}.json", username.replace('.', ""))
    }
}
