//! Configuration for the skybell CLI.
//!
//! TOML profiles, credential resolution (env + keyring + plaintext),
//! and translation to `skybell_core::ClientConfig`.

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

use skybell_core::{CacheLocation, ClientConfig, FieldMap};

const KEYRING_SERVICE: &str = "skybell";
const PASSWORD_ENV: &str = "SKYBELL_PASSWORD";
pub const USERNAME_ENV: &str = "SKYBELL_USERNAME";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no credentials configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("profile '{profile}' not found")]
    UnknownProfile { profile: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

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
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named account profiles.
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

impl Config {
    /// Look up a profile by name, falling back to `default_profile`.
    pub fn profile(&self, name: Option<&str>) -> Result<(String, &Profile), ConfigError> {
        let name = name
            .map(str::to_owned)
            .or_else(|| self.default_profile.clone())
            .unwrap_or_else(|| "default".into());
        self.profiles
            .get(&name)
            .map(|p| (name.clone(), p))
            .ok_or(ConfigError::UnknownProfile { profile: name })
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Seconds to wait after each login.
    #[serde(default = "default_login_cooldown")]
    pub login_cooldown: u64,

    #[serde(default)]
    pub disable_cache: bool,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            login_cooldown: default_login_cooldown(),
            disable_cache: false,
        }
    }
}

fn default_timeout() -> u64 {
    30
}
fn default_login_cooldown() -> u64 {
    5
}

/// A named account profile.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Profile {
    /// Account e-mail.
    pub username: Option<String>,

    /// Password (plaintext, prefer keyring or env var).
    pub password: Option<String>,

    /// Environment variable name containing the password.
    pub password_env: Option<String>,

    /// Override the API root.
    pub api_url: Option<String>,

    /// Where to persist the session; defaults to the data directory.
    pub cache_path: Option<PathBuf>,

    /// Keep the session in memory only.
    pub disable_cache: Option<bool>,

    /// Override timeout.
    pub timeout: Option<u64>,

    /// Override login cooldown; 0 disables it.
    pub login_cooldown: Option<u64>,

    /// JSON key overrides for API payloads.
    #[serde(default)]
    pub fields: FieldMap,
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "skybell", "skybell")
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback().join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Directory holding per-account session caches.
pub fn data_dir() -> PathBuf {
    project_dirs().map_or_else(dirs_fallback, |dirs| dirs.data_dir().to_path_buf())
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("skybell");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load the Config from `path` + environment (`SKYBELL_DEFAULTS__TIMEOUT=10`).
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("SKYBELL_").split("__"));

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

// ── Credential resolution ───────────────────────────────────────────

pub fn resolve_username(profile: &Profile, profile_name: &str) -> Result<String, ConfigError> {
    profile
        .username
        .clone()
        .or_else(|| std::env::var(USERNAME_ENV).ok())
        .ok_or_else(|| ConfigError::NoCredentials {
            profile: profile_name.into(),
        })
}

/// Resolve the password: profile env var, `SKYBELL_PASSWORD`, keyring,
/// then plaintext config.
pub fn resolve_password(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    // 1. Profile's password_env → env var lookup
    if let Some(ref env_name) = profile.password_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(SecretString::from(val));
        }
    }

    // 2. Global env var
    if let Ok(pw) = std::env::var(PASSWORD_ENV) {
        return Ok(SecretString::from(pw));
    }

    // 3. System keyring
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, &keyring_user(profile_name)) {
        if let Ok(pw) = entry.get_password() {
            return Ok(SecretString::from(pw));
        }
    }

    // 4. Plaintext in config
    if let Some(ref pw) = profile.password {
        return Ok(SecretString::from(pw.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// Store a profile's password in the system keyring.
pub fn store_password(profile_name: &str, password: &SecretString) -> Result<(), ConfigError> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, &keyring_user(profile_name))?;
    entry.set_password(password.expose_secret())?;
    Ok(())
}

/// Remove a profile's password from the system keyring. Missing entries are fine.
pub fn forget_password(profile_name: &str) -> Result<(), ConfigError> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, &keyring_user(profile_name))?;
    match entry.delete_credential() {
        Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn keyring_user(profile_name: &str) -> String {
    format!("{profile_name}/password")
}

// ── Translation ─────────────────────────────────────────────────────

/// Build a `ClientConfig` from a profile and the global defaults.
///
/// A missing password is not an error here: the session may still be
/// valid from the cache.
pub fn profile_to_client_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<ClientConfig, ConfigError> {
    let mut config = ClientConfig::default();

    if let Some(ref api_url) = profile.api_url {
        config.base_url = api_url.parse().map_err(|_| ConfigError::Validation {
            field: "api_url".into(),
            reason: format!("invalid URL: {api_url}"),
        })?;
    }

    let username = resolve_username(profile, profile_name)?;
    config.password = resolve_password(profile, profile_name).ok();

    config.cache = if profile.disable_cache.unwrap_or(defaults.disable_cache) {
        CacheLocation::Disabled
    } else {
        CacheLocation::File(profile.cache_path.clone().unwrap_or_else(|| {
            data_dir().join(ClientConfig::default_cache_file(&username))
        }))
    };
    config.username = Some(username);

    config.timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));
    config.login_cooldown = match profile.login_cooldown.unwrap_or(defaults.login_cooldown) {
        0 => None,
        secs => Some(Duration::from_secs(secs)),
    };
    config.fields = profile.fields.clone();

    Ok(config)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
default_profile = "home"

[defaults]
timeout = 12

[profiles.home]
username = "first.last@example.com"
password = "plain"
login_cooldown = 0

[profiles.home.fields]
event_type = "kind"

[profiles.lab]
username = "lab@example.com"
api_url = "http://127.0.0.1:8080/api/v5/"
cache_path = "/tmp/lab.json"
disable_cache = true
"#;

    fn sample() -> Config {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, SAMPLE).unwrap();
        load_config_from(&path).unwrap()
    }

    #[test]
    fn loads_profiles_over_defaults() {
        let config = sample();
        assert_eq!(config.defaults.timeout, 12);
        assert_eq!(config.defaults.login_cooldown, 5);

        let (name, home) = config.profile(None).unwrap();
        assert_eq!(name, "home");
        assert_eq!(home.fields.event_type, "kind");
        assert_eq!(home.fields.event_time, "event_time");

        assert!(matches!(
            config.profile(Some("missing")),
            Err(ConfigError::UnknownProfile { .. })
        ));
    }

    #[test]
    fn profile_translates_to_client_config() {
        let config = sample();
        let (name, home) = config.profile(Some("home")).unwrap();
        let client = profile_to_client_config(home, &name, &config.defaults).unwrap();

        assert_eq!(client.username.as_deref(), Some("first.last@example.com"));
        assert!(client.password.is_some());
        assert_eq!(client.timeout, Duration::from_secs(12));
        assert_eq!(client.login_cooldown, None);
        match client.cache {
            CacheLocation::File(path) => {
                assert!(path.ends_with("skybell_firstlast@examplecom.json"));
            }
            CacheLocation::Disabled => panic!("cache should be enabled"),
        }
    }

    #[test]
    fn lab_profile_overrides_url_and_cache() {
        let config = sample();
        let (name, lab) = config.profile(Some("lab")).unwrap();
        let client = profile_to_client_config(lab, &name, &config.defaults).unwrap();

        assert_eq!(client.base_url.as_str(), "http://127.0.0.1:8080/api/v5/");
        assert_eq!(client.cache, CacheLocation::Disabled);
        assert_eq!(client.login_cooldown, Some(Duration::from_secs(5)));
    }

    #[test]
    fn invalid_api_url_is_rejected() {
        let profile = Profile {
            username: Some("u@example.com".into()),
            api_url: Some("not a url".into()),
            ..Profile::default()
        };
        let err = profile_to_client_config(&profile, "x", &Defaults::default()).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "api_url"));
    }

    #[test]
    fn save_then_load_keeps_profiles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = Config::default();
        config.profiles.insert(
            "default".into(),
            Profile {
                username: Some("me@example.com".into()),
                ..Profile::default()
            },
        );

        save_config_to(&config, &path).unwrap();
        let loaded = load_config_from(&path).unwrap();
        assert_eq!(
            loaded.profiles["default"].username.as_deref(),
            Some("me@example.com")
        );
    }
}
