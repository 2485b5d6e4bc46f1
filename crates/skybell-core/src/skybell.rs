// ── Account session facade ──
//
// Owns the API client and the device registry for one account. All
// network work happens here; the registry and event index only ever see
// payloads that were already fetched.

use std::sync::{Arc, RwLock};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use skybell_api::{ApiClient, AuthCache, Credentials, Endpoints, FileBlobStore, TransportConfig};

use crate::config::{CacheLocation, ClientConfig, FieldMap};
use crate::error::CoreError;
use crate::model::{self, DeviceRecord};
use crate::registry::DeviceRegistry;
use crate::settings::{Setting, SettingValue, settings_fragment};

const USER_ID: &str = "account_id";
const FIRST_NAME: &str = "fname";
const LAST_NAME: &str = "lname";

/// What `update_device` should refresh.
#[derive(Debug, Clone)]
pub struct UpdateOptions {
    /// Profile fragment to merge.
    pub profile: Option<Map<String, Value>>,
    /// Snapshot fragment to merge over the fetched snapshot.
    pub snapshot: Option<Map<String, Value>>,
    /// Fetch snapshot and activities, plus the profile when neither the
    /// caller nor the stored record has one.
    pub refresh: bool,
    /// Fetch the profile even when a fragment was supplied.
    pub fetch_profile: bool,
}

impl Default for UpdateOptions {
    fn default() -> Self {
        Self {
            profile: None,
            snapshot: None,
            refresh: true,
            fetch_profile: false,
        }
    }
}

impl UpdateOptions {
    /// Merge the given fragments without a full refresh.
    pub fn merge_only(
        profile: Option<Map<String, Value>>,
        snapshot: Option<Map<String, Value>>,
    ) -> Self {
        Self {
            profile,
            snapshot,
            refresh: false,
            fetch_profile: false,
        }
    }
}

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<SkybellInner>`.
#[derive(Clone)]
pub struct Skybell {
    inner: Arc<SkybellInner>,
}

struct SkybellInner {
    config: ClientConfig,
    api: ApiClient,
    registry: DeviceRegistry,
    user: RwLock<Map<String, Value>>,
}

impl Skybell {
    /// Build a session from configuration. Does not touch the network
    /// or the cache file; call [`initialize`](Self::initialize) for that.
    pub fn new(config: ClientConfig) -> Result<Self, CoreError> {
        let cache = match &config.cache {
            CacheLocation::File(path) => AuthCache::new(Arc::new(FileBlobStore), path.clone()),
            CacheLocation::Disabled => AuthCache::disabled(),
        };
        let transport = TransportConfig::default().with_timeout(config.timeout);
        let api = ApiClient::new(
            Endpoints::new(config.base_url.clone()),
            Arc::new(cache),
            &transport,
        )?
        .with_credentials(Credentials {
            username: config.username.clone(),
            password: config.password.clone(),
        })
        .with_login_cooldown(config.login_cooldown);

        Ok(Self::with_api(config, api))
    }

    /// Build a session around an existing API client.
    pub fn with_api(config: ClientConfig, api: ApiClient) -> Self {
        Self {
            inner: Arc::new(SkybellInner {
                config,
                api,
                registry: DeviceRegistry::new(),
                user: RwLock::new(Map::new()),
            }),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.inner.registry
    }

    fn fields(&self) -> &FieldMap {
        &self.inner.config.fields
    }

    // ── Session lifecycle ────────────────────────────────────────────

    /// Load the auth cache, optionally log in, fetch the user profile and,
    /// when configured, the device list.
    pub async fn initialize(&self) -> Result<Vec<Arc<DeviceRecord>>, CoreError> {
        self.load_cache().await?;

        let config = &self.inner.config;
        if config.auto_login && config.username.is_some() && config.password.is_some() {
            self.login(None, None).await?;
        }

        self.user().await?;

        if config.fetch_devices {
            return self.devices(false).await;
        }
        Ok(Vec::new())
    }

    /// See [`ApiClient::login`].
    pub async fn login(
        &self,
        username: Option<&str>,
        password: Option<SecretString>,
    ) -> Result<bool, CoreError> {
        Ok(self.inner.api.login(username, password).await?)
    }

    /// End the session: clear tokens, release the HTTP client and drop
    /// all device state. Always succeeds.
    pub async fn logout(&self) -> bool {
        self.inner.registry.clear();
        self.user_mut().clear();
        self.inner.api.logout().await
    }

    /// See [`ApiClient::refresh`].
    pub async fn refresh_session(&self) -> Result<bool, CoreError> {
        Ok(self.inner.api.refresh().await?)
    }

    pub async fn session_refresh_period(&self) -> i64 {
        self.inner.api.session_refresh_period().await
    }

    pub async fn session_refresh_timestamp(&self) -> Option<DateTime<Utc>> {
        self.inner.api.session_refresh_timestamp().await
    }

    /// Read the persisted auth cache into memory. Must run before the
    /// first write so keys stored by other callers survive it.
    pub async fn load_cache(&self) -> Result<(), CoreError> {
        self.inner.api.cache().load().await?;
        Ok(())
    }

    /// Delete the persisted auth cache.
    pub async fn erase_cache(&self) -> Result<(), CoreError> {
        Ok(self.inner.api.cache().erase().await?)
    }

    // ── User ─────────────────────────────────────────────────────────

    /// Fetch and remember the logged-in user's profile.
    pub async fn user(&self) -> Result<Map<String, Value>, CoreError> {
        let user = match self.inner.api.get_user().await? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        self.user_mut().clone_from(&user);
        Ok(user)
    }

    pub fn user_id(&self) -> Option<String> {
        self.user_field(USER_ID)
    }

    pub fn user_first_name(&self) -> Option<String> {
        self.user_field(FIRST_NAME)
    }

    pub fn user_last_name(&self) -> Option<String> {
        self.user_field(LAST_NAME)
    }

    fn user_field(&self, key: &str) -> Option<String> {
        self.inner
            .user
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_owned)
    }

    fn user_mut(&self) -> std::sync::RwLockWriteGuard<'_, Map<String, Value>> {
        self.inner
            .user
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    // ── Devices ──────────────────────────────────────────────────────

    /// All devices. The listing is fetched when nothing is known yet or
    /// when `force` is set; otherwise the registry answers directly.
    pub async fn devices(&self, force: bool) -> Result<Vec<Arc<DeviceRecord>>, CoreError> {
        if force || self.inner.registry.is_empty() {
            info!("updating all devices");
            let payload = self.inner.api.list_devices().await?;
            let rows = model::rows(payload, self.fields());
            let created = self.inner.registry.ingest_listing(rows, self.fields());
            debug!(created, total = self.inner.registry.len(), "device listing merged");
        }
        Ok(self.inner.registry.list())
    }

    /// One device, loading the listing first when the registry is empty.
    /// With `force`, the device is fully refreshed afterwards.
    pub async fn device(
        &self,
        device_id: &str,
        force: bool,
    ) -> Result<Arc<DeviceRecord>, CoreError> {
        let mut force = force;
        if self.inner.registry.is_empty() {
            self.devices(false).await?;
            force = false;
        }

        let device = self.find(device_id)?;
        if force {
            return self.update_device(device_id, UpdateOptions::default()).await;
        }
        Ok(device)
    }

    /// Refresh and merge one device's profile, snapshot and activities.
    pub async fn update_device(
        &self,
        device_id: &str,
        options: UpdateOptions,
    ) -> Result<Arc<DeviceRecord>, CoreError> {
        let api = &self.inner.api;
        let fields = self.fields();
        let current = self.find(device_id)?;
        let UpdateOptions {
            profile,
            snapshot,
            refresh,
            fetch_profile,
        } = options;

        // Profile: a refresh only fetches it for a record that has none.
        let profile = if fetch_profile
            || (refresh && profile.is_none() && current.profile.is_empty())
        {
            Some(object(api.get_device(device_id).await?))
        } else {
            profile
        };

        // Snapshot
        let mut snapshot_update = None;
        if refresh || snapshot.is_some() || current.snapshot.is_empty() {
            let mut fetched = object(api.get_snapshot(device_id).await?);
            let unchanged =
                fetched.get(&fields.date_time) == current.snapshot.get(&fields.date_time);
            let avatar = if unchanged {
                None
            } else {
                decode_preview(&fetched, fields)
            };
            if let Some(extra) = snapshot {
                skybell_api::deep_merge(&mut fetched, extra);
            }
            snapshot_update = Some((fetched, avatar));
        }

        // Activities
        let mut activity_update = None;
        if refresh {
            let activities = model::activities(api.list_activities(device_id).await?, fields);
            debug!(device_id, count = activities.len(), "activities fetched");
            let latest = crate::events::EventIndex::rebuild(&activities).latest(None);
            let image = match latest.video_url.as_deref() {
                Some(video) => self.activity_image(video).await,
                None => None,
            };
            activity_update = Some((activities, image));
        }

        self.inner
            .registry
            .update(device_id, |record| {
                if let Some(profile) = profile {
                    record.merge_profile(profile);
                }
                if let Some((snapshot, avatar)) = snapshot_update {
                    record.snapshot = snapshot;
                    if avatar.is_some() {
                        record.images.avatar = avatar;
                    }
                }
                if let Some((activities, image)) = activity_update {
                    record.set_activities(activities);
                    if image.is_some() {
                        record.images.activity = image;
                    }
                }
            })
            .ok_or_else(|| CoreError::DeviceNotFound {
                identifier: device_id.to_owned(),
            })
    }

    /// Video reference -> download URL -> media bytes. Failures keep the
    /// previous image.
    async fn activity_image(&self, video: &str) -> Option<Bytes> {
        let api = &self.inner.api;
        let download_url = match api.get_reference(video).await {
            Ok(meta) => download_url(&meta, self.fields())?,
            Err(e) => {
                warn!(video, error = %e, "unable to resolve activity video");
                return None;
            }
        };
        match api.download(&download_url).await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!(error = %e, "unable to download activity media");
                None
            }
        }
    }

    // ── Settings ─────────────────────────────────────────────────────

    /// Validate and submit one setting.
    ///
    /// Returns `Ok(false)` when the server did not accept the change; the
    /// stored device is then left as it was. Invalid values fail before
    /// any request is made.
    pub async fn set_setting(
        &self,
        device_id: &str,
        setting: Setting,
        value: SettingValue,
    ) -> Result<bool, CoreError> {
        let device = self.find(device_id)?;
        let fragment = settings_fragment(setting, &value, device.settings())?;

        match self
            .inner
            .api
            .post_settings(device_id, Value::Object(fragment.clone()))
            .await
        {
            Ok(response) => {
                let accepted = match response {
                    Value::Object(map) if !map.is_empty() => map,
                    _ => fragment,
                };
                self.inner
                    .registry
                    .update(device_id, |record| record.merge_settings(accepted));
                info!(device_id, %setting, "setting updated");
                Ok(true)
            }
            Err(e) => {
                warn!(device_id, %setting, error = %e, "exception changing settings");
                Ok(false)
            }
        }
    }

    // ── Activities ───────────────────────────────────────────────────

    /// Signed download URL for an activity's video; the device's latest
    /// activity when none is given.
    pub async fn activity_video_url(
        &self,
        device_id: &str,
        activity_id: Option<&str>,
    ) -> Result<String, CoreError> {
        let activity_id = match activity_id {
            Some(id) => id.to_owned(),
            None => self.find(device_id)?.latest(None).id,
        };
        if activity_id.is_empty() {
            return Err(CoreError::UnknownResource {
                message: format!("device {device_id} has no activity"),
            });
        }

        let meta = self.inner.api.get_activity_video(&activity_id).await?;
        download_url(&meta, self.fields()).ok_or_else(|| CoreError::UnknownResource {
            message: format!("activity {activity_id} has no video"),
        })
    }

    /// Video bytes for an activity. Writing them anywhere is up to the caller.
    pub async fn download_video(
        &self,
        device_id: &str,
        activity_id: Option<&str>,
    ) -> Result<Bytes, CoreError> {
        let url = self.activity_video_url(device_id, activity_id).await?;
        Ok(self.inner.api.download(&url).await?)
    }

    /// Delete an activity upstream and drop it from any stored history.
    pub async fn delete_activity(&self, activity_id: &str) -> Result<(), CoreError> {
        self.inner.api.delete_activity(activity_id).await?;

        for device in self.inner.registry.list() {
            if device.activities.iter().any(|a| a.id == activity_id) {
                self.inner.registry.update(device.id(), |record| {
                    let remaining = record
                        .activities
                        .iter()
                        .filter(|a| a.id != activity_id)
                        .cloned()
                        .collect();
                    record.set_activities(remaining);
                });
            }
        }
        Ok(())
    }

    fn find(&self, device_id: &str) -> Result<Arc<DeviceRecord>, CoreError> {
        self.inner
            .registry
            .get(device_id)
            .ok_or_else(|| CoreError::DeviceNotFound {
                identifier: device_id.to_owned(),
            })
    }
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn download_url(meta: &Value, fields: &FieldMap) -> Option<String> {
    meta.get(&fields.download_url)
        .and_then(Value::as_str)
        .filter(|url| !url.is_empty())
        .map(str::to_owned)
}

fn decode_preview(snapshot: &Map<String, Value>, fields: &FieldMap) -> Option<Bytes> {
    let preview = snapshot.get(&fields.preview).and_then(Value::as_str)?;
    match BASE64.decode(preview.trim()) {
        Ok(bytes) => Some(Bytes::from(bytes)),
        Err(e) => {
            warn!(error = %e, "snapshot preview is not valid base64");
            None
        }
    }
}
