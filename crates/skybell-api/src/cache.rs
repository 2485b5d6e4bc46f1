// Persistent authentication cache
//
// A JSON object with one reserved key (`AuthenticationResult`) plus any
// caller-supplied keys. Every mutation is flushed to the blob store before
// the call returns; the in-memory lock is held across the flush so the
// stored blob always reflects the latest completed mutation.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::Error;
use crate::merge::deep_merge;
use crate::store::BlobStore;

/// Reserved cache key holding the session tokens.
pub const AUTHENTICATION_RESULT: &str = "AuthenticationResult";
pub const ACCESS_TOKEN: &str = "AccessToken";
pub const REFRESH_TOKEN: &str = "RefreshToken";
pub const TOKEN_TYPE: &str = "TokenType";
pub const EXPIRES_IN: &str = "ExpiresIn";
pub const EXPIRATION_DATE: &str = "ExpirationDate";

/// Typed view of the `AuthenticationResult` entry.
///
/// The cache stores raw JSON; this is read out of it on demand so the
/// stored shape can carry extra server fields untouched.
#[derive(Debug, Clone, Default)]
pub struct AuthenticationMaterial {
    pub access_token: Option<SecretString>,
    pub refresh_token: Option<SecretString>,
    pub token_type: Option<String>,
    /// Raw token lifetime in seconds, as reported by the server.
    pub expires_in: Option<i64>,
    /// Computed instant after which the session should be refreshed.
    pub expiration: Option<DateTime<Utc>>,
}

impl AuthenticationMaterial {
    /// Read the material out of an `AuthenticationResult` object.
    pub fn from_map(map: &Map<String, Value>) -> Self {
        let text = |key: &str| {
            map.get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
        };

        Self {
            access_token: text(ACCESS_TOKEN).map(SecretString::from),
            refresh_token: text(REFRESH_TOKEN).map(SecretString::from),
            token_type: text(TOKEN_TYPE),
            expires_in: map.get(EXPIRES_IN).and_then(as_seconds),
            expiration: text(EXPIRATION_DATE)
                .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
                .map(|dt| dt.with_timezone(&Utc)),
        }
    }

    /// No access token stored: the next request must log in first.
    pub fn is_empty(&self) -> bool {
        self.access_token.is_none()
    }

    /// The session is past its computed expiration (or never had one).
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiration.is_none_or(|exp| exp <= now)
    }
}

/// Lifetimes arrive as integers, floats, or numeric strings.
#[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
pub(crate) fn as_seconds(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn template() -> Map<String, Value> {
    let mut map = Map::new();
    map.insert(AUTHENTICATION_RESULT.into(), Value::Object(Map::new()));
    map
}

/// Session-scoped auth cache.
///
/// Passed explicitly to every component that needs session state; there
/// is no process-wide instance. When constructed with [`AuthCache::disabled`]
/// all persistence becomes a no-op over the in-memory blob.
pub struct AuthCache {
    store: Option<Arc<dyn BlobStore>>,
    path: PathBuf,
    blob: Mutex<Map<String, Value>>,
}

impl AuthCache {
    /// A cache persisted at `path` in `store`.
    pub fn new(store: Arc<dyn BlobStore>, path: impl Into<PathBuf>) -> Self {
        Self {
            store: Some(store),
            path: path.into(),
            blob: Mutex::new(template()),
        }
    }

    /// A memory-only cache.
    pub fn disabled() -> Self {
        Self {
            store: None,
            path: PathBuf::new(),
            blob: Mutex::new(template()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted blob over a fresh template and write the result back.
    ///
    /// An empty blob on disk is deleted. An unreadable one is discarded
    /// with a warning rather than failing startup.
    pub async fn load(&self) -> Result<Map<String, Value>, Error> {
        let mut blob = self.blob.lock().await;

        if let Some(store) = &self.store {
            if store.exists(&self.path).await? {
                debug!(path = %self.path.display(), "cache found");
                if store.size(&self.path).await? > 0 {
                    let bytes = store.read(&self.path).await?;
                    match serde_json::from_slice::<Value>(&bytes) {
                        Ok(Value::Object(loaded)) => deep_merge(&mut blob, loaded),
                        Ok(_) | Err(_) => {
                            warn!(path = %self.path.display(), "cache blob is not a JSON object, discarding");
                        }
                    }
                } else {
                    debug!("cache file is empty, removing it");
                    store.delete(&self.path).await?;
                }
            }
        }

        self.persist(&blob).await?;
        Ok(blob.clone())
    }

    /// Deep-merge `partial` into the blob and persist it.
    ///
    /// On persistence failure the in-memory blob keeps the update and the
    /// error is returned so the caller can surface the stale store.
    pub async fn update(&self, partial: Map<String, Value>) -> Result<(), Error> {
        let mut blob = self.blob.lock().await;
        deep_merge(&mut blob, partial);
        self.persist(&blob).await
    }

    /// Look up a key. Absent keys yield an empty object.
    pub async fn get(&self, key: &str) -> Value {
        self.blob
            .lock()
            .await
            .get(key)
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()))
    }

    /// Reset `key` to an empty object.
    pub async fn clear(&self, key: &str) -> Result<(), Error> {
        let mut partial = Map::new();
        partial.insert(key.to_owned(), Value::Object(Map::new()));
        self.update(partial).await
    }

    /// Delete the persisted blob. The in-memory state is left alone.
    pub async fn erase(&self) -> Result<(), Error> {
        if let Some(store) = &self.store {
            if store.exists(&self.path).await? {
                debug!(path = %self.path.display(), "removing cache");
                store.delete(&self.path).await?;
            }
        }
        Ok(())
    }

    /// A copy of the whole blob.
    pub async fn snapshot(&self) -> Map<String, Value> {
        self.blob.lock().await.clone()
    }

    /// Typed view of the stored session tokens.
    pub async fn authentication(&self) -> AuthenticationMaterial {
        match self.blob.lock().await.get(AUTHENTICATION_RESULT) {
            Some(Value::Object(map)) => AuthenticationMaterial::from_map(map),
            _ => AuthenticationMaterial::default(),
        }
    }

    async fn persist(&self, blob: &Map<String, Value>) -> Result<(), Error> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        let bytes = serde_json::to_vec_pretty(blob)?;
        store.write(&self.path, &bytes).await
    }
}
