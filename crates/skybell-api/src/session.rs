// Session lifecycle: login, token refresh, logout
//
// Login and refresh talk to the API through `execute` directly rather than
// `send`: neither may trigger the implicit login or the connection retry.

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value, json};
use tracing::{debug, info, warn};

use crate::cache::{
    AUTHENTICATION_RESULT, AuthenticationMaterial, EXPIRATION_DATE, EXPIRES_IN, as_seconds,
};
use crate::client::{ApiClient, Credentials, Payload, Request};
use crate::error::Error;
use crate::expiration::{EXPIRATION_SLACK_SECS, REFRESH_CYCLE_SECS, compute_expiration};
use crate::merge::deep_merge;

/// Body key carrying the refresh token.
pub const REFRESH_TOKEN_BODY: &str = "refresh_token";

impl ApiClient {
    /// Log in with the given credentials, or the stored ones.
    ///
    /// Arguments that are `Some` replace the stored credentials first.
    /// Returns `Ok(false)` when the login endpoint could not be reached or
    /// answered with an unexpected status; authentication, bad-request and
    /// unknown-resource failures are returned as errors.
    pub async fn login(
        &self,
        username: Option<&str>,
        password: Option<SecretString>,
    ) -> Result<bool, Error> {
        let (username, password) = {
            let mut stored = self.credentials_mut();
            if let Some(username) = username {
                stored.username = Some(username.to_owned());
            }
            if let Some(password) = password {
                stored.password = Some(password);
            }
            match (&stored.username, &stored.password) {
                (Some(u), Some(p)) => (u.clone(), p.clone()),
                _ => {
                    return Err(Error::Authentication {
                        message: "username and password are required".into(),
                    });
                }
            }
        };

        self.cache.clear(AUTHENTICATION_RESULT).await?;

        let request = Request::post(
            self.endpoints().login()?,
            json!({
                "username": username,
                "password": password.expose_secret(),
            }),
        );

        debug!(username = %username, "logging in");

        let payload = match self.execute(&request).await {
            Ok(payload) => payload,
            Err(err) if err.is_transport() => {
                warn!(username = %username, error = %err, "unable to send login");
                return Ok(false);
            }
            Err(err) => return Err(err),
        };

        let mut auth = match payload.into_object().remove(AUTHENTICATION_RESULT) {
            Some(Value::Object(auth)) => auth,
            _ => {
                return Err(Error::Authentication {
                    message: format!("login response missing {AUTHENTICATION_RESULT}"),
                });
            }
        };

        let expires_in = auth
            .get(EXPIRES_IN)
            .and_then(as_seconds)
            .ok_or_else(|| Error::Authentication {
                message: format!("login response missing {EXPIRES_IN}"),
            })?;
        let expiration = self.expiration_for(expires_in);
        auth.insert(EXPIRATION_DATE.into(), Value::String(expiration.to_rfc3339()));

        self.cache.update(auth_partial(auth)).await?;

        match self.login_cooldown {
            Some(cooldown) => {
                info!(
                    cooldown_secs = cooldown.as_secs(),
                    "login successful, waiting before further requests"
                );
                tokio::time::sleep(cooldown).await;
            }
            None => info!("login successful"),
        }

        Ok(true)
    }

    /// Exchange the stored refresh token for a fresh access token.
    ///
    /// Fields missing from the refresh response (typically the refresh
    /// token itself) are kept. Any request failure yields `Ok(false)`.
    pub async fn refresh(&self) -> Result<bool, Error> {
        let current = match self.cache.get(AUTHENTICATION_RESULT).await {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        let refresh_token = AuthenticationMaterial::from_map(&current).refresh_token;

        let Some(refresh_token) = refresh_token.filter(|_| self.is_open()) else {
            return Err(Error::Authentication {
                message: "no session established".into(),
            });
        };

        let request = Request::put(
            self.endpoints().token()?,
            json!({ REFRESH_TOKEN_BODY: refresh_token.expose_secret() }),
        );

        let mut response = match self.execute(&request).await {
            Ok(Payload::Json(Value::Object(response))) => response,
            Ok(_) => {
                debug!("token refresh returned no usable body");
                return Ok(false);
            }
            Err(err) => {
                debug!(error = %err, "no token refresh response");
                return Ok(false);
            }
        };

        let Some(expires_in) = response.get(EXPIRES_IN).and_then(as_seconds) else {
            debug!("token refresh response missing {EXPIRES_IN}");
            return Ok(false);
        };
        let expiration = self.expiration_for(expires_in);
        response.insert(EXPIRATION_DATE.into(), Value::String(expiration.to_rfc3339()));

        let mut merged = current;
        deep_merge(&mut merged, response);
        self.cache.update(auth_partial(merged)).await?;

        info!("token refresh successful");
        Ok(true)
    }

    /// Make sure the stored session is usable: log in when there is none,
    /// refresh when it has expired, and fall back to a full login when the
    /// refresh does not go through.
    pub async fn ensure_fresh(&self) -> Result<bool, Error> {
        let auth = self.cache.authentication().await;
        if auth.is_empty() {
            return self.login(None, None).await;
        }
        if !auth.is_expired(self.clock.now()) {
            return Ok(true);
        }

        match self.refresh().await {
            Ok(true) => Ok(true),
            Ok(false) | Err(Error::Authentication { .. }) => self.login(None, None).await,
            Err(err) => Err(err),
        }
    }

    /// Clear the session and release the HTTP client. Always succeeds;
    /// a failure to persist the cleared cache is only logged.
    pub async fn logout(&self) -> bool {
        if let Err(e) = self.cache.clear(AUTHENTICATION_RESULT).await {
            warn!(error = %e, "failed to persist cleared session");
        }
        if self.release_http() {
            debug!("HTTP client released");
        }
        true
    }

    /// Replace the stored credentials without logging in.
    pub fn set_credentials(&self, credentials: Credentials) {
        *self.credentials_mut() = credentials;
    }

    /// Seconds the session lasts without a refresh, as reported by the server.
    pub async fn session_refresh_period(&self) -> i64 {
        self.cache.authentication().await.expires_in.unwrap_or(0)
    }

    /// When the current session should be refreshed.
    pub async fn session_refresh_timestamp(&self) -> Option<DateTime<Utc>> {
        self.cache.authentication().await.expiration
    }

    fn expiration_for(&self, expires_in: i64) -> DateTime<Utc> {
        compute_expiration(
            expires_in,
            EXPIRATION_SLACK_SECS,
            REFRESH_CYCLE_SECS,
            self.clock.now(),
        )
    }
}

fn auth_partial(auth: Map<String, Value>) -> Map<String, Value> {
    let mut partial = Map::new();
    partial.insert(AUTHENTICATION_RESULT.into(), Value::Object(auth));
    partial
}
