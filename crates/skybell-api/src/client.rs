// API HTTP client and request dispatcher
//
// Wraps `reqwest::Client` with bearer-token injection, status
// classification, `data` envelope unwrapping, and the single
// re-authentication retry. Session operations (login/refresh/logout)
// live in `session.rs`; typed endpoint helpers in `resources.rs`.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use bytes::Bytes;
use reqwest::Method;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value};
use tracing::{debug, warn};
use url::Url;

use crate::cache::{AUTHENTICATION_RESULT, AuthCache};
use crate::endpoints::{APP_VERSION, Endpoints};
use crate::error::Error;
use crate::expiration::{Clock, SystemClock};
use crate::transport::TransportConfig;

/// Conventional envelope field wrapping JSON payloads.
pub const RESPONSE_DATA: &str = "data";

const APP_HEADER: HeaderName = HeaderName::from_static("x-skybell-app");

/// Login credentials. Both halves are needed before a login is attempted.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub username: Option<String>,
    pub password: Option<SecretString>,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: SecretString) -> Self {
        Self {
            username: Some(username.into()),
            password: Some(password),
        }
    }
}

/// One logical HTTP operation.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Value>,
}

impl Request {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn delete(url: Url) -> Self {
        Self::new(Method::DELETE, url)
    }

    pub fn post(url: Url, body: Value) -> Self {
        Self::new(Method::POST, url).with_body(body)
    }

    pub fn put(url: Url, body: Value) -> Self {
        Self::new(Method::PUT, url).with_body(body)
    }

    pub fn patch(url: Url, body: Value) -> Self {
        Self::new(Method::PATCH, url).with_body(body)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

/// A parsed response body.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// `application/json`, with the `data` envelope already stripped.
    Json(Value),
    /// Anything else, untouched.
    Bytes(Bytes),
}

impl Payload {
    pub fn into_json(self) -> Result<Value, Error> {
        match self {
            Self::Json(value) => Ok(value),
            Self::Bytes(bytes) => Err(Error::Deserialization {
                message: "expected a JSON response, got a binary body".into(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            }),
        }
    }

    /// The JSON object body; anything else is an empty map.
    pub fn into_object(self) -> Map<String, Value> {
        match self {
            Self::Json(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }

    pub fn into_bytes(self) -> Result<Bytes, Error> {
        match self {
            Self::Bytes(bytes) => Ok(bytes),
            Self::Json(value) => Ok(Bytes::from(serde_json::to_vec(&value)?)),
        }
    }
}

/// Which pass of the dispatcher a request is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    First,
    Retry,
}

/// Session-aware HTTP client for the device API.
///
/// Owns the single `reqwest::Client` for its lifetime (released on
/// logout) and shares the [`AuthCache`] with whoever constructed it.
pub struct ApiClient {
    http: RwLock<Option<reqwest::Client>>,
    endpoints: Endpoints,
    pub(crate) cache: Arc<AuthCache>,
    pub(crate) credentials: RwLock<Credentials>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) login_cooldown: Option<Duration>,
}

impl ApiClient {
    /// Create a client from a `TransportConfig`.
    pub fn new(
        endpoints: Endpoints,
        cache: Arc<AuthCache>,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, endpoints, cache))
    }

    /// Create a client around a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, endpoints: Endpoints, cache: Arc<AuthCache>) -> Self {
        Self {
            http: RwLock::new(Some(http)),
            endpoints,
            cache,
            credentials: RwLock::new(Credentials::default()),
            clock: Arc::new(SystemClock),
            login_cooldown: None,
        }
    }

    /// Store credentials for the implicit logins the dispatcher performs.
    pub fn with_credentials(self, credentials: Credentials) -> Self {
        *self.credentials_mut() = credentials;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Pause after each successful login to respect upstream rate limits.
    pub fn with_login_cooldown(mut self, cooldown: Option<Duration>) -> Self {
        self.login_cooldown = cooldown;
        self
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn cache(&self) -> &Arc<AuthCache> {
        &self.cache
    }

    /// The stored username, if any.
    pub fn username(&self) -> Option<String> {
        self.credentials_ref().username.clone()
    }

    /// `false` once logout has released the HTTP client.
    pub fn is_open(&self) -> bool {
        self.http_ref().is_some()
    }

    // ── Dispatch ─────────────────────────────────────────────────────

    /// Send a request, logging in first if needed and retrying once
    /// after a connection failure.
    pub async fn send(&self, request: Request) -> Result<Payload, Error> {
        self.send_with(request, true).await
    }

    /// Send a request with explicit control over the single retry.
    ///
    /// With `allow_retry`, a connection-level failure (no HTTP status)
    /// triggers one login followed by exactly one more attempt. HTTP
    /// status failures are never retried.
    pub async fn send_with(&self, request: Request, allow_retry: bool) -> Result<Payload, Error> {
        if !self.is_login(&request.url) && self.cache.authentication().await.is_empty() {
            self.implicit_login(&request.url).await?;
        }

        let mut attempt = Attempt::First;
        loop {
            match self.execute(&request).await {
                Err(err)
                    if err.is_connection_failure() && allow_retry && attempt == Attempt::First =>
                {
                    warn!(url = %request.url, error = %err, "request failed, logging in and retrying once");
                    self.login(None, None).await?;
                    attempt = Attempt::Retry;
                }
                result => return result,
            }
        }
    }

    async fn implicit_login(&self, url: &Url) -> Result<(), Error> {
        match self.login(None, None).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(Error::Authentication {
                message: format!("failed login, unable to send request: {url}"),
            }),
            Err(err @ Error::Authentication { .. }) => Err(err),
            Err(err) => Err(Error::Authentication {
                message: format!("failed login ({err}), unable to send request: {url}"),
            }),
        }
    }

    /// Issue one HTTP request and classify the response. No login, no retry.
    pub(crate) async fn execute(&self, request: &Request) -> Result<Payload, Error> {
        let http = self.http_ref().clone().ok_or(Error::ClientClosed)?;
        let headers = self.request_headers(request).await;

        debug!(method = %request.method, url = %request.url, "sending request");

        let mut builder = http
            .request(request.method.clone(), request.url.clone())
            .headers(headers);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        let resp = builder.send().await?;
        let status = resp.status();

        if status == reqwest::StatusCode::UNAUTHORIZED
            || (status == reqwest::StatusCode::FORBIDDEN && self.is_login(&request.url))
        {
            let body = resp.text().await.unwrap_or_default();
            if let Err(e) = self.cache.clear(AUTHENTICATION_RESULT).await {
                warn!(error = %e, "failed to persist cleared session");
            }
            return Err(Error::Authentication {
                message: status_message(status, &body),
            });
        }

        if status == reqwest::StatusCode::FORBIDDEN || status == reqwest::StatusCode::NOT_FOUND {
            let body = resp.text().await.unwrap_or_default();
            debug!(url = %request.url, %status, "resource no longer available");
            return Err(Error::UnknownResource {
                message: status_message(status, &body),
            });
        }

        if status == reqwest::StatusCode::BAD_REQUEST {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::BadRequest {
                message: status_message(status, &body),
            });
        }

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Http {
                status: status.as_u16(),
                message: status_message(status, &body),
            });
        }

        let is_json = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.trim_start().starts_with("application/json"));
        // The server has acted on the request by now; a broken body must
        // not look like a connection failure to the retry loop.
        let body = resp.bytes().await.map_err(|e| Error::Deserialization {
            message: format!("failed to read response body: {e}"),
            body: String::new(),
        })?;

        if !is_json {
            return Ok(Payload::Bytes(body));
        }

        let value: Value = serde_json::from_slice(&body).map_err(|e| {
            let text = String::from_utf8_lossy(&body).into_owned();
            Error::Deserialization {
                message: format!("{e} (body preview: {:?})", preview(&text)),
                body: text,
            }
        })?;
        Ok(Payload::Json(unwrap_data(value)))
    }

    /// Caller headers plus, for the API host, the bearer token and the
    /// fixed content/app headers.
    async fn request_headers(&self, request: &Request) -> HeaderMap {
        let mut headers = request.headers.clone();
        if !self.endpoints.is_api_host(&request.url) {
            return headers;
        }

        if let Some(token) = self.cache.authentication().await.access_token {
            if let Ok(mut value) =
                HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
            {
                value.set_sensitive(true);
                headers.insert(AUTHORIZATION, value);
            }
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
        headers.insert(APP_HEADER, HeaderValue::from_static(APP_VERSION));
        headers
    }

    pub(crate) fn is_login(&self, url: &Url) -> bool {
        self.endpoints.login().is_ok_and(|login| &login == url)
    }

    /// Drop the HTTP client. Returns `true` if one was held.
    pub(crate) fn release_http(&self) -> bool {
        self.http
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take()
            .is_some()
    }

    fn http_ref(&self) -> std::sync::RwLockReadGuard<'_, Option<reqwest::Client>> {
        self.http
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub(crate) fn credentials_ref(&self) -> std::sync::RwLockReadGuard<'_, Credentials> {
        self.credentials
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub(crate) fn credentials_mut(&self) -> std::sync::RwLockWriteGuard<'_, Credentials> {
        self.credentials
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Strip the `data` envelope when present.
fn unwrap_data(value: Value) -> Value {
    match value {
        Value::Object(mut map) if map.contains_key(RESPONSE_DATA) => {
            map.remove(RESPONSE_DATA).unwrap_or(Value::Null)
        }
        other => other,
    }
}

fn status_message(status: reqwest::StatusCode, body: &str) -> String {
    if body.is_empty() {
        format!("HTTP {status}")
    } else {
        format!("HTTP {status}: {}", preview(body))
    }
}

fn preview(body: &str) -> &str {
    match body.char_indices().nth(200) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}
