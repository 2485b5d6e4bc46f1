// REST endpoint layout
//
// Every path hangs off one versioned base URL. Only requests whose origin
// matches that base get the bearer token and app headers.

use url::Url;

use crate::error::Error;

/// Production API root.
pub const DEFAULT_BASE_URL: &str = "https://api.skybell.network/api/v5/";

/// Value of the `x-skybell-app` header.
pub const APP_VERSION: &str = "1.238.1";

/// URL builder for the API's path templates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    base: Url,
}

impl Default for Endpoints {
    fn default() -> Self {
        let base = Url::parse(DEFAULT_BASE_URL).expect("default base URL is valid");
        Self { base }
    }
}

impl Endpoints {
    /// Build endpoints under `base`. A trailing slash is added when missing
    /// so relative joins stay under the versioned prefix.
    pub fn new(mut base: Url) -> Self {
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Self { base }
    }

    pub fn parse(base: &str) -> Result<Self, Error> {
        Ok(Self::new(Url::parse(base)?))
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// `true` when `url` targets the API host (auth headers apply).
    pub fn is_api_host(&self, url: &Url) -> bool {
        url.origin() == self.base.origin()
    }

    pub fn login(&self) -> Result<Url, Error> {
        self.join("login/")
    }

    pub fn token(&self) -> Result<Url, Error> {
        self.join("token/")
    }

    pub fn user(&self) -> Result<Url, Error> {
        self.join("user/")
    }

    pub fn devices(&self) -> Result<Url, Error> {
        self.join("devices/")
    }

    /// `devices/{id}/`
    pub fn device(&self, device_id: &str) -> Result<Url, Error> {
        self.join(&format!("devices/{device_id}/"))
    }

    /// `devices/{id}/snapshot/`
    pub fn device_snapshot(&self, device_id: &str) -> Result<Url, Error> {
        self.join(&format!("devices/{device_id}/snapshot/"))
    }

    /// `devices/{id}/settings/`
    pub fn device_settings(&self, device_id: &str) -> Result<Url, Error> {
        self.join(&format!("devices/{device_id}/settings/"))
    }

    /// `activity?device_id={id}`
    pub fn device_activities(&self, device_id: &str) -> Result<Url, Error> {
        let mut url = self.join("activity")?;
        url.query_pairs_mut().append_pair("device_id", device_id);
        Ok(url)
    }

    /// `activity/{id}/`
    pub fn activity(&self, activity_id: &str) -> Result<Url, Error> {
        self.join(&format!("activity/{activity_id}/"))
    }

    /// `activity/{id}/video/`
    pub fn activity_video(&self, activity_id: &str) -> Result<Url, Error> {
        self.join(&format!("activity/{activity_id}/video/"))
    }

    /// Resolve a server-supplied reference: absolute URLs pass through,
    /// anything else is taken relative to the API base.
    pub fn resolve(&self, reference: &str) -> Result<Url, Error> {
        match Url::parse(reference) {
            Ok(url) => Ok(url),
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                self.join(reference.trim_start_matches('/'))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn join(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base.join(path)?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn paths_stay_under_versioned_base() {
        let ep = Endpoints::default();
        assert_eq!(
            ep.login().unwrap().as_str(),
            "https://api.skybell.network/api/v5/login/"
        );
        assert_eq!(
            ep.device_snapshot("abc").unwrap().as_str(),
            "https://api.skybell.network/api/v5/devices/abc/snapshot/"
        );
        assert_eq!(
            ep.device_activities("abc").unwrap().as_str(),
            "https://api.skybell.network/api/v5/activity?device_id=abc"
        );
        assert_eq!(
            ep.activity_video("act1").unwrap().as_str(),
            "https://api.skybell.network/api/v5/activity/act1/video/"
        );
    }

    #[test]
    fn base_without_trailing_slash_is_normalized() {
        let ep = Endpoints::parse("http://127.0.0.1:9000/api/v5").unwrap();
        assert_eq!(ep.user().unwrap().as_str(), "http://127.0.0.1:9000/api/v5/user/");
    }

    #[test]
    fn resolve_handles_relative_and_absolute_references() {
        let ep = Endpoints::default();
        assert_eq!(
            ep.resolve("/activity/a1/video").unwrap().as_str(),
            "https://api.skybell.network/api/v5/activity/a1/video"
        );
        let s3 = "https://bucket.s3.amazonaws.com/v.mp4?sig=1";
        assert_eq!(ep.resolve(s3).unwrap().as_str(), s3);
        assert!(!ep.is_api_host(&ep.resolve(s3).unwrap()));
    }
}
