// Typed endpoint helpers
//
// Thin wrappers over `ApiClient::send` for each REST path. They return
// the unwrapped JSON payload; interpreting fragments is the caller's job.

use bytes::Bytes;
use serde_json::Value;
use tracing::debug;

use crate::client::{ApiClient, Request};
use crate::error::Error;

impl ApiClient {
    /// The logged-in user's profile.
    ///
    /// `GET user/`
    pub async fn get_user(&self) -> Result<Value, Error> {
        let url = self.endpoints().user()?;
        self.send(Request::get(url)).await?.into_json()
    }

    /// The device listing (`{rows: [...]}`).
    ///
    /// `GET devices/`
    pub async fn list_devices(&self) -> Result<Value, Error> {
        let url = self.endpoints().devices()?;
        debug!("listing devices");
        self.send(Request::get(url)).await?.into_json()
    }

    /// `GET devices/{id}/`
    pub async fn get_device(&self, device_id: &str) -> Result<Value, Error> {
        let url = self.endpoints().device(device_id)?;
        self.send(Request::get(url)).await?.into_json()
    }

    /// `PATCH devices/{id}/`
    pub async fn patch_device(&self, device_id: &str, body: Value) -> Result<Value, Error> {
        let url = self.endpoints().device(device_id)?;
        debug!(device_id, "patching device");
        self.send(Request::patch(url, body)).await?.into_json()
    }

    /// The avatar snapshot (`{date_time, preview}`).
    ///
    /// `GET devices/{id}/snapshot/`
    pub async fn get_snapshot(&self, device_id: &str) -> Result<Value, Error> {
        let url = self.endpoints().device_snapshot(device_id)?;
        self.send(Request::get(url)).await?.into_json()
    }

    /// Submit a settings fragment; the server answers with the accepted settings.
    ///
    /// `POST devices/{id}/settings/`
    pub async fn post_settings(&self, device_id: &str, settings: Value) -> Result<Value, Error> {
        let url = self.endpoints().device_settings(device_id)?;
        debug!(device_id, "updating device settings");
        self.send(Request::post(url, settings)).await?.into_json()
    }

    /// Recent activity for one device (`{rows: [...]}`).
    ///
    /// The server returns its default page; there is no pagination.
    ///
    /// `GET activity?device_id={id}`
    pub async fn list_activities(&self, device_id: &str) -> Result<Value, Error> {
        let url = self.endpoints().device_activities(device_id)?;
        self.send(Request::get(url)).await?.into_json()
    }

    /// `GET activity/{id}/`
    pub async fn get_activity(&self, activity_id: &str) -> Result<Value, Error> {
        let url = self.endpoints().activity(activity_id)?;
        self.send(Request::get(url)).await?.into_json()
    }

    /// `DELETE activity/{id}/`
    pub async fn delete_activity(&self, activity_id: &str) -> Result<(), Error> {
        let url = self.endpoints().activity(activity_id)?;
        debug!(activity_id, "deleting activity");
        self.send(Request::delete(url)).await?;
        Ok(())
    }

    /// Video container metadata (`{download_url, ...}`).
    ///
    /// `GET activity/{id}/video/`
    pub async fn get_activity_video(&self, activity_id: &str) -> Result<Value, Error> {
        let url = self.endpoints().activity_video(activity_id)?;
        self.send(Request::get(url)).await?.into_json()
    }

    /// `GET` an arbitrary JSON reference (relative to the API base or absolute).
    pub async fn get_reference(&self, reference: &str) -> Result<Value, Error> {
        let url = self.endpoints().resolve(reference)?;
        self.send(Request::get(url)).await?.into_json()
    }

    /// Download raw bytes from a server-supplied URL (e.g. a signed video link).
    pub async fn download(&self, reference: &str) -> Result<Bytes, Error> {
        let url = self.endpoints().resolve(reference)?;
        debug!(url = %url, "downloading");
        self.send(Request::get(url)).await?.into_bytes()
    }
}
