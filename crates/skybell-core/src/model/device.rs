// ── Device domain types ──
//
// A device is the deep-merged union of every fragment the API returned
// for it: profile (with nested settings and telemetry), snapshot, and
// the last activity page.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use strum::{Display, EnumString};

use skybell_api::deep_merge;

use super::Activity;
use crate::events::EventIndex;

pub const NAME: &str = "name";
pub const HARDWARE: &str = "hardware";
pub const ACCOUNT_ID: &str = "account_id";
pub const SETTINGS: &str = "settings";
pub const DEVICE_SETTINGS: &str = "device_settings";
pub const TELEMETRY: &str = "telemetry";
pub const MAC_ADDRESS: &str = "MAC_address";
pub const SERIAL_NUMBER: &str = "serial_number";
pub const FIRMWARE_VERSION: &str = "firmware_version";
pub const LINK_QUALITY: &str = "link_quality";
pub const ESSID: &str = "essid";
pub const LAST_CONNECTED: &str = "last_connected";
pub const LAST_DISCONNECTED: &str = "last_disconnected";
pub const LED_COLOR: &str = "led_color";

/// Connectivity derived from the last connect/disconnect timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub enum DeviceStatus {
    Up,
    Down,
}

/// Decoded image bytes kept alongside a device.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceImages {
    /// Latest snapshot, decoded from the snapshot `preview`.
    pub avatar: Option<Bytes>,
    /// Media downloaded for the most recent activity.
    pub activity: Option<Bytes>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceRecord {
    id: String,
    pub profile: Map<String, Value>,
    pub snapshot: Map<String, Value>,
    pub activities: Vec<Activity>,
    pub events: EventIndex,
    pub images: DeviceImages,
}

impl DeviceRecord {
    pub fn new(id: impl Into<String>, profile: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            profile,
            ..Self::default()
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn merge_profile(&mut self, fragment: Map<String, Value>) {
        deep_merge(&mut self.profile, fragment);
    }

    /// Merge a fragment into the nested `settings` object.
    pub fn merge_settings(&mut self, fragment: Map<String, Value>) {
        let mut partial = Map::new();
        partial.insert(SETTINGS.into(), Value::Object(fragment));
        deep_merge(&mut self.profile, partial);
    }

    /// Replace the activity history and rebuild the event index from it.
    pub fn set_activities(&mut self, activities: Vec<Activity>) {
        self.events = EventIndex::rebuild(&activities);
        self.activities = activities;
    }

    /// Up to `limit` activities in stored order, optionally restricted to
    /// one exact event type.
    pub fn activities(&self, limit: usize, event_type: Option<&str>) -> Vec<&Activity> {
        self.activities
            .iter()
            .filter(|a| event_type.is_none_or(|t| a.event_type == t))
            .take(limit)
            .collect()
    }

    /// See [`EventIndex::latest`].
    pub fn latest(&self, event_type: Option<&str>) -> Activity {
        self.events.latest(event_type)
    }

    // ── Typed accessors ──────────────────────────────────────────────

    pub fn name(&self) -> &str {
        str_field(&self.profile, NAME)
    }

    pub fn hardware(&self) -> &str {
        str_field(&self.profile, HARDWARE)
    }

    pub fn owner_id(&self) -> &str {
        str_field(&self.profile, ACCOUNT_ID)
    }

    pub fn settings(&self) -> Option<&Map<String, Value>> {
        self.profile.get(SETTINGS).and_then(Value::as_object)
    }

    pub fn device_settings(&self) -> Option<&Map<String, Value>> {
        self.profile.get(DEVICE_SETTINGS).and_then(Value::as_object)
    }

    pub fn telemetry(&self) -> Option<&Map<String, Value>> {
        self.profile.get(TELEMETRY).and_then(Value::as_object)
    }

    pub fn mac(&self) -> &str {
        self.device_settings().map_or("", |s| str_field(s, MAC_ADDRESS))
    }

    pub fn serial_no(&self) -> &str {
        self.device_settings().map_or("", |s| str_field(s, SERIAL_NUMBER))
    }

    pub fn firmware_version(&self) -> &str {
        self.device_settings()
            .map_or("", |s| str_field(s, FIRMWARE_VERSION))
    }

    pub fn wifi_link_quality(&self) -> &str {
        self.telemetry().map_or("", |t| str_field(t, LINK_QUALITY))
    }

    pub fn wifi_ssid(&self) -> &str {
        match self.telemetry().map(|t| str_field(t, ESSID)) {
            Some(ssid) if !ssid.is_empty() => ssid,
            _ => str_field(&self.profile, ESSID),
        }
    }

    /// The stored LED color (`#rrggbb`), if one is set.
    pub fn led_color(&self) -> Option<&str> {
        self.settings()
            .and_then(|s| s.get(LED_COLOR))
            .and_then(Value::as_str)
            .filter(|c| !c.is_empty())
    }

    pub fn last_connected(&self) -> Option<DateTime<Utc>> {
        time_field(&self.profile, LAST_CONNECTED)
    }

    pub fn last_disconnected(&self) -> Option<DateTime<Utc>> {
        time_field(&self.profile, LAST_DISCONNECTED)
    }

    /// Connected more recently than disconnected. Missing timestamps
    /// count as the epoch.
    pub fn is_up(&self) -> bool {
        let epoch = DateTime::<Utc>::UNIX_EPOCH;
        self.last_connected().unwrap_or(epoch) > self.last_disconnected().unwrap_or(epoch)
    }

    pub fn status(&self) -> DeviceStatus {
        if self.is_up() {
            DeviceStatus::Up
        } else {
            DeviceStatus::Down
        }
    }

    /// One-line summary.
    pub fn desc(&self) -> String {
        format!(
            "{} (id: {}) - {} - status: {} - wifi status: {}",
            self.name(),
            self.id,
            self.hardware(),
            self.status(),
            self.wifi_link_quality()
        )
    }
}

fn str_field<'a>(map: &'a Map<String, Value>, key: &str) -> &'a str {
    map.get(key).and_then(Value::as_str).unwrap_or("")
}

fn time_field(map: &Map<String, Value>, key: &str) -> Option<DateTime<Utc>> {
    map.get(key)
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EventTime;
    use serde_json::json;

    fn record() -> DeviceRecord {
        let Value::Object(profile) = json!({
            "name": "Front Door",
            "hardware": "SKYBELL_TRIMPLUS_1000030",
            "account_id": "u1",
            "last_connected": "2024-06-15T10:00:00Z",
            "last_disconnected": "2024-06-14T10:00:00Z",
            "device_settings": { "MAC_address": "aa:bb", "serial_number": "S1", "firmware_version": "7" },
            "telemetry": { "link_quality": "Good", "essid": "home" },
            "settings": { "led_color": "#ff0000", "do_not_ring": "False" }
        }) else {
            unreachable!()
        };
        DeviceRecord::new("dev1", profile)
    }

    #[test]
    fn accessors_read_nested_fragments() {
        let d = record();
        assert_eq!(d.id(), "dev1");
        assert_eq!(d.name(), "Front Door");
        assert_eq!(d.mac(), "aa:bb");
        assert_eq!(d.serial_no(), "S1");
        assert_eq!(d.firmware_version(), "7");
        assert_eq!(d.wifi_link_quality(), "Good");
        assert_eq!(d.wifi_ssid(), "home");
        assert_eq!(d.led_color(), Some("#ff0000"));
        assert_eq!(d.status(), DeviceStatus::Up);
        assert!(d.desc().contains("status: Up"));
    }

    #[test]
    fn merge_settings_preserves_siblings() {
        let mut d = record();
        let Value::Object(fragment) = json!({ "led_color": "" }) else {
            unreachable!()
        };
        d.merge_settings(fragment);
        assert_eq!(d.led_color(), None);
        assert_eq!(d.settings().and_then(|s| s.get("do_not_ring")), Some(&json!("False")));
        assert_eq!(d.name(), "Front Door");
    }

    #[test]
    fn missing_timestamps_mean_down() {
        let d = DeviceRecord::new("x", Map::new());
        assert_eq!(d.status(), DeviceStatus::Down);
        assert_eq!(d.mac(), "");
    }

    #[test]
    fn activities_filter_and_limit() {
        let mut d = record();
        let act = |t: &str, ms| Activity {
            event_type: t.into(),
            event_time: EventTime::from_millis(ms),
            ..Activity::default()
        };
        d.set_activities(vec![act("motion", 3), act("button", 2), act("motion", 1)]);

        assert_eq!(d.activities(1, None).len(), 1);
        assert_eq!(d.activities(10, Some("motion")).len(), 2);
        assert_eq!(d.activities(10, Some("ring")).len(), 0);
        assert_eq!(d.events.len(), 2);
    }
}
