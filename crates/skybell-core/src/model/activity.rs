// ── Activity domain types ──

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::config::FieldMap;

/// When an activity happened.
///
/// The API sends ISO-8601 strings; older payloads carry Unix
/// milliseconds. Both parse into the same instant and serialize back as
/// RFC 3339. Text in any other format is kept verbatim and ordered
/// lexically, so an activity is never dropped for an odd timestamp.
#[derive(Debug, Clone)]
pub enum EventTime {
    Parsed(DateTime<Utc>),
    Raw(String),
}

impl EventTime {
    pub const EPOCH: Self = Self::Parsed(DateTime::<Utc>::UNIX_EPOCH);

    pub fn new(at: DateTime<Utc>) -> Self {
        Self::Parsed(at)
    }

    pub fn from_millis(millis: i64) -> Option<Self> {
        DateTime::from_timestamp_millis(millis).map(Self::Parsed)
    }

    /// Parse text, keeping it verbatim when it is not RFC 3339.
    pub fn from_text(text: &str) -> Self {
        let text = text.trim();
        DateTime::parse_from_rfc3339(text).map_or_else(
            |_| Self::Raw(text.to_owned()),
            |dt| Self::Parsed(dt.with_timezone(&Utc)),
        )
    }

    /// The instant, when the wire value could be parsed.
    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Parsed(at) => Some(*at),
            Self::Raw(_) => None,
        }
    }

    /// Read a raw JSON field; `None` for anything but a number or
    /// non-blank text.
    pub fn from_value(value: &Value) -> Option<Self> {
        Self::deserialize(value).ok()
    }
}

impl fmt::Display for EventTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parsed(at) => f.write_str(&at.to_rfc3339_opts(SecondsFormat::Millis, true)),
            Self::Raw(text) => f.write_str(text),
        }
    }
}

impl Ord for EventTime {
    /// Instants compare in time, raw text compares lexically, and a mix
    /// compares the rendered instant against the raw text.
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Parsed(a), Self::Parsed(b)) => a.cmp(b),
            (Self::Raw(a), Self::Raw(b)) => a.cmp(b),
            (Self::Parsed(_), Self::Raw(b)) => self.to_string().as_str().cmp(b.as_str()),
            (Self::Raw(a), Self::Parsed(_)) => a.as_str().cmp(other.to_string().as_str()),
        }
    }
}

impl PartialOrd for EventTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for EventTime {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for EventTime {}

impl Serialize for EventTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawEventTime {
    Millis(i64),
    Text(String),
}

impl<'de> Deserialize<'de> for EventTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match RawEventTime::deserialize(deserializer)? {
            RawEventTime::Millis(ms) => Self::from_millis(ms)
                .ok_or_else(|| serde::de::Error::custom(format!("timestamp out of range: {ms}"))),
            RawEventTime::Text(s) if s.trim().is_empty() => {
                Err(serde::de::Error::custom("empty timestamp"))
            }
            RawEventTime::Text(s) => Ok(Self::from_text(&s)),
        }
    }
}

/// One entry of a device's activity history.
///
/// The well-known fields are lifted out of the raw object; the object
/// itself is kept whole so nothing the server sent is lost.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Activity {
    pub id: String,
    pub event_type: String,
    pub event_time: Option<EventTime>,
    pub video_url: Option<String>,
    pub raw: Map<String, Value>,
}

impl Activity {
    /// Read an activity out of a JSON object. Non-objects yield `None`.
    pub fn from_json(value: Value, fields: &FieldMap) -> Option<Self> {
        let Value::Object(raw) = value else {
            return None;
        };
        let text = |key: &str| raw.get(key).and_then(Value::as_str).map(str::to_owned);

        Some(Self {
            id: text(&fields.activity_id).unwrap_or_default(),
            event_type: text(&fields.event_type).unwrap_or_default(),
            event_time: raw.get(&fields.event_time).and_then(EventTime::from_value),
            video_url: text(&fields.video_url).filter(|url| !url.is_empty()),
            raw,
        })
    }

    /// Stand-in returned when no activity of a requested type exists.
    pub fn placeholder() -> Self {
        Self {
            event_time: Some(EventTime::EPOCH),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty() && self.event_time.is_none()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn event_time_accepts_both_wire_forms() {
        let text = EventTime::from_value(&json!("2024-06-15T10:00:00.000Z")).unwrap();
        let millis = EventTime::from_value(&json!(1_718_445_600_000_i64)).unwrap();
        assert_eq!(text, millis);
        assert_eq!(text.to_string(), "2024-06-15T10:00:00.000Z");
        assert!(EventTime::from_value(&json!({})).is_none());
        assert!(EventTime::from_value(&json!("  ")).is_none());
    }

    #[test]
    fn unparsed_text_is_kept_and_ordered_lexically() {
        let earlier = EventTime::from_value(&json!("2024-06-15 09:00:00")).unwrap();
        let later = EventTime::from_value(&json!("2024-06-15 10:00:00")).unwrap();
        assert_eq!(earlier, EventTime::Raw("2024-06-15 09:00:00".into()));
        assert!(earlier.as_datetime().is_none());
        assert!(later > earlier);
        assert_eq!(later.to_string(), "2024-06-15 10:00:00");

        let parsed = EventTime::from_value(&json!("2024-06-15T10:00:00Z")).unwrap();
        assert!(parsed > EventTime::Raw("2024-06-15 23:59:59".into()));
        assert!(EventTime::EPOCH < parsed);
    }

    #[test]
    fn activity_lifts_known_fields_and_keeps_raw() {
        let activity = Activity::from_json(
            json!({
                "activity_id": "a1",
                "event_type": "device:sensor:motion",
                "event_time": "2024-06-15T10:00:00Z",
                "video_url": "",
                "extra": true
            }),
            &FieldMap::default(),
        )
        .unwrap();

        assert_eq!(activity.id, "a1");
        assert_eq!(activity.event_type, "device:sensor:motion");
        assert!(activity.event_time.is_some());
        assert!(activity.video_url.is_none());
        assert_eq!(activity.raw["extra"], json!(true));
    }

    #[test]
    fn placeholder_sits_at_epoch() {
        let p = Activity::placeholder();
        assert_eq!(p.event_time, Some(EventTime::EPOCH));
        assert!(!p.is_empty());
        assert!(Activity::default().is_empty());
    }
}
