// ── Per-device "latest activity" index ──
//
// Folds an activity list into event type -> most recent activity.
// The index is rebuilt from scratch on every ingest: the server returns
// a single page of history, so a type whose last occurrence falls out of
// that page drops out of the index until it happens again.

use indexmap::IndexMap;

use crate::model::{Activity, EventTime};

/// Event-type prefix for hardware-triggered events.
pub const SENSOR_PREFIX: &str = "device:sensor:";
/// Event-type prefix for app-triggered events.
pub const APPLICATION_PREFIX: &str = "application:on-";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventIndex {
    latest: IndexMap<String, Activity>,
}

impl EventIndex {
    /// Build the index from `activities`.
    ///
    /// A later entry with an equal time replaces an earlier one.
    /// Activities without a type or a time are not indexed.
    pub fn rebuild(activities: &[Activity]) -> Self {
        let mut latest: IndexMap<String, Activity> = IndexMap::new();
        for activity in activities {
            let Some(time) = &activity.event_time else {
                continue;
            };
            if activity.event_type.is_empty() {
                continue;
            }
            let newer = latest
                .get(&activity.event_type)
                .and_then(|old| old.event_time.as_ref())
                .is_none_or(|old| time >= old);
            if newer {
                latest.insert(activity.event_type.clone(), activity.clone());
            }
        }
        Self { latest }
    }

    pub fn get(&self, event_type: &str) -> Option<&Activity> {
        self.latest.get(event_type)
    }

    pub fn len(&self) -> usize {
        self.latest.len()
    }

    pub fn is_empty(&self) -> bool {
        self.latest.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Activity)> {
        self.latest.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// The most recent activity.
    ///
    /// Without a filter: the newest across all types, or an empty record.
    /// With a short type name such as `"motion"`: the sensor event
    /// (`device:sensor:motion`), else the app event
    /// (`application:on-motion`), else a placeholder dated at the epoch.
    pub fn latest(&self, event_type: Option<&str>) -> Activity {
        match event_type {
            Some(short) => self
                .get(&format!("{SENSOR_PREFIX}{short}"))
                .or_else(|| self.get(&format!("{APPLICATION_PREFIX}{short}")))
                .cloned()
                .unwrap_or_else(Activity::placeholder),
            None => self.newest().cloned().unwrap_or_default(),
        }
    }

    fn newest(&self) -> Option<&Activity> {
        let mut best: Option<(&Activity, &EventTime)> = None;
        for activity in self.latest.values() {
            let Some(time) = &activity.event_time else {
                continue;
            };
            if best.is_none_or(|(_, t)| time > t) {
                best = Some((activity, time));
            }
        }
        best.map(|(activity, _)| activity)
    }
}
