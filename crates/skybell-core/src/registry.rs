// ── Device registry ──
//
// Concurrent map of device id -> aggregated record. Records are
// immutable behind `Arc`; every change clones, modifies and re-inserts,
// so readers never hold a lock across an await and the last writer wins.

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::FieldMap;
use crate::model::DeviceRecord;

#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: DashMap<String, Arc<DeviceRecord>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn get(&self, device_id: &str) -> Option<Arc<DeviceRecord>> {
        self.devices.get(device_id).map(|r| Arc::clone(r.value()))
    }

    /// All devices, ordered by id.
    pub fn list(&self) -> Vec<Arc<DeviceRecord>> {
        let mut devices: Vec<_> = self.devices.iter().map(|r| Arc::clone(r.value())).collect();
        devices.sort_by(|a, b| a.id().cmp(b.id()));
        devices
    }

    /// Merge listing rows into the registry: existing devices get the
    /// row deep-merged into their profile, unknown ids create a record.
    /// Returns how many devices were new.
    pub fn ingest_listing(&self, rows: Vec<Value>, fields: &FieldMap) -> usize {
        let mut created = 0;
        for row in rows {
            let Value::Object(profile) = row else {
                warn!("skipping non-object device row");
                continue;
            };
            let Some(id) = profile
                .get(&fields.device_id)
                .and_then(Value::as_str)
                .map(str::to_owned)
            else {
                warn!(field = %fields.device_id, "skipping device row without id");
                continue;
            };

            let record = match self.get(&id) {
                Some(existing) => {
                    let mut record = (*existing).clone();
                    record.merge_profile(profile);
                    record
                }
                None => {
                    debug!(device_id = %id, "new device");
                    created += 1;
                    DeviceRecord::new(id.clone(), profile)
                }
            };
            self.devices.insert(id, Arc::new(record));
        }
        created
    }

    /// Apply `f` to a copy of the device and store the result.
    pub fn update<F>(&self, device_id: &str, f: F) -> Option<Arc<DeviceRecord>>
    where
        F: FnOnce(&mut DeviceRecord),
    {
        let mut record = (*self.get(device_id)?).clone();
        f(&mut record);
        let record = Arc::new(record);
        self.devices
            .insert(device_id.to_owned(), Arc::clone(&record));
        Some(record)
    }

    pub fn clear(&self) {
        self.devices.clear();
    }
}
