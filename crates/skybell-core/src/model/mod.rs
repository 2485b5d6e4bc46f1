// ── Domain model ──

mod activity;
pub mod device;

pub use activity::{Activity, EventTime};
pub use device::{DeviceImages, DeviceRecord, DeviceStatus};

use serde_json::Value;

use crate::config::FieldMap;

/// Rows of a listing payload (`{rows: [...]}`). A bare array is taken
/// as the rows themselves; anything else has none.
pub fn rows(payload: Value, fields: &FieldMap) -> Vec<Value> {
    match payload {
        Value::Array(rows) => rows,
        Value::Object(mut map) => match map.remove(&fields.rows) {
            Some(Value::Array(rows)) => rows,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

/// Parse every row of an activity listing.
pub fn activities(payload: Value, fields: &FieldMap) -> Vec<Activity> {
    rows(payload, fields)
        .into_iter()
        .filter_map(|row| Activity::from_json(row, fields))
        .collect()
}
