// skybell-core: Device state aggregation on top of skybell-api.
//
// The registry and event index are pure data structures; `Skybell` is
// the facade that fetches payloads and feeds them in.

pub mod config;
pub mod error;
pub mod events;
pub mod model;
pub mod registry;
pub mod settings;
pub mod skybell;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{CacheLocation, ClientConfig, FieldMap};
pub use error::CoreError;
pub use events::EventIndex;
pub use model::{Activity, DeviceImages, DeviceRecord, DeviceStatus, EventTime};
pub use registry::DeviceRegistry;
pub use settings::{Setting, SettingValue};
pub use skybell::{Skybell, UpdateOptions};
