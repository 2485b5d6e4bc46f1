// skybell-api: Async Rust client for the SkyBell device API
//
// Session handling (login/refresh/logout), the persistent auth cache,
// and the single-retry request dispatcher. Device state lives in
// `skybell-core`.

pub mod cache;
pub mod client;
pub mod endpoints;
pub mod error;
pub mod expiration;
pub mod merge;
pub mod resources;
pub mod session;
pub mod store;
pub mod transport;

pub use cache::{AUTHENTICATION_RESULT, AuthCache, AuthenticationMaterial};
pub use client::{ApiClient, Credentials, Payload, Request};
pub use endpoints::Endpoints;
pub use error::Error;
pub use expiration::{Clock, SystemClock, compute_expiration};
pub use merge::{deep_merge, deep_merge_value};
pub use store::{BlobStore, FileBlobStore, MemoryBlobStore};
pub use transport::TransportConfig;

pub use bytes::Bytes;
pub use reqwest::Method;
