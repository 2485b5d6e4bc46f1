// Persistent blob storage for the auth cache
//
// The cache never cares where its bytes live. `FileBlobStore` is the
// default; `MemoryBlobStore` backs tests and embedders that persist
// elsewhere.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::trace;

use crate::error::Error;

/// Key-value blob store holding the serialized cache.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn exists(&self, path: &Path) -> Result<bool, Error>;
    async fn size(&self, path: &Path) -> Result<u64, Error>;
    async fn read(&self, path: &Path) -> Result<Vec<u8>, Error>;
    async fn write(&self, path: &Path, bytes: &[u8]) -> Result<(), Error>;
    async fn delete(&self, path: &Path) -> Result<(), Error>;
}

fn io_error(op: &str, path: &Path, err: &std::io::Error) -> Error {
    Error::Cache {
        message: format!("{op} {}: {err}", path.display()),
    }
}

/// Stores blobs as plain files.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileBlobStore;

#[async_trait]
impl BlobStore for FileBlobStore {
    async fn exists(&self, path: &Path) -> Result<bool, Error> {
        tokio::fs::try_exists(path)
            .await
            .map_err(|e| io_error("stat", path, &e))
    }

    async fn size(&self, path: &Path) -> Result<u64, Error> {
        let meta = tokio::fs::metadata(path)
            .await
            .map_err(|e| io_error("stat", path, &e))?;
        Ok(meta.len())
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>, Error> {
        tokio::fs::read(path)
            .await
            .map_err(|e| io_error("read", path, &e))
    }

    async fn write(&self, path: &Path, bytes: &[u8]) -> Result<(), Error> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error("create", parent, &e))?;
        }
        trace!(path = %path.display(), len = bytes.len(), "writing cache blob");
        tokio::fs::write(path, bytes)
            .await
            .map_err(|e| io_error("write", path, &e))
    }

    async fn delete(&self, path: &Path) -> Result<(), Error> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error("delete", path, &e)),
        }
    }
}

/// In-memory blob store.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<PathBuf, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a blob, e.g. to simulate a cache left by a previous run.
    pub fn insert(&self, path: impl Into<PathBuf>, bytes: Vec<u8>) {
        self.lock().insert(path.into(), bytes);
    }

    /// Current contents of a blob.
    pub fn get(&self, path: &Path) -> Option<Vec<u8>> {
        self.lock().get(path).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<PathBuf, Vec<u8>>> {
        self.blobs
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn exists(&self, path: &Path) -> Result<bool, Error> {
        Ok(self.lock().contains_key(path))
    }

    async fn size(&self, path: &Path) -> Result<u64, Error> {
        self.lock()
            .get(path)
            .map(|b| u64::try_from(b.len()).unwrap_or(u64::MAX))
            .ok_or_else(|| Error::Cache {
                message: format!("no blob at {}", path.display()),
            })
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>, Error> {
        self.lock().get(path).cloned().ok_or_else(|| Error::Cache {
            message: format!("no blob at {}", path.display()),
        })
    }

    async fn write(&self, path: &Path, bytes: &[u8]) -> Result<(), Error> {
        self.lock().insert(path.to_path_buf(), bytes.to_vec());
        Ok(())
    }

    async fn delete(&self, path: &Path) -> Result<(), Error> {
        self.lock().remove(path);
        Ok(())
    }
}
