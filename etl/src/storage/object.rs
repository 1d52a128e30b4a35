use crate::storage::StorageLocation;
use crate::utils::retry::retry_with_backoff;
use async_trait::async_trait;
use common::{Error, Result};
use futures::TryStreamExt;
use object_store::{ObjectStore, PutPayload};
use object_store::path::Path;
use std::sync::Arc;
use tracing::debug;

const PUT_RETRIES: u32 = 3;
const PUT_BASE_DELAY_MS: u64 = 100;

/// Key-level access to a storage root. Keys are `/`-separated and relative to
/// the root location.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn put_object(&self, key: &str, data: Vec<u8>) -> Result<()>;
    async fn get_object(&self, key: &str) -> Result<Vec<u8>>;
    /// Keys under `prefix`, sorted lexicographically.
    async fn list_objects(&self, prefix: &str) -> Result<Vec<String>>;
    async fn check_file_exists(&self, key: &str) -> Result<bool>;
    /// Removes a single key. Missing keys are not an error.
    async fn delete_object(&self, key: &str) -> Result<()>;
    /// Removes every key under `prefix`, returning how many were deleted.
    async fn delete_prefix(&self, prefix: &str) -> Result<usize>;
    fn location(&self) -> &StorageLocation;
    fn object_store(&self) -> Arc<dyn ObjectStore>;
}

/// [`ObjectStorage`] over any `object_store` backend (S3, local disk, memory).
pub struct LakeStorage {
    store: Arc<dyn ObjectStore>,
    location: StorageLocation,
}

impl LakeStorage {
    pub fn new(store: Arc<dyn ObjectStore>, location: StorageLocation) -> Self {
        Self { store, location }
    }

    async fn list_paths(&self, prefix: &str) -> Result<Vec<Path>> {
        let prefix_path = self.location.object_path(prefix)?;
        let prefix_ref = if prefix_path.as_ref().is_empty() {
            None
        } else {
            Some(&prefix_path)
        };

        let mut paths: Vec<Path> = self
            .store
            .list(prefix_ref)
            .map_ok(|meta| meta.location)
            .try_collect()
            .await
            .map_err(|e| {
                Error::Storage(format!(
                    "Failed to list '{}' under {}: {}",
                    prefix, self.location, e
                ))
            })?;

        paths.sort_by(|a, b| a.as_ref().cmp(b.as_ref()));
        Ok(paths)
    }
}

#[async_trait]
impl ObjectStorage for LakeStorage {
    async fn put_object(&self, key: &str, data: Vec<u8>) -> Result<()> {
        let path = self.location.object_path(key)?;
        let size = data.len();

        retry_with_backoff(PUT_RETRIES, PUT_BASE_DELAY_MS, || {
            let payload = PutPayload::from(data.clone());
            let path = &path;
            async move {
                self.store.put(path, payload).await.map_err(|e| {
                    Error::Storage(format!("Failed to put {}: {}", path, e))
                })?;
                Ok(())
            }
        })
        .await?;

        debug!(key = %path, bytes = size, "Object written");
        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.location.object_path(key)?;
        let result = self.store.get(&path).await.map_err(|e| match e {
            object_store::Error::NotFound { .. } => Error::Storage(format!(
                "Object {} not found under {}",
                key, self.location
            )),
            other => Error::Storage(other.to_string()),
        })?;

        let data = result
            .bytes()
            .await
            .map_err(|e| Error::Storage(e.to_string()))?
            .to_vec();

        Ok(data)
    }

    async fn list_objects(&self, prefix: &str) -> Result<Vec<String>> {
        let keys = self
            .list_paths(prefix)
            .await?
            .iter()
            .filter_map(|path| self.location.relative_key(path))
            .collect();
        Ok(keys)
    }

    async fn check_file_exists(&self, key: &str) -> Result<bool> {
        let path = self.location.object_path(key)?;
        match self.store.head(&path).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(Error::Storage(e.to_string())),
        }
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        let path = self.location.object_path(key)?;
        match self.store.delete(&path).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(Error::Storage(format!("Failed to delete {}: {}", path, e))),
        }
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<usize> {
        let paths = self.list_paths(prefix).await?;
        for path in &paths {
            match self.store.delete(path).await {
                Ok(()) | Err(object_store::Error::NotFound { .. }) => {}
                Err(e) => {
                    return Err(Error::Storage(format!("Failed to delete {}: {}", path, e)));
                }
            }
        }
        Ok(paths.len())
    }

    fn location(&self) -> &StorageLocation {
        &self.location
    }

    fn object_store(&self) -> Arc<dyn ObjectStore> {
        self.store.clone()
    }
}
