pub mod object;

pub use object::{LakeStorage, ObjectStorage};

use common::config::StorageSettings;
use common::{Error, Result};
use object_store::ObjectStore;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// A root location inside an object store: `s3://bucket/prefix`, `file:///dir`
/// or `memory:///prefix`. Bare filesystem paths are accepted and turned into
/// `file://` URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLocation {
    url: Url,
    prefix: Path,
}

impl StorageLocation {
    pub fn parse(location: &str) -> Result<Self> {
        let url = if location.contains("://") {
            // Hadoop-style S3 schemes name the same bucket.
            let normalized = match location.split_once("://") {
                Some(("s3a", rest)) | Some(("s3n", rest)) => format!("s3://{}", rest),
                _ => location.to_string(),
            };
            Url::parse(&normalized)?
        } else {
            let absolute = std::path::absolute(location)?;
            Url::from_directory_path(&absolute).map_err(|_| {
                Error::InvalidInput(format!("Cannot turn '{}' into a file URL", location))
            })?
        };

        match url.scheme() {
            "s3" => {
                if url.host_str().is_none_or(str::is_empty) {
                    return Err(Error::InvalidInput(format!(
                        "S3 location '{}' has no bucket",
                        location
                    )));
                }
            }
            "file" | "memory" => {}
            other => {
                return Err(Error::InvalidInput(format!(
                    "Unsupported storage scheme '{}' in '{}'",
                    other, location
                )));
            }
        }

        let prefix = Path::from_url_path(url.path())?;
        Ok(Self { url, prefix })
    }

    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }

    pub fn bucket(&self) -> Option<&str> {
        self.url.host_str().filter(|h| !h.is_empty())
    }

    /// Object-store key of the root.
    pub fn prefix(&self) -> &Path {
        &self.prefix
    }

    /// `scheme://host` under which the backing store is registered.
    pub fn store_url(&self) -> Result<Url> {
        let base = format!("{}://{}", self.scheme(), self.bucket().unwrap_or(""));
        Ok(Url::parse(&base)?)
    }

    /// Object key for `relative` under the root.
    pub fn object_path(&self, relative: &str) -> Result<Path> {
        let relative = relative.trim_matches('/');
        let root = self.prefix.as_ref();
        let joined = match (root.is_empty(), relative.is_empty()) {
            (true, _) => relative.to_string(),
            (false, true) => root.to_string(),
            (false, false) => format!("{}/{}", root, relative),
        };
        Ok(Path::parse(joined)?)
    }

    /// Inverse of [`object_path`](Self::object_path).
    pub fn relative_key(&self, path: &Path) -> Option<String> {
        let root = self.prefix.as_ref();
        let key = path.as_ref();
        if root.is_empty() {
            return Some(key.to_string());
        }
        key.strip_prefix(root)
            .and_then(|rest| rest.strip_prefix('/'))
            .map(str::to_string)
    }

    /// Directory URL of a child collection, in the form DataFusion listing tables expect.
    pub fn collection_url(&self, relative: &str) -> Result<String> {
        let path = self.object_path(relative)?;
        Ok(format!(
            "{}://{}/{}/",
            self.scheme(),
            self.bucket().unwrap_or(""),
            path.as_ref()
        ))
    }
}

impl std::fmt::Display for StorageLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.url)
    }
}

/// Builds and caches one object store per `scheme://host`, so input and output
/// roots on the same bucket share a client.
pub struct StoreManager {
    settings: StorageSettings,
    store_cache: HashMap<String, Arc<dyn ObjectStore>>,
}

impl StoreManager {
    pub fn new(settings: StorageSettings) -> Self {
        Self {
            settings,
            store_cache: HashMap::new(),
        }
    }

    pub fn get_store(&mut self, location: &StorageLocation) -> Result<Arc<dyn ObjectStore>> {
        let key = location.store_url()?.to_string();
        if let Some(store) = self.store_cache.get(&key) {
            return Ok(store.clone());
        }

        let store: Arc<dyn ObjectStore> = match location.scheme() {
            "s3" => {
                let bucket = location.bucket().unwrap_or_default();
                let mut builder = AmazonS3Builder::from_env()
                    .with_bucket_name(bucket)
                    .with_region(&self.settings.region)
                    .with_allow_http(self.settings.allow_http);

                if let (Some(access_key), Some(secret_key)) = (
                    &self.settings.access_key_id,
                    &self.settings.secret_access_key,
                ) {
                    builder = builder
                        .with_access_key_id(access_key)
                        .with_secret_access_key(secret_key);
                }
                if let Some(endpoint) = &self.settings.endpoint {
                    builder = builder.with_endpoint(endpoint);
                }

                Arc::new(builder.build()?)
            }
            "file" => Arc::new(LocalFileSystem::new()),
            "memory" => Arc::new(InMemory::new()),
            other => {
                return Err(Error::InvalidInput(format!(
                    "Unsupported storage scheme '{}'",
                    other
                )));
            }
        };

        debug!(store = %key, "Created object store");
        self.store_cache.insert(key, store.clone());
        Ok(store)
    }

    pub fn open(&mut self, location: &str) -> Result<Arc<LakeStorage>> {
        let location = StorageLocation::parse(location)?;
        let store = self.get_store(&location)?;
        Ok(Arc::new(LakeStorage::new(store, location)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_s3_location() {
        let location = StorageLocation::parse("s3://udacity-dend/raw/").unwrap();
        assert_eq!(location.scheme(), "s3");
        assert_eq!(location.bucket(), Some("udacity-dend"));
        assert_eq!(location.prefix().as_ref(), "raw");
        assert_eq!(location.store_url().unwrap().as_str(), "s3://udacity-dend");
    }

    #[test]
    fn test_s3a_is_normalized() {
        let location = StorageLocation::parse("s3a://udacity-dend/").unwrap();
        assert_eq!(location.scheme(), "s3");
        assert_eq!(location.prefix().as_ref(), "");
    }

    #[test]
    fn test_bare_path_becomes_file_url() {
        let location = StorageLocation::parse("/tmp/sparkify/out").unwrap();
        assert_eq!(location.scheme(), "file");
        assert_eq!(location.prefix().as_ref(), "tmp/sparkify/out");
        assert_eq!(
            location.collection_url("songs.parquet").unwrap(),
            "file:///tmp/sparkify/out/songs.parquet/"
        );
    }

    #[test]
    fn test_object_path_and_relative_key() {
        let location = StorageLocation::parse("memory:///lake").unwrap();
        let path = location.object_path("time.parquet/_SUCCESS").unwrap();
        assert_eq!(path.as_ref(), "lake/time.parquet/_SUCCESS");
        assert_eq!(
            location.relative_key(&path).as_deref(),
            Some("time.parquet/_SUCCESS")
        );
        assert_eq!(location.relative_key(&Path::from("other/x")), None);
    }

    #[test]
    fn test_rejects_unknown_scheme_and_missing_bucket() {
        assert!(StorageLocation::parse("ftp://host/dir").is_err());
        assert!(StorageLocation::parse("s3:///no-bucket").is_err());
    }

    #[test]
    fn test_store_cache_shares_bucket() {
        let mut manager = StoreManager::new(StorageSettings::default());
        let a = StorageLocation::parse("memory:///in").unwrap();
        let b = StorageLocation::parse("memory:///out").unwrap();
        let first = manager.get_store(&a).unwrap();
        let second = manager.get_store(&b).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
