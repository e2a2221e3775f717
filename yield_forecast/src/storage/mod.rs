//! Artifact storage
//!
//! [`ArtifactStore`] puts model blobs into an [`ObjectBackend`] under
//! `<bucket>/<namespace>/<key>` and hands out [`ResourceHandle`]s of the form
//! `<scheme>://<bucket>/<namespace>/<key>`. Reads go through a local cache
//! directory; the existence check and download for one object run under an
//! exclusive file lock so concurrent readers, in this process or another,
//! fetch it from the backend only once.

use crate::error::{ForecastError, Result};
use async_trait::async_trait;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub mod fs;
pub mod memory;

pub use self::fs::FsObjectBackend;
pub use self::memory::MemoryObjectBackend;

/// Suffix of the lock file guarding a cached object
pub const LOCK_SUFFIX: &str = ".lock";

const SCHEME_SEPARATOR: &str = "://";

/// Scheme-tagged location of a stored object
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceHandle {
    scheme: String,
    location: String,
}

impl ResourceHandle {
    /// Build a handle; both parts must be non-empty
    pub fn new(scheme: impl Into<String>, location: impl Into<String>) -> Result<Self> {
        let scheme = scheme.into();
        let location = location.into();
        if scheme.is_empty() {
            return Err(ForecastError::InvalidResource(
                "Resource handle has no scheme".to_string(),
            ));
        }
        if location.is_empty() {
            return Err(ForecastError::InvalidResource(format!(
                "Resource handle `{}{}` has no location",
                scheme, SCHEME_SEPARATOR
            )));
        }
        Ok(Self { scheme, location })
    }

    /// Parse `scheme://location`
    pub fn parse(raw: &str) -> Result<Self> {
        let (scheme, location) = raw.split_once(SCHEME_SEPARATOR).ok_or_else(|| {
            ForecastError::InvalidResource(format!("`{}` has no scheme separator", raw))
        })?;
        Self::new(scheme, location)
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    /// Split the location into bucket and object name
    pub fn bucket_and_object(&self) -> Result<(&str, &str)> {
        let (bucket, object) = self.location.split_once('/').ok_or_else(|| {
            ForecastError::InvalidResource(format!("`{}` does not name an object", self))
        })?;
        validate_segments(bucket)?;
        validate_segments(object)?;
        Ok((bucket, object))
    }
}

impl fmt::Display for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.scheme, SCHEME_SEPARATOR, self.location)
    }
}

impl FromStr for ResourceHandle {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Reject empty, `.` and `..` path segments
fn validate_segments(path: &str) -> Result<()> {
    if path
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(ForecastError::InvalidResource(format!(
            "`{}` contains an empty or relative path segment",
            path
        )));
    }
    Ok(())
}

/// Blob storage backend
#[async_trait]
pub trait ObjectBackend: Send + Sync + Debug {
    /// Scheme used in handles for this backend
    fn scheme(&self) -> &str;

    /// Create the bucket if it does not exist
    async fn ensure_bucket(&self, bucket: &str) -> Result<()>;

    /// Write an object, replacing any existing one
    async fn put_object(&self, bucket: &str, object: &str, data: Vec<u8>) -> Result<()>;

    /// Read a whole object
    async fn get_object(&self, bucket: &str, object: &str) -> Result<Vec<u8>>;

    /// Delete an object; `Ok(false)` when it was already absent
    async fn remove_object(&self, bucket: &str, object: &str) -> Result<bool>;
}

/// Key-addressed model blob store with a local read cache
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    backend: Arc<dyn ObjectBackend>,
    bucket: String,
    cache_dir: PathBuf,
}

impl ArtifactStore {
    /// Prepare the bucket and cache directory
    pub async fn connect(
        backend: Arc<dyn ObjectBackend>,
        bucket: impl Into<String>,
        cache_dir: impl Into<PathBuf>,
    ) -> Result<Self> {
        let bucket = bucket.into();
        if bucket.is_empty() || bucket.contains('/') || bucket == "." || bucket == ".." {
            return Err(ForecastError::Config(format!(
                "Invalid bucket name `{}`",
                bucket
            )));
        }
        let cache_dir = cache_dir.into();

        backend.ensure_bucket(&bucket).await?;
        tokio::fs::create_dir_all(&cache_dir).await?;

        info!(
            scheme = backend.scheme(),
            bucket = %bucket,
            cache_dir = %cache_dir.display(),
            "artifact store ready"
        );

        Ok(Self {
            backend,
            bucket,
            cache_dir,
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn scheme(&self) -> &str {
        self.backend.scheme()
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Handle for `(namespace, key)` without touching the backend
    pub fn resolve_url(&self, namespace: &str, key: &str) -> ResourceHandle {
        ResourceHandle {
            scheme: self.backend.scheme().to_string(),
            location: format!("{}/{}", self.bucket, object_name(namespace, key)),
        }
    }

    /// Upload a blob, overwriting any object at the same path
    pub async fn put(&self, namespace: &str, key: &str, data: Vec<u8>) -> Result<ResourceHandle> {
        let handle = self.resolve_url(namespace, key);
        let (bucket, object) = handle.bucket_and_object()?;
        let size = data.len();

        if let Err(err) = self.backend.put_object(bucket, object, data).await {
            error!(handle = %handle, error = %err, "could not upload object");
            return Err(match err {
                ForecastError::StorageWrite(msg) => ForecastError::StorageWrite(msg),
                other => ForecastError::StorageWrite(other.to_string()),
            });
        }

        self.drop_cached(bucket, object)
            .await
            .map_err(|e| ForecastError::StorageWrite(format!("stale cache for {}: {}", handle, e)))?;

        debug!(handle = %handle, bytes = size, "object uploaded");
        Ok(handle)
    }

    /// Local path holding the object's bytes, downloading it once if needed
    pub async fn get(&self, handle: &ResourceHandle) -> Result<PathBuf> {
        self.check_scheme(handle)?;
        let (bucket, object) = handle.bucket_and_object()?;
        let path = self.cache_path(bucket, object);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ForecastError::StorageRead(format!("{}: {}", parent.display(), e)))?;
        }

        let _lock = CacheLock::acquire(lock_path(&path)).await?;

        let cached = tokio::fs::try_exists(&path)
            .await
            .map_err(|e| ForecastError::StorageRead(format!("{}: {}", path.display(), e)))?;
        if cached {
            debug!(handle = %handle, "cache hit");
            return Ok(path);
        }

        let bytes = match self.backend.get_object(bucket, object).await {
            Ok(bytes) => bytes,
            Err(err) => {
                error!(handle = %handle, error = %err, "could not fetch object");
                return Err(match err {
                    ForecastError::StorageRead(msg) => ForecastError::StorageRead(msg),
                    other => ForecastError::StorageRead(other.to_string()),
                });
            }
        };

        write_atomically(&path, &bytes)
            .await
            .map_err(|e| ForecastError::StorageRead(format!("{}: {}", path.display(), e)))?;
        debug!(handle = %handle, bytes = bytes.len(), "object cached");

        Ok(path)
    }

    /// Resolve a handle and read the cached bytes
    pub async fn read(&self, handle: &ResourceHandle) -> Result<Vec<u8>> {
        let path = self.get(handle).await?;
        tokio::fs::read(&path)
            .await
            .map_err(|e| ForecastError::StorageRead(format!("{}: {}", path.display(), e)))
    }

    /// Delete the backend object and drop the local copy, keeping its lock file
    pub async fn remove(&self, handle: &ResourceHandle) -> Result<ResourceHandle> {
        self.check_scheme(handle)?;
        let (bucket, object) = handle.bucket_and_object()?;

        match self.backend.remove_object(bucket, object).await {
            Ok(true) => debug!(handle = %handle, "object removed"),
            Ok(false) => warn!(handle = %handle, "object was already absent"),
            Err(err) => {
                error!(handle = %handle, error = %err, "could not remove object");
                return Err(err);
            }
        }

        if let Err(err) = self.drop_cached(bucket, object).await {
            debug!(handle = %handle, error = %err, "could not drop cached file");
        }

        Ok(handle.clone())
    }

    /// Delete the cached copy under its lock; the lock file stays in place
    async fn drop_cached(&self, bucket: &str, object: &str) -> Result<()> {
        let path = self.cache_path(bucket, object);
        let parent_exists = match path.parent() {
            Some(parent) => tokio::fs::try_exists(parent).await?,
            None => false,
        };
        if !parent_exists {
            return Ok(());
        }

        let _lock = CacheLock::acquire(lock_path(&path)).await?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(path = %path.display(), "cached copy dropped");
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn check_scheme(&self, handle: &ResourceHandle) -> Result<()> {
        if handle.scheme() != self.backend.scheme() {
            return Err(ForecastError::InvalidScheme {
                expected: self.backend.scheme().to_string(),
                found: handle.scheme().to_string(),
            });
        }
        Ok(())
    }

    fn cache_path(&self, bucket: &str, object: &str) -> PathBuf {
        object
            .split('/')
            .fold(self.cache_dir.join(bucket), |path, segment| path.join(segment))
    }
}

/// Object path for a namespace and key
pub fn object_name(namespace: &str, key: &str) -> String {
    let namespace = namespace.trim_matches('/');
    let key = key.trim_matches('/');
    if namespace.is_empty() {
        key.to_string()
    } else {
        format!("{}/{}", namespace, key)
    }
}

fn lock_path(path: &Path) -> PathBuf {
    let mut raw = path.as_os_str().to_owned();
    raw.push(LOCK_SUFFIX);
    PathBuf::from(raw)
}

async fn write_atomically(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut partial = path.as_os_str().to_owned();
    partial.push(".part");
    let partial = PathBuf::from(partial);

    tokio::fs::write(&partial, bytes).await?;
    tokio::fs::rename(&partial, path).await
}

/// Exclusive advisory lock on a file, released on drop
struct CacheLock {
    file: File,
}

impl CacheLock {
    async fn acquire(path: PathBuf) -> Result<Self> {
        let file = tokio::task::spawn_blocking(move || -> std::io::Result<File> {
            let file = OpenOptions::new()
                .create(true)
                .read(true)
                .write(true)
                .open(&path)?;
            file.lock_exclusive()?;
            Ok(file)
        })
        .await?
        .map_err(|e| ForecastError::StorageRead(format!("could not lock cache entry: {}", e)))?;

        Ok(Self { file })
    }
}

impl Drop for CacheLock {
    fn drop(&mut self) {
        if let Err(err) = FileExt::unlock(&self.file) {
            warn!(error = %err, "could not release cache lock");
        }
    }
}
