//! Object backend rooted in a local directory

use super::ObjectBackend;
use crate::error::{ForecastError, Result};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Buckets are directories under `root`, objects are files under their bucket
#[derive(Debug, Clone)]
pub struct FsObjectBackend {
    root: PathBuf,
}

impl FsObjectBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Backend for an endpoint such as `file:///var/lib/yieldcast` or a bare path
    pub fn from_endpoint(endpoint: &str) -> Result<Self> {
        let path = endpoint.strip_prefix("file://").unwrap_or(endpoint);
        if path.is_empty() {
            return Err(ForecastError::Config(
                "Object store endpoint is empty".to_string(),
            ));
        }
        Ok(Self::new(path))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, bucket: &str, object: &str) -> PathBuf {
        object
            .split('/')
            .fold(self.root.join(bucket), |path, segment| path.join(segment))
    }
}

#[async_trait]
impl ObjectBackend for FsObjectBackend {
    fn scheme(&self) -> &str {
        "fs"
    }

    async fn ensure_bucket(&self, bucket: &str) -> Result<()> {
        let dir = self.root.join(bucket);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| ForecastError::StorageWrite(format!("{}: {}", dir.display(), e)))
    }

    async fn put_object(&self, bucket: &str, object: &str, data: Vec<u8>) -> Result<()> {
        if !tokio::fs::try_exists(self.root.join(bucket)).await? {
            return Err(ForecastError::StorageWrite(format!(
                "Bucket `{}` does not exist",
                bucket
            )));
        }

        let path = self.object_path(bucket, object);
        let write_err = |e: std::io::Error| ForecastError::StorageWrite(format!("{}: {}", path.display(), e));

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }

        // Rename over the target so readers never see a half-written object
        let mut partial = path.as_os_str().to_owned();
        partial.push(format!(".{}.tmp", Uuid::new_v4().simple()));
        let partial = PathBuf::from(partial);

        tokio::fs::write(&partial, &data).await.map_err(write_err)?;
        if let Err(err) = tokio::fs::rename(&partial, &path).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(write_err(err));
        }
        Ok(())
    }

    async fn get_object(&self, bucket: &str, object: &str) -> Result<Vec<u8>> {
        let path = self.object_path(bucket, object);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(ForecastError::StorageRead(
                format!("Object `{}/{}` not found", bucket, object),
            )),
            Err(err) => Err(ForecastError::StorageRead(format!(
                "{}: {}",
                path.display(),
                err
            ))),
        }
    }

    async fn remove_object(&self, bucket: &str, object: &str) -> Result<bool> {
        let path = self.object_path(bucket, object);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(ForecastError::StorageWrite(format!(
                "{}: {}",
                path.display(),
                err
            ))),
        }
    }
}
