//! In-process object backend

use super::ObjectBackend;
use crate::error::{ForecastError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Objects held in memory; counts fetches so cache behaviour can be observed
#[derive(Debug, Default)]
pub struct MemoryObjectBackend {
    buckets: Mutex<HashSet<String>>,
    objects: Mutex<HashMap<(String, String), Vec<u8>>>,
    fetches: AtomicUsize,
}

impl MemoryObjectBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `get_object` calls so far
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Number of stored objects across all buckets
    pub fn len(&self) -> usize {
        self.objects.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.lock().is_empty()
    }

    pub fn contains(&self, bucket: &str, object: &str) -> bool {
        self.objects
            .lock()
            .contains_key(&(bucket.to_string(), object.to_string()))
    }
}

#[async_trait]
impl ObjectBackend for MemoryObjectBackend {
    fn scheme(&self) -> &str {
        "mem"
    }

    async fn ensure_bucket(&self, bucket: &str) -> Result<()> {
        self.buckets.lock().insert(bucket.to_string());
        Ok(())
    }

    async fn put_object(&self, bucket: &str, object: &str, data: Vec<u8>) -> Result<()> {
        if !self.buckets.lock().contains(bucket) {
            return Err(ForecastError::StorageWrite(format!(
                "Bucket `{}` does not exist",
                bucket
            )));
        }
        self.objects
            .lock()
            .insert((bucket.to_string(), object.to_string()), data);
        Ok(())
    }

    async fn get_object(&self, bucket: &str, object: &str) -> Result<Vec<u8>> {
        let bytes = self
            .objects
            .lock()
            .get(&(bucket.to_string(), object.to_string()))
            .cloned()
            .ok_or_else(|| {
                ForecastError::StorageRead(format!("Object `{}/{}` not found", bucket, object))
            })?;
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(bytes)
    }

    async fn remove_object(&self, bucket: &str, object: &str) -> Result<bool> {
        Ok(self
            .objects
            .lock()
            .remove(&(bucket.to_string(), object.to_string()))
            .is_some())
    }
}
