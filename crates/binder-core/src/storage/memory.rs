//! In-process object store for tests and offline development.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;

use super::ObjectStore;
use crate::{Error, Result};

#[derive(Debug, Default)]
struct Inner {
    objects: HashMap<String, (Vec<u8>, Option<String>)>,
    failing_downloads: HashSet<String>,
    fail_uploads: bool,
    fail_deletes: bool,
}

/// Cloneable handle to a shared in-memory bucket.
#[derive(Debug, Clone, Default)]
pub struct MemoryObjectStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryObjectStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later download of `key` fail with a storage error.
    pub async fn fail_download(&self, key: &str) {
        self.inner
            .lock()
            .await
            .failing_downloads
            .insert(key.to_string());
    }

    /// Toggle failure of every upload.
    pub async fn set_fail_uploads(&self, fail: bool) {
        self.inner.lock().await.fail_uploads = fail;
    }

    /// Toggle failure of every delete.
    pub async fn set_fail_deletes(&self, fail: bool) {
        self.inner.lock().await.fail_deletes = fail;
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.inner.lock().await.objects.contains_key(key)
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.objects.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.objects.is_empty()
    }

    /// Stored content type for `key`, if any.
    pub async fn content_type(&self, key: &str) -> Option<String> {
        self.inner
            .lock()
            .await
            .objects
            .get(key)
            .and_then(|(_, content_type)| content_type.clone())
    }
}

impl ObjectStore for MemoryObjectStore {
    async fn upload(&self, key: &str, bytes: &[u8], content_type: Option<&str>) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.fail_uploads {
            return Err(Error::Storage(format!("upload failed for {key}")));
        }
        inner.objects.insert(
            key.to_string(),
            (bytes.to_vec(), content_type.map(ToOwned::to_owned)),
        );
        Ok(())
    }

    async fn download(&self, key: &str) -> Result<Vec<u8>> {
        let inner = self.inner.lock().await;
        if inner.failing_downloads.contains(key) {
            return Err(Error::Storage(format!("download failed for {key}")));
        }
        inner
            .objects
            .get(key)
            .map(|(bytes, _)| bytes.clone())
            .ok_or_else(|| Error::NotFound(format!("Object {key}")))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.fail_deletes {
            return Err(Error::Storage(format!("delete failed for {key}")));
        }
        inner.objects.remove(key);
        Ok(())
    }

    async fn create_signed_url(&self, key: &str, ttl: Duration) -> Result<String> {
        if !self.contains(key).await {
            return Err(Error::NotFound(format!("Object {key}")));
        }
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let expires = Utc::now().timestamp_millis().saturating_add(ttl_ms);
        Ok(format!("memory://{key}?expires={expires}"))
    }
}
