//! Binary object storage used by the remote backend.

mod memory;
mod r2;

use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use crate::models::OwnerId;
use crate::Result;

pub use memory::MemoryObjectStore;
pub use r2::{R2Config, R2Storage};

/// Minimal blob store contract: put, get, delete and time-limited read URLs.
#[allow(async_fn_in_trait)]
pub trait ObjectStore {
    /// Store `bytes` under `key`, replacing any existing object.
    async fn upload(&self, key: &str, bytes: &[u8], content_type: Option<&str>) -> Result<()>;

    /// Fetch the bytes stored under `key`.
    async fn download(&self, key: &str) -> Result<Vec<u8>>;

    /// Remove the object stored under `key`.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Produce a URL granting read access to `key` for `ttl`.
    async fn create_signed_url(&self, key: &str, ttl: Duration) -> Result<String>;
}

/// Build a fresh storage key of the form `<owner>/<millis>_<uuid>.<ext>`.
///
/// The extension is taken from `file_name` and lowercased; it is omitted when
/// the name has none or it contains anything but ASCII alphanumerics.
#[must_use]
pub fn build_storage_key(owner: &OwnerId, file_name: &str) -> String {
    let ts = Utc::now().timestamp_millis();
    let id = Uuid::now_v7();

    match file_extension(file_name) {
        Some(ext) => format!("{owner}/{ts}_{id}.{ext}"),
        None => format!("{owner}/{ts}_{id}"),
    }
}

fn file_extension(file_name: &str) -> Option<String> {
    let (stem, ext) = file_name.trim().rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_key_is_owner_prefixed_with_extension() {
        let owner = OwnerId::new("user-42").unwrap();
        let key = build_storage_key(&owner, "Scan.PNG");

        assert!(key.starts_with("user-42/"));
        assert!(key.ends_with(".png"));
        let (_, object) = key.split_once('/').unwrap();
        let (millis, _) = object.split_once('_').unwrap();
        assert!(millis.parse::<i64>().is_ok());
    }

    #[test]
    fn storage_keys_are_unique() {
        let owner = OwnerId::new("user-42").unwrap();
        assert_ne!(
            build_storage_key(&owner, "a.txt"),
            build_storage_key(&owner, "a.txt")
        );
    }

    #[test]
    fn extension_is_dropped_when_missing_or_odd() {
        assert_eq!(file_extension("README"), None);
        assert_eq!(file_extension(".bashrc"), None);
        assert_eq!(file_extension("archive.tar gz"), None);
        assert_eq!(file_extension("photo.JPG"), Some("jpg".to_string()));
    }
}
