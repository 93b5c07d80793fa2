//! Cloudflare R2 object store over the S3-compatible API.

use std::env;
use std::time::Duration;

use aws_credential_types::Credentials;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::{primitives::ByteStream, Client};
use aws_types::region::Region;

use super::ObjectStore;
use crate::{Error, Result};

pub(crate) const ENV_ACCOUNT_ID: &str = "R2_ACCOUNT_ID";
pub(crate) const ENV_BUCKET: &str = "R2_BUCKET";
pub(crate) const ENV_ACCESS_KEY_ID: &str = "R2_ACCESS_KEY_ID";
pub(crate) const ENV_SECRET_ACCESS_KEY: &str = "R2_SECRET_ACCESS_KEY";

/// Cloudflare R2 configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct R2Config {
    /// Cloudflare account identifier.
    pub account_id: String,
    /// R2 bucket name.
    pub bucket: String,
    /// Access key id for S3-compatible auth.
    pub access_key_id: String,
    /// Secret access key for S3-compatible auth.
    pub secret_access_key: String,
}

impl R2Config {
    /// Load R2 configuration from environment variables.
    ///
    /// Returns `Ok(None)` when no R2 variables are set and an error when the
    /// configuration is only partially provided.
    pub fn from_env() -> Result<Option<Self>> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`R2Config::from_env`] with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Option<Self>> {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let account_id = read(ENV_ACCOUNT_ID);
        let bucket = read(ENV_BUCKET);
        let access_key_id = read(ENV_ACCESS_KEY_ID);
        let secret_access_key = read(ENV_SECRET_ACCESS_KEY);

        match (account_id, bucket, access_key_id, secret_access_key) {
            (None, None, None, None) => Ok(None),
            (Some(account_id), Some(bucket), Some(access_key_id), Some(secret_access_key)) => {
                Ok(Some(Self {
                    account_id,
                    bucket,
                    access_key_id,
                    secret_access_key,
                }))
            }
            (account_id, bucket, access_key_id, secret_access_key) => {
                let missing: Vec<&str> = [
                    (ENV_ACCOUNT_ID, account_id.is_none()),
                    (ENV_BUCKET, bucket.is_none()),
                    (ENV_ACCESS_KEY_ID, access_key_id.is_none()),
                    (ENV_SECRET_ACCESS_KEY, secret_access_key.is_none()),
                ]
                .into_iter()
                .filter_map(|(name, absent)| absent.then_some(name))
                .collect();

                Err(Error::InvalidInput(format!(
                    "R2 configuration is incomplete. Missing: {}",
                    missing.join(", ")
                )))
            }
        }
    }

    /// Cloudflare R2 S3-compatible endpoint URL.
    #[must_use]
    pub fn endpoint_url(&self) -> String {
        format!("https://{}.r2.cloudflarestorage.com", self.account_id)
    }
}

/// R2-backed [`ObjectStore`].
#[derive(Clone, Debug)]
pub struct R2Storage {
    config: R2Config,
    client: Client,
}

impl R2Storage {
    #[must_use]
    pub fn new(config: R2Config) -> Self {
        let client = build_s3_client(&config);
        Self { config, client }
    }

    #[must_use]
    pub const fn config(&self) -> &R2Config {
        &self.config
    }

    /// Check that the configured bucket is reachable with current credentials.
    pub async fn bucket_is_reachable(&self) -> Result<()> {
        self.client
            .head_bucket()
            .bucket(&self.config.bucket)
            .send()
            .await
            .map_err(|error| storage_error("head_bucket", &self.config.bucket, None, error))?;
        Ok(())
    }
}

impl ObjectStore for R2Storage {
    async fn upload(&self, key: &str, bytes: &[u8], content_type: Option<&str>) -> Result<()> {
        let key = normalize_object_key(key)?;

        let mut request = self
            .client
            .put_object()
            .bucket(&self.config.bucket)
            .key(&key)
            .body(ByteStream::from(bytes.to_vec()));

        if let Some(content_type) = content_type.map(str::trim).filter(|v| !v.is_empty()) {
            request = request.content_type(content_type);
        }

        request
            .send()
            .await
            .map_err(|error| storage_error("put_object", &self.config.bucket, Some(&key), error))?;

        tracing::debug!("Uploaded {} bytes to {key}", bytes.len());
        Ok(())
    }

    async fn download(&self, key: &str) -> Result<Vec<u8>> {
        let key = normalize_object_key(key)?;

        let response = self
            .client
            .get_object()
            .bucket(&self.config.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|error| storage_error("get_object", &self.config.bucket, Some(&key), error))?;

        let payload = response.body.collect().await.map_err(|error| {
            storage_error("get_object_body", &self.config.bucket, Some(&key), error)
        })?;

        Ok(payload.into_bytes().to_vec())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let key = normalize_object_key(key)?;

        self.client
            .delete_object()
            .bucket(&self.config.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|error| {
                storage_error("delete_object", &self.config.bucket, Some(&key), error)
            })?;

        Ok(())
    }

    async fn create_signed_url(&self, key: &str, ttl: Duration) -> Result<String> {
        let key = normalize_object_key(key)?;
        let presigning = PresigningConfig::expires_in(ttl)
            .map_err(|error| Error::InvalidInput(format!("Invalid signed URL TTL: {error}")))?;

        let request = self
            .client
            .get_object()
            .bucket(&self.config.bucket)
            .key(&key)
            .presigned(presigning)
            .await
            .map_err(|error| storage_error("presign", &self.config.bucket, Some(&key), error))?;

        Ok(request.uri().to_string())
    }
}

fn build_s3_client(config: &R2Config) -> Client {
    let credentials = Credentials::new(
        config.access_key_id.clone(),
        config.secret_access_key.clone(),
        None,
        None,
        "binder-core-r2-storage",
    );

    let sdk_config = aws_sdk_s3::config::Builder::new()
        .region(Region::new("auto"))
        .credentials_provider(credentials)
        .endpoint_url(config.endpoint_url())
        .force_path_style(true)
        .build();

    Client::from_conf(sdk_config)
}

fn storage_error(
    operation: &str,
    bucket: &str,
    object_key: Option<&str>,
    error: impl std::fmt::Display,
) -> Error {
    let target = object_key.map_or_else(|| bucket.to_string(), |key| format!("{bucket}/{key}"));
    Error::Storage(format!("R2 {operation} failed for {target}: {error}"))
}

fn normalize_object_key(object_key: &str) -> Result<String> {
    let object_key = object_key.trim().trim_matches('/');
    if object_key.is_empty() {
        return Err(Error::InvalidInput("Storage key cannot be empty".to_string()));
    }
    Ok(object_key.to_string())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn parse_from_map(map: &HashMap<&str, &str>) -> Result<Option<R2Config>> {
        R2Config::from_lookup(|key| map.get(key).map(|value| (*value).to_string()))
    }

    fn full_map() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            (ENV_ACCOUNT_ID, "account-1"),
            (ENV_BUCKET, "bucket-a"),
            (ENV_ACCESS_KEY_ID, "AKID123"),
            (ENV_SECRET_ACCESS_KEY, "SECRET123"),
        ])
    }

    #[test]
    fn parse_config_none_returns_none() {
        assert!(parse_from_map(&HashMap::new()).unwrap().is_none());
    }

    #[test]
    fn parse_config_blank_values_count_as_unset() {
        let map = HashMap::from([(ENV_BUCKET, "   ")]);
        assert!(parse_from_map(&map).unwrap().is_none());
    }

    #[test]
    fn parse_config_lists_missing_values() {
        let map = HashMap::from([(ENV_ACCOUNT_ID, "account"), (ENV_BUCKET, "bucket")]);

        match parse_from_map(&map).unwrap_err() {
            Error::InvalidInput(message) => {
                assert!(message.contains(ENV_ACCESS_KEY_ID));
                assert!(message.contains(ENV_SECRET_ACCESS_KEY));
                assert!(!message.contains(ENV_BUCKET));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn parse_config_accepts_complete_values() {
        let config = parse_from_map(&full_map()).unwrap().unwrap();
        assert_eq!(config.bucket, "bucket-a");
        assert_eq!(
            config.endpoint_url(),
            "https://account-1.r2.cloudflarestorage.com"
        );
    }

    #[test]
    fn normalize_object_key_trims_slashes_and_rejects_empty() {
        assert_eq!(normalize_object_key(" /u/1_a.png/ ").unwrap(), "u/1_a.png");
        assert!(matches!(
            normalize_object_key("  / "),
            Err(Error::InvalidInput(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn presigned_url_is_built_offline() {
        let storage = R2Storage::new(parse_from_map(&full_map()).unwrap().unwrap());
        let url = storage
            .create_signed_url("user/1_a.png", Duration::from_secs(3600))
            .await
            .unwrap();

        let expected_prefix = "https://account-1.r2.cloudflarestorage.com/bucket-a/user/1_a.png?";
        assert!(url.starts_with(expected_prefix));
        assert!(url.contains("X-Amz-Expires=3600"));
    }

    #[tokio::test(flavor = "multi_thread")]
    #[ignore = "Requires local R2 env vars plus network access"]
    async fn r2_object_roundtrip_upload_download_delete() {
        let _ = dotenvy::dotenv();

        let config = R2Config::from_env()
            .expect("R2 env parsing should not error")
            .expect("R2 config should be present");
        let storage = R2Storage::new(config);
        storage.bucket_is_reachable().await.unwrap();

        let key = "binder-integration/roundtrip.txt";
        storage
            .upload(key, b"r2-roundtrip-test", Some("text/plain"))
            .await
            .unwrap();
        assert_eq!(storage.download(key).await.unwrap(), b"r2-roundtrip-test");
        storage.delete(key).await.unwrap();
    }
}
