//! Runtime configuration read from the environment.
//!
//! All parsing goes through [`parse_config`] so it can be exercised without
//! touching the process environment.

use std::path::PathBuf;
use std::time::Duration;

use crate::backend::{DEFAULT_LOCAL_QUOTA_BYTES, DEFAULT_SIGNED_URL_TTL};
use crate::db::SyncConfig;
use crate::storage::R2Config;
use crate::{Error, Result};

const ENV_DATA_DIR: &str = "BINDER_DATA_DIR";
const ENV_LOCAL_QUOTA_BYTES: &str = "BINDER_LOCAL_QUOTA_BYTES";
const ENV_SIGNED_URL_TTL_SECS: &str = "BINDER_SIGNED_URL_TTL_SECS";
const ENV_TURSO_DATABASE_URL: &str = "TURSO_DATABASE_URL";
const ENV_TURSO_AUTH_TOKEN: &str = "TURSO_AUTH_TOKEN";

/// Settings shared by every Binder frontend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinderConfig {
    /// Directory holding the local databases. `None` lets the frontend pick.
    pub data_dir: Option<PathBuf>,
    pub local_quota_bytes: u64,
    pub signed_url_ttl: Duration,
    /// Remote metadata replica, when configured.
    pub sync: Option<SyncConfig>,
    /// Object storage for cloud uploads, when configured.
    pub r2: Option<R2Config>,
}

impl Default for BinderConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            local_quota_bytes: DEFAULT_LOCAL_QUOTA_BYTES,
            signed_url_ttl: DEFAULT_SIGNED_URL_TTL,
            sync: None,
            r2: None,
        }
    }
}

impl BinderConfig {
    pub fn from_env() -> Result<Self> {
        parse_config(|key| std::env::var(key).ok())
    }

    /// Whether cloud mode has everything it needs besides a signed-in user.
    #[must_use]
    pub const fn cloud_configured(&self) -> bool {
        self.sync.is_some() && self.r2.is_some()
    }
}

/// Build a [`BinderConfig`] from a key lookup.
///
/// Blank values count as unset. Partially configured remote services are
/// rejected instead of silently ignored.
pub fn parse_config(lookup: impl Fn(&str) -> Option<String>) -> Result<BinderConfig> {
    let read = |key: &str| {
        lookup(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    };

    let local_quota_bytes = match read(ENV_LOCAL_QUOTA_BYTES) {
        Some(raw) => parse_number(ENV_LOCAL_QUOTA_BYTES, &raw)?,
        None => DEFAULT_LOCAL_QUOTA_BYTES,
    };
    let signed_url_ttl = match read(ENV_SIGNED_URL_TTL_SECS) {
        Some(raw) => match parse_number(ENV_SIGNED_URL_TTL_SECS, &raw)? {
            0 => {
                return Err(Error::InvalidInput(format!(
                    "{ENV_SIGNED_URL_TTL_SECS} must be greater than zero"
                )))
            }
            secs => Duration::from_secs(secs),
        },
        None => DEFAULT_SIGNED_URL_TTL,
    };

    let sync = match (read(ENV_TURSO_DATABASE_URL), read(ENV_TURSO_AUTH_TOKEN)) {
        (Some(url), Some(token)) => Some(SyncConfig::new(url, token)),
        (None, None) => None,
        (Some(_), None) => {
            return Err(Error::InvalidInput(format!(
                "{ENV_TURSO_DATABASE_URL} is set but {ENV_TURSO_AUTH_TOKEN} is missing"
            )))
        }
        (None, Some(_)) => {
            return Err(Error::InvalidInput(format!(
                "{ENV_TURSO_AUTH_TOKEN} is set but {ENV_TURSO_DATABASE_URL} is missing"
            )))
        }
    };

    Ok(BinderConfig {
        data_dir: read(ENV_DATA_DIR).map(PathBuf::from),
        local_quota_bytes,
        signed_url_ttl,
        sync,
        r2: R2Config::from_lookup(&read)?,
    })
}

fn parse_number(key: &str, raw: &str) -> Result<u64> {
    raw.parse()
        .map_err(|_| Error::InvalidInput(format!("{key} must be a whole number, got '{raw}'")))
}
