//! Local vs cloud backend selection.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backend::{Backend, LocalBackend, RemoteBackend, DEFAULT_SIGNED_URL_TTL};
use crate::db::{KeyValueStore, SharedDatabase};
use crate::models::OwnerId;
use crate::storage::ObjectStore;
use crate::{Error, Result};

/// Key under which the explicit storage choice is persisted.
pub const STORAGE_MODE_KEY: &str = "storage-mode";

/// Which backend the user works against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    Local,
    Cloud,
}

impl StorageMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Cloud => "cloud",
        }
    }
}

impl fmt::Display for StorageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "cloud" => Ok(Self::Cloud),
            other => Err(Error::InvalidInput(format!("Unknown storage mode: {other}"))),
        }
    }
}

/// Authentication state supplied by the host application.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthContext {
    /// Signed-in user, `None` when anonymous.
    pub owner: Option<OwnerId>,
}

impl AuthContext {
    #[must_use]
    pub const fn anonymous() -> Self {
        Self { owner: None }
    }

    #[must_use]
    pub const fn signed_in(owner: OwnerId) -> Self {
        Self { owner: Some(owner) }
    }

    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.owner.is_some()
    }
}

/// Everything needed to build a remote backend.
#[derive(Clone)]
pub struct RemoteResources<O> {
    pub db: SharedDatabase,
    pub objects: O,
    pub signed_url_ttl: Duration,
}

impl<O> RemoteResources<O> {
    pub const fn new(db: SharedDatabase, objects: O) -> Self {
        Self {
            db,
            objects,
            signed_url_ttl: DEFAULT_SIGNED_URL_TTL,
        }
    }

    #[must_use]
    pub const fn with_signed_url_ttl(mut self, ttl: Duration) -> Self {
        self.signed_url_ttl = ttl;
        self
    }
}

/// Picks the active backend from the persisted choice and auth state.
///
/// An explicit choice always wins. Without one, signed-in users get the
/// cloud backend and anonymous users the local one.
pub struct BackendSelector<O> {
    store: KeyValueStore,
    local: LocalBackend,
    remote: Option<RemoteResources<O>>,
    auth: AuthContext,
    explicit: Option<StorageMode>,
}

impl<O: ObjectStore + Clone> BackendSelector<O> {
    /// Build a selector, reading any persisted choice from `store`.
    pub async fn load(
        store: KeyValueStore,
        local: LocalBackend,
        remote: Option<RemoteResources<O>>,
        auth: AuthContext,
    ) -> Result<Self> {
        let explicit = match store.get(STORAGE_MODE_KEY).await? {
            Some(raw) => match raw.parse() {
                Ok(mode) => Some(mode),
                Err(error) => {
                    tracing::warn!("Ignoring persisted storage mode: {error}");
                    None
                }
            },
            None => None,
        };

        Ok(Self {
            store,
            local,
            remote,
            auth,
            explicit,
        })
    }

    /// The persisted explicit choice, if any.
    #[must_use]
    pub const fn explicit_mode(&self) -> Option<StorageMode> {
        self.explicit
    }

    /// The mode in effect right now.
    #[must_use]
    pub const fn mode(&self) -> StorageMode {
        match self.explicit {
            Some(mode) => mode,
            None if self.auth.is_authenticated() => StorageMode::Cloud,
            None => StorageMode::Local,
        }
    }

    #[must_use]
    pub const fn auth(&self) -> &AuthContext {
        &self.auth
    }

    /// Persist an explicit choice. Returns whether the active backend changed.
    pub async fn choose(&mut self, mode: StorageMode) -> Result<bool> {
        let before = self.identity();
        self.store.set(STORAGE_MODE_KEY, mode.as_str()).await?;
        self.explicit = Some(mode);

        tracing::info!("Storage mode set to {mode}");
        Ok(before != self.identity())
    }

    /// Apply new auth state. Returns whether the active backend changed.
    pub fn handle_auth_change(&mut self, auth: AuthContext) -> bool {
        let before = self.identity();
        self.auth = auth;
        let changed = before != self.identity();
        if changed {
            tracing::info!(
                "Auth change switched storage to {} (signed in: {})",
                self.mode(),
                self.auth.is_authenticated()
            );
        }
        changed
    }

    /// Build the backend for the current mode.
    pub fn active(&self) -> Result<Backend<O>> {
        match self.mode() {
            StorageMode::Local => Ok(Backend::Local(self.local.clone())),
            StorageMode::Cloud => {
                let owner = self.auth.owner.clone().ok_or_else(|| {
                    Error::FeatureUnavailable("Sign in required for cloud storage".to_string())
                })?;
                let remote = self.remote.as_ref().ok_or_else(|| {
                    Error::BackendUnavailable("Cloud storage is not configured".to_string())
                })?;

                Ok(Backend::Remote(
                    RemoteBackend::new(remote.db.clone(), remote.objects.clone(), owner)
                        .with_signed_url_ttl(remote.signed_url_ttl),
                ))
            }
        }
    }

    /// Mode plus the owner a cloud backend would be scoped to.
    fn identity(&self) -> (StorageMode, Option<OwnerId>) {
        match self.mode() {
            StorageMode::Local => (StorageMode::Local, None),
            StorageMode::Cloud => (StorageMode::Cloud, self.auth.owner.clone()),
        }
    }
}
