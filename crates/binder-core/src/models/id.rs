//! Entity and owner identifiers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::Error;

/// Opaque identifier for a folder or file.
///
/// Freshly generated ids are UUID v7 strings, but any non-empty string read
/// back from a store is accepted. Do not rely on ordering or length.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Generate a new collision-resistant id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for EntityId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidInput("Entity id cannot be empty".to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

/// Owner of a folder or file: an authenticated user id or the anonymous sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    /// Sentinel owner used by the local backend.
    pub const ANONYMOUS: &'static str = "anonymous";

    /// Wrap an authenticated user id.
    pub fn new(id: impl Into<String>) -> crate::Result<Self> {
        let id = id.into().trim().to_string();
        if id.is_empty() {
            return Err(Error::InvalidInput("Owner id cannot be empty".to_string()));
        }
        Ok(Self(id))
    }

    #[must_use]
    pub fn anonymous() -> Self {
        Self(Self::ANONYMOUS.to_string())
    }

    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.0 == Self::ANONYMOUS
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_id_unique() {
        let id1 = EntityId::generate();
        let id2 = EntityId::generate();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_entity_id_parse_accepts_foreign_ids() {
        let id: EntityId = "a1b2-c3d4-4e5f-8a9b".parse().unwrap();
        assert_eq!(id.as_str(), "a1b2-c3d4-4e5f-8a9b");
        assert!("   ".parse::<EntityId>().is_err());
    }

    #[test]
    fn test_entity_id_serializes_as_plain_string() {
        let id: EntityId = "folder-1".parse().unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"folder-1\"");
    }

    #[test]
    fn test_owner_id() {
        assert!(OwnerId::anonymous().is_anonymous());
        assert!(!OwnerId::new("user-42").unwrap().is_anonymous());
        assert!(OwnerId::new("  ").is_err());
    }
}
