//! Folder model

use serde::{Deserialize, Serialize};

use super::{EntityId, OwnerId};

/// A named container with an optional parent, forming a strict tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    /// Unique identifier
    pub id: EntityId,
    /// Sanitized display name
    pub name: String,
    /// Parent folder, `None` at the root
    pub parent_id: Option<EntityId>,
    /// Owning user
    #[serde(rename = "user_id")]
    pub owner: OwnerId,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last update timestamp (Unix ms)
    pub updated_at: i64,
}

impl Folder {
    /// Create a new folder record with a fresh id.
    #[must_use]
    pub fn new(name: impl Into<String>, parent_id: Option<EntityId>, owner: OwnerId) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            id: EntityId::generate(),
            name: name.into(),
            parent_id,
            owner,
            created_at: now,
            updated_at: now,
        }
    }

    #[must_use]
    pub const fn is_top_level(&self) -> bool {
        self.parent_id.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_folder_new() {
        let folder = Folder::new("Math", None, OwnerId::anonymous());
        assert_eq!(folder.name, "Math");
        assert!(folder.is_top_level());
        assert_eq!(folder.created_at, folder.updated_at);
    }

    #[test]
    fn test_folder_json_layout() {
        let parent = EntityId::generate();
        let folder = Folder::new("Algebra", Some(parent.clone()), OwnerId::anonymous());
        let value = serde_json::to_value(&folder).unwrap();
        assert_eq!(value["parent_id"], parent.as_str());
        assert_eq!(value["user_id"], "anonymous");
    }
}
