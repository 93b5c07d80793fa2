//! File model: notes and uploads

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use super::{EntityId, OwnerId};
use crate::error::{Error, Result};

const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Whether a file is an inline text note or an uploaded binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Note,
    Upload,
}

impl FileKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Note => "note",
            Self::Upload => "upload",
        }
    }
}

impl FromStr for FileKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "note" => Ok(Self::Note),
            "upload" => Ok(Self::Upload),
            other => Err(Error::InvalidInput(format!("Unknown file type: {other}"))),
        }
    }
}

/// Folder or file, for operations that accept either.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Folder,
    File,
}

impl EntityKind {
    /// Label used in user-facing messages.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Folder => "Folder",
            Self::File => "File",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A named leaf entity attached to a folder or the root.
///
/// Exactly one of `content` and `storage_key` is meaningful for retrieval:
/// notes and local uploads carry `content`, remote uploads carry `storage_key`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub id: EntityId,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: FileKind,
    /// Note text, or a base64 data URL for local uploads.
    pub content: Option<String>,
    /// Object storage key for remote uploads.
    #[serde(rename = "file_path")]
    pub storage_key: Option<String>,
    pub mime_type: Option<String>,
    #[serde(rename = "file_size")]
    pub byte_size: Option<i64>,
    pub folder_id: Option<EntityId>,
    #[serde(rename = "user_id")]
    pub owner: OwnerId,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last update timestamp (Unix ms)
    pub updated_at: i64,
}

impl FileEntry {
    /// Build a new note record.
    #[must_use]
    pub fn note(
        name: impl Into<String>,
        text: impl Into<String>,
        folder_id: Option<EntityId>,
        owner: OwnerId,
    ) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            id: EntityId::generate(),
            name: name.into(),
            kind: FileKind::Note,
            content: Some(text.into()),
            storage_key: None,
            mime_type: None,
            byte_size: None,
            folder_id,
            owner,
            created_at: now,
            updated_at: now,
        }
    }

    /// Build a new upload record. Exactly one of `content` / `storage_key` should be set.
    #[must_use]
    pub fn upload(
        name: impl Into<String>,
        mime_type: &str,
        byte_size: usize,
        folder_id: Option<EntityId>,
        owner: OwnerId,
    ) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            id: EntityId::generate(),
            name: name.into(),
            kind: FileKind::Upload,
            content: None,
            storage_key: None,
            mime_type: Some(mime_type.to_string()),
            byte_size: Some(i64::try_from(byte_size).unwrap_or(i64::MAX)),
            folder_id,
            owner,
            created_at: now,
            updated_at: now,
        }
    }

    #[must_use]
    pub fn is_note(&self) -> bool {
        self.kind == FileKind::Note
    }

    /// Mime type with a generic fallback.
    #[must_use]
    pub fn mime_type_or_default(&self) -> &str {
        self.mime_type
            .as_deref()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or(DEFAULT_MIME_TYPE)
    }
}

/// Content supplied when creating a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilePayload {
    Note { text: String },
    Upload { bytes: Vec<u8>, mime_type: String },
}

impl FilePayload {
    #[must_use]
    pub fn note(text: impl Into<String>) -> Self {
        Self::Note { text: text.into() }
    }

    #[must_use]
    pub fn upload(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        let mime_type = mime_type.into().trim().to_string();
        Self::Upload {
            bytes,
            mime_type: if mime_type.is_empty() {
                DEFAULT_MIME_TYPE.to_string()
            } else {
                mime_type
            },
        }
    }

    #[must_use]
    pub const fn kind(&self) -> FileKind {
        match self {
            Self::Note { .. } => FileKind::Note,
            Self::Upload { .. } => FileKind::Upload,
        }
    }
}

/// Resolvable content of a file, as returned by a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentRef {
    /// Note text.
    Text(String),
    /// Binary content held inline by the backend.
    Inline { bytes: Vec<u8>, mime_type: String },
    /// Time-limited access URL for remotely stored content.
    SignedUrl { url: String, expires_at: i64 },
}

/// Encode bytes as a `data:<mime>;base64,<payload>` URL.
#[must_use]
pub fn encode_data_url(bytes: &[u8], mime_type: &str) -> String {
    format!("data:{mime_type};base64,{}", STANDARD.encode(bytes))
}

/// Decode a base64 data URL into `(bytes, mime_type)`.
pub fn decode_data_url(data_url: &str) -> Result<(Vec<u8>, String)> {
    let rest = data_url
        .strip_prefix("data:")
        .ok_or_else(|| Error::InvalidInput("Inline content is not a data URL".to_string()))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| Error::InvalidInput("Inline content has no payload".to_string()))?;
    let mime_type = header
        .strip_suffix(";base64")
        .ok_or_else(|| Error::InvalidInput("Inline content is not base64 encoded".to_string()))?;
    let bytes = STANDARD
        .decode(payload)
        .map_err(|error| Error::InvalidInput(format!("Invalid base64 content: {error}")))?;
    let mime_type = if mime_type.is_empty() {
        DEFAULT_MIME_TYPE.to_string()
    } else {
        mime_type.to_string()
    };
    Ok((bytes, mime_type))
}
