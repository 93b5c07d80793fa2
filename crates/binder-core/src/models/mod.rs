//! Data models for Binder

mod file;
mod folder;
mod id;

pub use file::{
    decode_data_url, encode_data_url, ContentRef, EntityKind, FileEntry, FileKind, FilePayload,
};
pub use folder::Folder;
pub use id::{EntityId, OwnerId};
