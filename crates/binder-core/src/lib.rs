//! binder-core - Core library for Binder
//!
//! Notes and uploaded files organized in a folder tree, persisted either in
//! a local key-value store or in a remote libSQL database backed by object
//! storage. Frontends drive everything through [`workspace::Workspace`].

pub mod backend;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod models;
pub mod names;
pub mod navigator;
pub mod selector;
pub mod storage;
pub mod workspace;

pub use error::{Error, ErrorKind, Result};
pub use models::{EntityId, EntityKind, FileEntry, Folder, OwnerId};
pub use workspace::{Notice, Severity, Workspace};
