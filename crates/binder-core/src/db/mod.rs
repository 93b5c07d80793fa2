//! Database layer for Binder

mod connection;
mod kv_repository;
mod migrations;
mod tree_repository;

pub use connection::{Database, SharedDatabase, SyncConfig};
pub use kv_repository::KeyValueStore;
pub use tree_repository::LibSqlTreeRepository;
