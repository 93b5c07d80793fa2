use std::io;

use binder_core::Notice;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] binder_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("{}: {}", .0.title, .0.description)]
    Notice(Notice),
    #[error("No note text provided")]
    EmptyContent,
    #[error("Could not determine a data directory; pass --data-dir")]
    NoDataDir,
    #[error("Database initialization failed: {0}")]
    DatabaseInit(String),
}

impl From<Notice> for CliError {
    fn from(notice: Notice) -> Self {
        Self::Notice(notice)
    }
}
