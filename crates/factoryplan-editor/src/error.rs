use thiserror::Error;

use factoryplan_core::StoreError;
use factoryplan_generators::GeneratorError;
use factoryplan_io::IoError;

/// Failures talking to the sync peer. Never fatal to local edits.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyncError {
    #[error("Sync peer unreachable: {0}")]
    Unreachable(String),

    #[error("Sync peer rejected the message: {0}")]
    Rejected(String),
}

#[derive(Error, Debug)]
pub enum EditorError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Generator(#[from] GeneratorError),

    #[error(transparent)]
    Io(#[from] IoError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("Invalid settings file: {0}")]
    Settings(String),
}
