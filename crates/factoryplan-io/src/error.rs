use std::io;
use thiserror::Error;

use factoryplan_core::StoreError;

#[derive(Error, Debug)]
pub enum IoError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Malformed blueprint JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported blueprint item '{0}', expected 'blueprint'")]
    UnsupportedItem(String),

    #[error("Import target already holds entities or tiles")]
    StoreNotEmpty,

    #[error(transparent)]
    Store(#[from] StoreError),
}
