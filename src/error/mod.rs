use std::path::PathBuf;

use crate::buffer::BufferError;
use crate::session::SessionError;
use crate::storage::StorageError;
use thiserror::Error;

pub type AppResult<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Buffer(#[from] BufferError),
    #[error("no persisted session at {path}")]
    NoPersistedSession { path: PathBuf },
    #[error("invalid edit script {path}: {source}")]
    Script {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to read edit script {path}: {source}")]
    ScriptIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
